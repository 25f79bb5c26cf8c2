//! Decision engine for playing infinite 4-wide combos.
//!
//! Built on [`combo_game`]: scorers that count viable 7-bag continuations,
//! policies that pick the next state, an exact MDP solver over stable game
//! states, a streaming game driver, and binary snapshots for everything
//! expensive to rebuild.

pub mod game;
pub mod mdp;
pub mod policy;
pub mod scorer;
pub mod snapshot;

pub use game::{resume_game, start_game};
pub use mdp::{GameState, MDPPolicy, MDP};
pub use policy::{Policy, ScorePolicy};
pub use scorer::{ConsumedScorer, NFAScorer, Scorer};
