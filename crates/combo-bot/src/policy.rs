//! Policies pick the next state for a situation.

use std::sync::Arc;

use combo_game::{Piece, PieceSet, State, NFA};
use rayon::prelude::*;

use crate::scorer::Scorer;

/// Given the current situation, returns the chosen next state, or `None`
/// when no continuation exists. Implementations are immutable and safe to
/// share across game drivers.
pub trait Policy: Send + Sync {
    fn next_state(
        &self,
        initial: State,
        current: Piece,
        preview: &[Piece],
        end_bag_used: PieceSet,
    ) -> Option<State>;
}

/// Picks the next state with the best score.
///
/// With several scorers, each one narrows the tied candidates of the one
/// before it; the first candidate surviving every scorer wins. Scoring
/// across candidates runs in parallel.
pub struct ScorePolicy {
    nfa: Arc<NFA>,
    scorers: Vec<Box<dyn Scorer>>,
}

impl ScorePolicy {
    #[must_use]
    pub fn from_scorer(nfa: Arc<NFA>, scorer: impl Scorer + 'static) -> ScorePolicy {
        ScorePolicy {
            nfa,
            scorers: vec![Box::new(scorer)],
        }
    }

    #[must_use]
    pub fn from_scorers(nfa: Arc<NFA>, scorers: Vec<Box<dyn Scorer>>) -> ScorePolicy {
        assert!(!scorers.is_empty(), "at least one scorer is required");
        ScorePolicy { nfa, scorers }
    }
}

impl Policy for ScorePolicy {
    fn next_state(
        &self,
        initial: State,
        current: Piece,
        preview: &[Piece],
        end_bag_used: PieceSet,
    ) -> Option<State> {
        let mut candidates = self.nfa.next_states(initial, current);
        match candidates.len() {
            0 => return None,
            1 => return Some(candidates[0]),
            _ => {}
        }

        for scorer in &self.scorers {
            if candidates.len() == 1 {
                break;
            }
            let scores: Vec<i64> = candidates
                .par_iter()
                .map(|&choice| scorer.score(choice, preview, end_bag_used))
                .collect();
            let best = *scores.iter().max().expect("candidates are non-empty");
            candidates = candidates
                .into_iter()
                .zip(&scores)
                .filter(|&(_, &score)| score == best)
                .map(|(choice, _)| choice)
                .collect();
        }
        candidates.first().copied()
    }
}
