//! Game model for infinite 4-wide combo play.
//!
//! The playing field is abstracted to a 4x4 well in which every placed piece
//! must clear exactly one line. This crate holds the value types (pieces,
//! piece sets, packed sequences), the prefix-trie sequence algebra, the
//! 4x4 bitboard with its catalogue of continuation moves, and the NFA whose
//! transitions encode every legal line-clearing move.

pub mod action;
pub mod field;
pub mod moves;
pub mod nfa;
pub mod piece;
pub mod seq;
pub mod seqset;

pub use action::Action;
pub use field::{Field4x4, LEFT_I, LEFT_Z, RIGHT_I};
pub use moves::{all_continuous_moves, Move};
pub use nfa::{State, StateSet, NFA};
pub use piece::{all_piece_sets, rand_pieces, rand_pieces_with, Piece, PieceSet, NONEMPTY_PIECES};
pub use seq::Seq;
pub use seqset::{permutations, SeqSet};
