//! The non-deterministic automaton over playing-field states.

use std::collections::{HashMap, HashSet};
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::field::Field4x4;
use crate::moves::Move;
use crate::piece::{Piece, NONEMPTY_PIECES};

/// The state of the playing field, not including the queue.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct State {
    pub field: Field4x4,
    /// The piece being held. `Empty` only before the first hold of a game.
    pub hold: Piece,
    /// Set right after a hold; the hold piece cannot be swapped again until
    /// a piece has been played.
    pub swap_restricted: bool,
}

impl State {
    #[must_use]
    pub fn with_field(field: Field4x4) -> State {
        State {
            field,
            ..State::default()
        }
    }
}

impl Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hold:\n{}", self.hold.game_string())?;
        if self.swap_restricted {
            write!(f, " (restricted)")?;
        }
        write!(f, "\nField:\n{}", self.field)
    }
}

/// An unordered set of states, compared by membership.
pub type StateSet = HashSet<State>;

/// A non-deterministic finite automaton with a few differences: every state
/// is final and there is no initial state. Transitions are keyed by the
/// next piece from the queue and encode every legal line-clearing move,
/// including holds and hold swaps.
///
/// An `NFA` is immutable after construction and safe to share across
/// threads; callers should build one and reuse it everywhere.
#[derive(Debug)]
pub struct NFA {
    /// `trans[piece as usize][state]` lists the possible next states.
    trans: [HashMap<State, Vec<State>>; 8],
}

impl NFA {
    /// Builds the automaton from a move catalogue.
    #[must_use]
    pub fn new(moves_list: &[Move]) -> NFA {
        // Group the moves by start field and piece.
        let mut start_fields: HashSet<Field4x4> = HashSet::new();
        for m in moves_list {
            start_fields.insert(m.start);
        }
        let mut moves: HashMap<Field4x4, HashMap<Piece, Vec<Field4x4>>> = start_fields
            .iter()
            .map(|&field| (field, HashMap::new()))
            .collect();
        for m in moves_list {
            moves
                .get_mut(&m.start)
                .unwrap()
                .entry(m.piece)
                .or_default()
                .push(m.end);
        }
        fn ends(
            moves: &HashMap<Field4x4, HashMap<Piece, Vec<Field4x4>>>,
            field: Field4x4,
            piece: Piece,
        ) -> &[Field4x4] {
            moves[&field].get(&piece).map_or(&[], Vec::as_slice)
        }

        let mut trans: [HashMap<State, Vec<State>>; 8] = Default::default();

        // Transitions from states with no hold piece: hold the piece, or
        // play it.
        for &field in &start_fields {
            for piece in NONEMPTY_PIECES {
                let mut end_states = vec![State {
                    field,
                    hold: piece,
                    swap_restricted: true,
                }];
                end_states.extend(
                    ends(&moves, field, piece)
                        .iter()
                        .map(|&end| State::with_field(end)),
                );
                trans[piece as usize]
                    .entry(State::with_field(field))
                    .or_default()
                    .extend(end_states);
            }
        }

        // Transitions from swap-restricted states: the piece can only be
        // played, after which the hold unlocks.
        for &field in &start_fields {
            for hold in NONEMPTY_PIECES {
                let state = State {
                    field,
                    hold,
                    swap_restricted: true,
                };
                for piece in NONEMPTY_PIECES {
                    let end_states: Vec<State> = ends(&moves, field, piece)
                        .iter()
                        .map(|&end| State {
                            field: end,
                            hold,
                            swap_restricted: false,
                        })
                        .collect();
                    if !end_states.is_empty() {
                        trans[piece as usize]
                            .entry(state)
                            .or_default()
                            .extend(end_states);
                    }
                }
            }
        }

        // Transitions from states with a swappable hold: play the piece
        // and keep the hold, or swap and play the previously held piece.
        for &field in &start_fields {
            for hold in NONEMPTY_PIECES {
                let state = State {
                    field,
                    hold,
                    swap_restricted: false,
                };
                for piece in NONEMPTY_PIECES {
                    let mut end_states: Vec<State> = ends(&moves, field, piece)
                        .iter()
                        .map(|&end| State {
                            field: end,
                            hold,
                            swap_restricted: false,
                        })
                        .collect();
                    end_states.extend(ends(&moves, field, hold).iter().map(|&end| State {
                        field: end,
                        hold: piece,
                        swap_restricted: false,
                    }));
                    if !end_states.is_empty() {
                        trans[piece as usize]
                            .entry(state)
                            .or_default()
                            .extend(end_states);
                    }
                }
            }
        }

        NFA { trans }
    }

    /// The possible next states. The returned list is a fresh copy.
    #[must_use]
    pub fn next_states(&self, initial: State, piece: Piece) -> Vec<State> {
        self.trans[piece as usize]
            .get(&initial)
            .cloned()
            .unwrap_or_default()
    }

    /// Threads `pieces` through the automaton from a set of initial
    /// states. Returns the reachable end states together with the number
    /// of consumed pieces; when not every piece can be consumed, the
    /// states before the first stuck piece are returned.
    #[must_use]
    pub fn end_states(&self, initial: &StateSet, pieces: &[Piece]) -> (StateSet, usize) {
        let mut cur = initial.clone();
        let mut next = StateSet::new();
        for (idx, &piece) in pieces.iter().enumerate() {
            let trans = &self.trans[piece as usize];
            for state in &cur {
                if let Some(nexts) = trans.get(state) {
                    next.extend(nexts.iter().copied());
                }
            }
            if next.is_empty() {
                return (cur, idx);
            }
            std::mem::swap(&mut cur, &mut next);
            next.clear();
        }
        (cur, pieces.len())
    }

    /// Every state appearing in the automaton, as key or value.
    #[must_use]
    pub fn states(&self) -> StateSet {
        let mut states = StateSet::new();
        for trans in &self.trans {
            for (input, outputs) in trans {
                states.insert(*input);
                states.extend(outputs.iter().copied());
            }
        }
        states
    }
}
