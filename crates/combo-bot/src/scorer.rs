//! Scorers rank situations by how many continuations stay winnable.

use std::collections::HashMap;
use std::sync::Arc;

use combo_game::{permutations, Piece, PieceSet, SeqSet, State, StateSet, NFA, NONEMPTY_PIECES};
use dashmap::DashMap;
use rayon::prelude::*;
use tracing::debug;

/// Scores how good a situation is: the state just chosen, the known
/// preview, and the pieces already used from the current bag. Higher is
/// better. Scores are only comparable between calls with the same preview
/// and bag.
pub trait Scorer: Send + Sync {
    fn score(&self, state: State, preview: &[Piece], bag_used: PieceSet) -> i64;
}

// The three score components are packed into bit ranges so that plain
// integer comparison orders them lexicographically: consumed preview
// pieces first, then viable bag-law permutations, then the end-state
// count as a small tie-break.
const STATE_BITS: u32 = 10;
const PERMUTATION_BITS: u32 = 40;
const CONSUMED_SHIFT: u32 = PERMUTATION_BITS + STATE_BITS;

/// Scores situations by the number of piece permutations of a fixed length
/// that still have a possible solution.
///
/// For every NFA state the scorer precomputes the set of sequences of
/// exactly `permutation_len` pieces on which no trajectory from that state
/// survives. Scoring then intersects those sets across the reachable end
/// states, restricted to the sequences the 7-bag randomizer can actually
/// produce.
pub struct NFAScorer {
    nfa: Arc<NFA>,
    permutation_len: usize,
    /// The sequences that fail, for each state.
    pub(crate) inviable: HashMap<State, SeqSet>,
    /// Cached `inviable[s].size(permutation_len)` for each state.
    sizes: HashMap<State, u64>,
}

impl NFAScorer {
    /// Precomputes the inviable-sequence tries for every state of the
    /// automaton by a bottom-up fixed point of `permutation_len` steps.
    #[must_use]
    pub fn new(nfa: Arc<NFA>, permutation_len: usize) -> NFAScorer {
        let states: Vec<State> = nfa.states().into_iter().collect();

        // Step 0: every zero-length sequence is viable everywhere.
        let mut inviable: HashMap<State, SeqSet> =
            states.iter().map(|&s| (s, SeqSet::Empty)).collect();

        for step in 1..=permutation_len {
            let next: DashMap<State, SeqSet> = DashMap::with_capacity(states.len());
            states.par_iter().for_each(|&state| {
                let mut children: [SeqSet; 7] = Default::default();
                for piece in NONEMPTY_PIECES {
                    let successors = nfa.next_states(state, piece);
                    // No successor on this piece: every sequence starting
                    // with it fails. Otherwise a sequence fails only if it
                    // fails from every successor, with the all-sequences
                    // set as the intersection identity.
                    let mut acc = SeqSet::All;
                    if successors.is_empty() {
                        children[piece.index()] = acc;
                        continue;
                    }
                    for successor in successors {
                        acc = acc.intersection(&inviable[&successor]);
                        if matches!(acc, SeqSet::Empty) {
                            break;
                        }
                    }
                    children[piece.index()] = acc;
                }
                next.insert(state, SeqSet::prepended(children));
            });
            inviable = next.into_iter().collect();
            debug!("inviable fixed point step {step}/{permutation_len} done");
        }

        let sizes = inviable
            .iter()
            .map(|(&s, set)| (s, set.size(permutation_len as u32)))
            .collect();
        NFAScorer {
            nfa,
            permutation_len,
            inviable,
            sizes,
        }
    }

    /// Rebuilds a scorer from decoded inviable tries, recomputing the
    /// cached sizes.
    #[must_use]
    pub(crate) fn from_inviable(
        nfa: Arc<NFA>,
        permutation_len: usize,
        inviable: HashMap<State, SeqSet>,
    ) -> NFAScorer {
        let sizes = inviable
            .iter()
            .map(|(&s, set)| (s, set.size(permutation_len as u32)))
            .collect();
        NFAScorer {
            nfa,
            permutation_len,
            inviable,
            sizes,
        }
    }

    #[must_use]
    pub fn permutation_len(&self) -> usize {
        self.permutation_len
    }
}

impl Scorer for NFAScorer {
    fn score(&self, state: State, preview: &[Piece], bag_used: PieceSet) -> i64 {
        let initial: StateSet = [state].into_iter().collect();
        let (end_states, consumed) = self.nfa.end_states(&initial, preview);

        // Intersect the smallest inviable sets first; the working set only
        // shrinks, so this prunes fastest. States unknown to the scorer
        // have no recorded failures.
        let mut states: Vec<&State> = end_states.iter().collect();
        states.sort_by_key(|s| self.sizes.get(*s).copied().unwrap_or(0));

        let mut inviable = permutations(bag_used);
        for s in states {
            match self.inviable.get(s) {
                Some(set) => inviable = inviable.intersection(set),
                None => inviable = SeqSet::Empty,
            }
            if matches!(inviable, SeqSet::Empty) {
                break;
            }
        }
        let length = self.permutation_len as u32;
        let invalid = inviable.size(length);
        let viable = permutations(bag_used).size(length) - invalid;

        debug_assert!(consumed < 1 << 13);
        debug_assert!(viable < 1 << PERMUTATION_BITS);
        debug_assert!(end_states.len() < 1 << STATE_BITS);
        ((consumed as i64) << CONSUMED_SHIFT)
            | ((viable as i64) << STATE_BITS)
            | end_states.len() as i64
    }
}

/// The simplest scorer: how many of the known next pieces can be consumed
/// at all. Used as the fallback policy of uncompressed MDP policies, where
/// misses are rare and cheap decisions matter more than good ones.
pub struct ConsumedScorer {
    nfa: Arc<NFA>,
}

impl ConsumedScorer {
    #[must_use]
    pub fn new(nfa: Arc<NFA>) -> ConsumedScorer {
        ConsumedScorer { nfa }
    }
}

impl Scorer for ConsumedScorer {
    fn score(&self, state: State, preview: &[Piece], _bag_used: PieceSet) -> i64 {
        let initial: StateSet = [state].into_iter().collect();
        let (_, consumed) = self.nfa.end_states(&initial, preview);
        consumed as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use combo_game::{all_continuous_moves, rand_pieces_with, LEFT_I};
    use rand::rngs::StdRng;
    use rand::seq::IndexedRandom;
    use rand::SeedableRng;

    fn nfa() -> Arc<NFA> {
        Arc::new(NFA::new(&all_continuous_moves()))
    }

    #[test]
    fn test_inviable_length_1_matches_nfa() {
        let nfa = nfa();
        let scorer = NFAScorer::new(nfa.clone(), 1);
        for state in nfa.states() {
            for piece in NONEMPTY_PIECES {
                let want = nfa.next_states(state, piece).is_empty();
                assert_eq!(
                    scorer.inviable[&state].contains(&[piece]),
                    want,
                    "state {state} piece {piece}"
                );
            }
        }
    }

    #[test]
    fn test_inviable_sets_grow_with_length() {
        let nfa = nfa();
        let short = NFAScorer::new(nfa.clone(), 2);
        let long = NFAScorer::new(nfa.clone(), 3);
        for state in nfa.states() {
            // A failing 2-sequence stays failing however it is extended.
            for prefix in short.inviable[&state].prefixes() {
                if prefix.len() > 2 {
                    continue;
                }
                let mut extended = prefix.clone();
                while extended.len() < 3 {
                    extended.push(Piece::T);
                }
                assert!(
                    long.inviable[&state].contains(&extended),
                    "state {state}: {prefix:?} fails at length 2 but {extended:?} not at 3"
                );
            }
        }
    }

    #[test]
    fn test_score_consumed_component() {
        let nfa = nfa();
        let scorer = NFAScorer::new(nfa.clone(), 3);
        let states: Vec<State> = nfa.states().into_iter().collect();
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..200 {
            let &state = states.choose(&mut rng).unwrap();
            let preview = rand_pieces_with(&mut rng, 5);
            let bag = PieceSet::new(&preview[..3]);

            let score = scorer.score(state, &preview, bag);
            let initial: StateSet = [state].into_iter().collect();
            let (_, consumed) = nfa.end_states(&initial, &preview);
            assert_eq!(
                (score >> CONSUMED_SHIFT) as usize,
                consumed,
                "state {state} preview {preview:?}"
            );
        }
    }

    #[test]
    fn test_consumed_scorer() {
        let nfa = nfa();
        let scorer = ConsumedScorer::new(nfa.clone());
        let state = State::with_field(LEFT_I);
        use combo_game::Piece::{J, L, O, S};
        assert_eq!(scorer.score(state, &[S, O, L], PieceSet::default()), 3);
        assert_eq!(scorer.score(state, &[J, O, S], PieceSet::default()), 2);
    }

    #[test]
    fn test_dead_state_scores_lowest() {
        let nfa = nfa();
        let scorer = NFAScorer::new(nfa.clone(), 2);
        let alive = State::with_field(LEFT_I);
        // A field no catalogue move starts from is immediately dead.
        let dead = State::with_field(combo_game::Field4x4::new(&[
            [true, false, true, false],
            [false, true, false, true],
        ]));
        let preview = [Piece::T, Piece::I];
        let bag = PieceSet::default();
        assert!(scorer.score(alive, &preview, bag) > scorer.score(dead, &preview, bag));
    }
}
