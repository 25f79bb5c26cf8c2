//! Exact expected-combo values over stable game states.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::{ensure, Result};
use combo_game::{
    all_continuous_moves, all_piece_sets, Piece, PieceSet, Seq, State, NFA,
};
use crossbeam_channel::bounded;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::policy::{Policy, ScorePolicy};
use crate::scorer::{ConsumedScorer, NFAScorer};

/// Everything knowable about the current situation while playing 4-wide
/// combos. Usable as a map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameState {
    pub state: State,
    pub current: Piece,
    pub preview: Seq,
    pub bag_used: PieceSet,
}

/// A Markov decision process over the stable game states: those with a
/// piece held, not swap-restricted, from which some choice lets the
/// automaton consume the current piece and the whole preview.
///
/// `value[g]` is the expected number of combos beyond the preview horizon
/// under the current policy, within one combo of exact at convergence. A
/// game state missing from the map can consume at most the preview, which
/// is conveniently the zero value.
///
/// Not safe for concurrent use; export a policy for that.
pub struct MDP {
    pub(crate) nfa: Arc<NFA>,
    pub(crate) preview_len: usize,
    /// Value clip; `None` is unbounded.
    pub(crate) max_value: Option<u32>,

    /// The chosen next state for every known game state.
    pub(crate) policy: HashMap<GameState, State>,
    pub(crate) value: HashMap<GameState, u32>,
}

impl MDP {
    /// Enumerates the stable game states for the given preview length and
    /// seeds their values, then initializes the policy from a scorer of
    /// the same length.
    ///
    /// `max_combo`, when given, caps values at `max_combo - preview_len`
    /// and must exceed the preview length.
    pub fn new(preview_len: usize, max_combo: Option<u32>) -> Result<MDP> {
        ensure!(
            (1..=7).contains(&preview_len),
            "preview_len must be between 1 and 7, got {preview_len}"
        );
        let max_value = match max_combo {
            Some(m) => {
                ensure!(
                    m as usize > preview_len,
                    "max_combo ({m}) must be greater than preview_len ({preview_len})"
                );
                Some(m - preview_len as u32)
            }
            None => None,
        };

        let nfa = Arc::new(NFA::new(&all_continuous_moves()));

        // States that only show up in the opening are not worth solving.
        let filtered: Vec<State> = nfa
            .states()
            .into_iter()
            .filter(|s| !s.swap_restricted && s.hold != Piece::Empty)
            .collect();

        let start = Instant::now();
        let (tx, rx) = bounded::<GameState>(5000);
        let collector = thread::spawn(move || {
            let mut value = HashMap::new();
            for g in rx {
                value.insert(g, 1u32);
            }
            value
        });

        all_piece_sets().into_par_iter().for_each_with(tx, |tx, bag_used| {
            // Sequences are generated backwards from the final bag state,
            // then reversed: the last preview slot is the most recently
            // revealed piece and must be a member of the bag.
            let mut reversed = vec![Piece::Empty; preview_len + 1];
            for_each_seq(bag_used.inverted(), preview_len + 1, &mut |seq| {
                for (i, &p) in seq.iter().enumerate() {
                    reversed[seq.len() - 1 - i] = p;
                }
                let current = reversed[0];
                let preview = Seq::new(&reversed[1..]).expect("preview fits in a sequence");
                for &state in &filtered {
                    let g = GameState {
                        state,
                        current,
                        preview,
                        bag_used,
                    };
                    if is_stable(&nfa, preview_len, &g) {
                        tx.send(g).expect("collector outlives the producers");
                    }
                }
            });
        });
        let value = collector.join().expect("collector thread panicked");
        info!(
            "enumerated {} stable game states in {:?}",
            value.len(),
            start.elapsed()
        );

        let mut mdp = MDP {
            nfa,
            preview_len,
            max_value,
            policy: HashMap::new(),
            value,
        };
        mdp.init_policy();
        Ok(mdp)
    }

    #[must_use]
    pub fn preview_len(&self) -> usize {
        self.preview_len
    }

    #[must_use]
    pub fn values(&self) -> &HashMap<GameState, u32> {
        &self.value
    }

    /// Initial policy: whatever a scorer of the preview length would do.
    pub(crate) fn init_policy(&mut self) {
        let scorer = NFAScorer::new(self.nfa.clone(), self.preview_len);
        let policy = ScorePolicy::from_scorer(self.nfa.clone(), scorer);
        self.policy = self
            .value
            .par_iter()
            .map(|(g, _)| {
                let choice = policy
                    .next_state(g.state, g.current, &g.preview.to_vec(), g.bag_used)
                    .expect("stable game states always have a continuation");
                (*g, choice)
            })
            .collect();
    }

    /// The expected number of pieces consumed from `g` under the solved
    /// policy. Exact (within one) only after [`update`](MDP::update) has
    /// converged.
    #[must_use]
    pub fn expected_value(&self, g: &GameState) -> u32 {
        if let Some(&v) = self.value.get(g) {
            return v + self.preview_len as u32;
        }
        let start = self.nfa.next_states(g.state, g.current);
        if start.is_empty() {
            return 0;
        }
        let (_, consumed) = self
            .nfa
            .end_states(&start.into_iter().collect(), &g.preview.to_vec());
        consumed as u32 + 1
    }

    /// The successor game states of choosing `choice` from `g`, one per
    /// piece the bag can still produce. All are equally likely.
    fn possibilities(preview_len: usize, g: &GameState, choice: State) -> Vec<GameState> {
        let current = g.preview.at(0);
        let shifted = g.preview.remove_first();

        let mut bag = g.bag_used;
        if bag.len() == 7 {
            bag = PieceSet::default();
        }
        let possible_next = bag.inverted().to_vec();
        possible_next
            .into_iter()
            .map(|p| {
                let new_bag = if g.bag_used.len() == 7 {
                    p.piece_set()
                } else {
                    bag.add(p)
                };
                GameState {
                    state: choice,
                    current,
                    preview: shifted.set(preview_len - 1, p),
                    bag_used: new_bag,
                }
            })
            .collect()
    }

    /// One plus the mean successor value (truncating), clipped at the cap.
    /// Must stay in sync with the formula in [`update_values`](MDP::update_values).
    fn calc_value(&self, g: &GameState, choice: State) -> u32 {
        let possibilities = Self::possibilities(self.preview_len, g, choice);
        let total: u64 = possibilities
            .iter()
            .map(|next| *self.value.get(next).unwrap_or(&0) as u64)
            .sum();
        let v = 1 + (total / possibilities.len() as u64) as u32;
        match self.max_value {
            Some(max) => v.min(max),
            None => v,
        }
    }

    /// Re-picks the best choice for every game state below the value cap,
    /// preferring the incumbent on ties so that values stay lower bounds.
    /// Returns the number of changed choices.
    pub fn update_policy(&mut self) -> usize {
        let keys: Vec<GameState> = self.policy.keys().copied().collect();
        let mut changed = 0;
        for g in keys {
            if let Some(max) = self.max_value {
                if self.value[&g] >= max {
                    continue;
                }
            }
            let choices = self.nfa.next_states(g.state, g.current);
            if choices.len() == 1 {
                self.policy.insert(g, choices[0]);
                continue;
            }

            let current_choice = self.policy[&g];
            let mut best_choice = current_choice;
            let mut best_val = self.calc_value(&g, current_choice);
            for choice in choices {
                if choice == current_choice {
                    continue;
                }
                let v = self.calc_value(&g, choice);
                if v > best_val {
                    best_val = v;
                    best_choice = choice;
                }
            }
            if best_choice != current_choice {
                changed += 1;
                self.policy.insert(g, best_choice);
                self.value.insert(g, best_val);
            }
        }
        info!("updated policy with {changed} changes");
        changed
    }

    /// Sweeps values to their fixed point under the current policy.
    ///
    /// Builds a static graph of value cells with dependency pointers once,
    /// then lets shards of workers recompute cells until nothing moves.
    /// Workers read neighbouring cells without locks: a stale read is
    /// harmless because cell updates are atomic-sized and values are
    /// monotone non-decreasing, so every read sees the previous or a
    /// better value and the same equilibrium is reached.
    ///
    /// Returns how many entries differ from before the call.
    pub fn update_values(&mut self) -> usize {
        let gstates: Vec<GameState> = self.value.keys().copied().collect();
        let index: HashMap<GameState, u32> = gstates
            .iter()
            .enumerate()
            .map(|(i, g)| (*g, i as u32))
            .collect();
        let cells: Vec<AtomicU32> = gstates
            .iter()
            .map(|g| AtomicU32::new(self.value[g]))
            .collect();

        // Dependencies are the successors present in the map; absent ones
        // contribute zero but still count as possibilities.
        let preview_len = self.preview_len;
        let deps: Vec<(Vec<u32>, u32)> = gstates
            .par_iter()
            .map(|g| {
                let possibilities = Self::possibilities(preview_len, g, self.policy[g]);
                let pointers = possibilities
                    .iter()
                    .filter_map(|next| index.get(next).copied())
                    .collect();
                (pointers, possibilities.len() as u32)
            })
            .collect();

        let max_value = self.max_value;
        for pass in 0.. {
            let changes: usize = cells
                .par_iter()
                .enumerate()
                .with_min_len(4096)
                .map(|(i, cell)| {
                    let (ref pointers, possibilities) = deps[i];
                    let total: u64 = pointers
                        .iter()
                        .map(|&j| cells[j as usize].load(Ordering::Relaxed) as u64)
                        .sum();
                    let mut new = 1 + (total / possibilities as u64) as u32;
                    if let Some(max) = max_value {
                        new = new.min(max);
                    }
                    let old = cell.load(Ordering::Relaxed);
                    if new == old {
                        return 0;
                    }
                    debug_assert!(new > old, "values must be monotone non-decreasing");
                    cell.store(new, Ordering::Relaxed);
                    1
                })
                .sum();
            debug!("updated {changes} values (pass #{pass})");
            if changes == 0 {
                break;
            }
        }

        let mut total_changes = 0;
        for (i, g) in gstates.iter().enumerate() {
            let new = cells[i].load(Ordering::Relaxed);
            let old = self.value.insert(*g, new).expect("key came from the map");
            if old != new {
                total_changes += 1;
            }
        }
        total_changes
    }

    /// Alternates value sweeps and policy improvement until neither
    /// changes anything. `after_values_pass` runs after every value sweep
    /// that changed something, for persisting progress.
    pub fn update(&mut self, mut after_values_pass: impl FnMut(&MDP) -> Result<()>) -> Result<()> {
        for iteration in 0.. {
            let start = Instant::now();
            let value_changes = self.update_values();
            info!(
                "update_values (iteration #{iteration}) with {value_changes} changes in {:?}",
                start.elapsed()
            );
            if value_changes == 0 {
                return Ok(());
            }
            after_values_pass(self)?;

            let start = Instant::now();
            let policy_changes = self.update_policy();
            info!(
                "update_policy (iteration #{iteration}) with {policy_changes} changes in {:?}",
                start.elapsed()
            );
            if policy_changes == 0 {
                return Ok(());
            }
        }
        unreachable!()
    }

    /// The solved policy with every known game state spelled out. Misses
    /// fall back to the cheap consumed-count scorer.
    #[must_use]
    pub fn policy(&self) -> MDPPolicy {
        MDPPolicy {
            policy: self.policy.clone(),
            compressed: false,
            default_policy: ScorePolicy::from_scorer(
                self.nfa.clone(),
                ConsumedScorer::new(self.nfa.clone()),
            ),
        }
    }

    /// The solved policy keeping only the game states where the choice is
    /// neither forced nor what the operational-maximum scorer (length 7)
    /// would pick anyway; that scorer is the fallback.
    #[must_use]
    pub fn compressed_policy(&self) -> MDPPolicy {
        let default_policy =
            ScorePolicy::from_scorer(self.nfa.clone(), NFAScorer::new(self.nfa.clone(), 7));

        let policy: HashMap<GameState, State> = self
            .policy
            .par_iter()
            .filter_map(|(g, &choice)| {
                if self.nfa.next_states(g.state, g.current).len() <= 1 {
                    return None;
                }
                let default_choice = default_policy.next_state(
                    g.state,
                    g.current,
                    &g.preview.to_vec(),
                    g.bag_used,
                );
                if default_choice == Some(choice) {
                    return None;
                }
                Some((*g, choice))
            })
            .collect();

        info!(
            "compressed policy from {} to {} entries",
            self.policy.len(),
            policy.len()
        );
        MDPPolicy {
            policy,
            compressed: true,
            default_policy,
        }
    }
}

/// A game state is stable when the current piece plus the whole preview
/// can be consumed by some line of play.
fn is_stable(nfa: &NFA, preview_len: usize, g: &GameState) -> bool {
    let start = nfa.next_states(g.state, g.current);
    if start.is_empty() {
        return false;
    }
    let (_, consumed) = nfa.end_states(&start.into_iter().collect(), &g.preview.to_vec());
    consumed == preview_len
}

/// Calls `f` with every sequence of `seq_len` pieces a 7-bag randomizer
/// can produce starting from `bag_used`.
fn for_each_seq(bag_used: PieceSet, seq_len: usize, f: &mut impl FnMut(&[Piece])) {
    let mut seq = vec![Piece::Empty; seq_len];
    for_each_seq_helper(&mut seq, bag_used, 0, f);
}

fn for_each_seq_helper(
    seq: &mut [Piece],
    mut bag_used: PieceSet,
    idx: usize,
    f: &mut impl FnMut(&[Piece]),
) {
    if bag_used.len() == 7 {
        bag_used = PieceSet::default();
    }
    for p in bag_used.inverted().to_vec() {
        seq[idx] = p;
        if idx == seq.len() - 1 {
            f(seq);
        } else {
            for_each_seq_helper(seq, bag_used.add(p), idx + 1, f);
        }
    }
}

/// Just the information needed to use a solved policy: the dictionary and
/// a fallback. Safe for concurrent use.
pub struct MDPPolicy {
    pub(crate) policy: HashMap<GameState, State>,
    pub(crate) compressed: bool,
    pub(crate) default_policy: ScorePolicy,
}

impl MDPPolicy {
    #[must_use]
    pub fn len(&self) -> usize {
        self.policy.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policy.is_empty()
    }
}

impl Policy for MDPPolicy {
    fn next_state(
        &self,
        initial: State,
        current: Piece,
        preview: &[Piece],
        end_bag_used: PieceSet,
    ) -> Option<State> {
        let g = GameState {
            state: initial,
            current,
            preview: Seq::new(preview).expect("preview fits in a sequence"),
            bag_used: end_bag_used,
        };
        if let Some(&choice) = self.policy.get(&g) {
            return Some(choice);
        }
        self.default_policy
            .next_state(initial, current, preview, end_bag_used)
    }
}
