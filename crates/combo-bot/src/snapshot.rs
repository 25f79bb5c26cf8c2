//! Binary snapshots for everything expensive to rebuild.
//!
//! Scorer tables, MDP value maps and solved policies are bincode
//! envelopes; the sequence-set tries inside keep their own byte framing
//! (see [`combo_game::SeqSet::encode`]). The NFA and the fallback
//! policies are cheap and get reconstructed from code at load time.

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{ensure, Context, Result};
use combo_game::{all_continuous_moves, SeqSet, State, NFA};
use tracing::info;

use crate::mdp::{GameState, MDPPolicy, MDP};
use crate::policy::ScorePolicy;
use crate::scorer::{ConsumedScorer, NFAScorer};

impl NFAScorer {
    /// Encodes the permutation length and the per-state inviable tries.
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(&(self.permutation_len() as u32, &self.inviable))
            .context("encoding scorer")
    }

    /// Decodes a scorer snapshot, recomputing the cached trie sizes.
    pub fn decode(nfa: Arc<NFA>, bytes: &[u8]) -> Result<NFAScorer> {
        let (permutation_len, inviable): (u32, HashMap<State, SeqSet>) =
            bincode::deserialize(bytes).context("decoding scorer")?;
        Ok(NFAScorer::from_inviable(
            nfa,
            permutation_len as usize,
            inviable,
        ))
    }
}

impl MDP {
    /// Encodes the preview length, the value map and the value cap.
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(&(self.preview_len as u32, &self.value, self.max_value))
            .context("encoding MDP")
    }

    /// Decodes an MDP snapshot. Snapshots written before value caps
    /// existed end after the value map and decode as unbounded.
    ///
    /// The policy is not stored: a snapshot holding only seed values gets
    /// the scorer-initialized policy, anything further along gets a cheap
    /// placeholder refined by one policy pass.
    pub fn decode(bytes: &[u8]) -> Result<MDP> {
        let mut cursor = Cursor::new(bytes);
        let preview_len: u32 =
            bincode::deserialize_from(&mut cursor).context("decoding MDP preview length")?;
        ensure!(
            (1..=7).contains(&preview_len),
            "snapshot has invalid preview length {preview_len}"
        );
        let value: HashMap<GameState, u32> =
            bincode::deserialize_from(&mut cursor).context("decoding MDP value map")?;
        let max_value: Option<u32> = if (cursor.position() as usize) < bytes.len() {
            bincode::deserialize_from(&mut cursor).context("decoding MDP value cap")?
        } else {
            None
        };
        info!("decoded MDP snapshot with {} game states", value.len());

        let mut mdp = MDP {
            nfa: Arc::new(NFA::new(&all_continuous_moves())),
            preview_len: preview_len as usize,
            max_value,
            policy: HashMap::new(),
            value,
        };
        if mdp.value.values().all(|&v| v == 1) {
            mdp.init_policy();
        } else {
            let placeholder: HashMap<GameState, State> = mdp
                .value
                .keys()
                .map(|g| {
                    let choice = mdp
                        .nfa
                        .next_states(g.state, g.current)
                        .first()
                        .copied()
                        .expect("stable game states always have a continuation");
                    (*g, choice)
                })
                .collect();
            mdp.policy = placeholder;
            mdp.update_policy();
        }
        Ok(mdp)
    }

    /// Writes a snapshot to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let start = Instant::now();
        let bytes = self.encode()?;
        fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))?;
        info!(
            "saved {} bytes to {} in {:?}",
            bytes.len(),
            path.display(),
            start.elapsed()
        );
        Ok(())
    }
}

impl MDPPolicy {
    /// Encodes the choice dictionary and the compression flag.
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(&(&self.policy, self.compressed)).context("encoding policy")
    }

    /// Decodes a policy snapshot, rebuilding the automaton and the
    /// fallback policy matching the compression flag.
    pub fn decode(bytes: &[u8]) -> Result<MDPPolicy> {
        let (policy, compressed): (HashMap<GameState, State>, bool) =
            bincode::deserialize(bytes).context("decoding policy")?;
        let nfa = Arc::new(NFA::new(&all_continuous_moves()));
        let default_policy = if compressed {
            ScorePolicy::from_scorer(nfa.clone(), NFAScorer::new(nfa.clone(), 7))
        } else {
            ScorePolicy::from_scorer(nfa.clone(), ConsumedScorer::new(nfa.clone()))
        };
        Ok(MDPPolicy {
            policy,
            compressed,
            default_policy,
        })
    }

    /// Writes a snapshot to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.encode()?;
        fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))?;
        info!("saved {} policy entries to {}", self.policy.len(), path.display());
        Ok(())
    }
}
