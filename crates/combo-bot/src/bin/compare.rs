//! Compares policies over random 7-bag piece queues.
//!
//! Runs every policy through the same queues and prints a table of the
//! average survival length and the share of trials reaching each
//! checkpoint, next to the NFA upper bound (the best any policy could do
//! with the whole queue known in advance).
//!
//! Sample output:
//!
//! ```text
//! Preview Size = 5 pieces
//! Trials = 200
//! Max sequence per trial = 5000
//!               Avg      Reach 100  Reach 500  Reach 1000  Reach 2000  Reach 5000
//! Seq 3         279.1    59.1%      19.1%      4.8%        0.3%        0.0%
//! Seq 7         452.8    65.0%      31.2%      12.4%       2.1%        0.0%
//! Upper-bound   3815.9   76.3%      76.3%      76.2%       76.2%       76.2%
//! ```

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use combo_bot::{start_game, MDPPolicy, NFAScorer, Policy, ScorePolicy};
use combo_game::{
    all_continuous_moves, rand_pieces_with, Piece, State, StateSet, LEFT_I, NFA,
};
use crossbeam_channel::bounded;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::{info, Level};

/// Survival lengths worth reporting.
const CHECKPOINTS: [usize; 5] = [100, 500, 1000, 2000, 5000];

#[derive(Debug, Parser)]
#[command(about = "Compares combo policies over random piece queues")]
struct Cli {
    #[arg(long, default_value_t = 200, help = "The number of trials per policy")]
    num_trials: usize,

    #[arg(
        long,
        default_value_t = 5,
        help = "The number of pieces visible in the preview"
    )]
    preview_size: usize,

    #[arg(long, help = "Seed for deterministic queues; random when absent")]
    seed: Option<u64>,

    #[arg(long, help = "Also compare the MDP policy stored at this path")]
    mdp_policy_file: Option<PathBuf>,

    #[arg(short = 'v', long, action = clap::ArgAction::Count, help = "Increase verbosity level (-v = ERROR, -vv = WARN, -vvv = INFO, -vvvv = DEBUG, -vvvvv = TRACE)")]
    verbose: u8,
}

fn setup_logging(verbosity: u8) {
    let verbosity = verbosity.saturating_add(3).clamp(0, 5);
    let level = Level::from_str(verbosity.to_string().as_str()).unwrap();
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

/// Plays one queue to the end or the first dead end; returns how many
/// pieces were placed.
fn run_trial(policy: Arc<dyn Policy>, queue: &[Piece], preview_size: usize) -> usize {
    let (tx, input) = bounded(1);
    let output = start_game(policy, LEFT_I, queue[0], &queue[1..=preview_size], input);

    if output.recv().expect("initial decision").is_none() {
        return 0;
    }
    let mut consumed = 1;
    for &p in &queue[preview_size + 1..] {
        tx.send(p).expect("driver alive");
        if output.recv().expect("one decision per piece").is_none() {
            break;
        }
        consumed += 1;
    }
    consumed
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let nfa = Arc::new(NFA::new(&all_continuous_moves()));

    info!("building scorers");
    let mut policies: Vec<(String, Arc<dyn Policy>)> = vec![
        (
            "Seq 3".to_string(),
            Arc::new(ScorePolicy::from_scorer(
                nfa.clone(),
                NFAScorer::new(nfa.clone(), 3),
            )),
        ),
        (
            "Seq 7".to_string(),
            Arc::new(ScorePolicy::from_scorer(
                nfa.clone(),
                NFAScorer::new(nfa.clone(), 7),
            )),
        ),
    ];
    if let Some(path) = &cli.mdp_policy_file {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        policies.push(("MDP".to_string(), Arc::new(MDPPolicy::decode(&bytes)?)));
    }

    let pieces_per_trial = *CHECKPOINTS.last().unwrap();
    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let queues: Vec<Vec<Piece>> = (0..cli.num_trials)
        .map(|_| rand_pieces_with(&mut rng, pieces_per_trial + cli.preview_size + 1))
        .collect();

    info!("running {} trials", cli.num_trials);
    let initial: StateSet = [State::with_field(LEFT_I)].into_iter().collect();
    let results: Vec<(Vec<usize>, usize)> = queues
        .par_iter()
        .map(|queue| {
            let consumed: Vec<usize> = policies
                .iter()
                .map(|(_, policy)| run_trial(policy.clone(), queue, cli.preview_size))
                .collect();
            let (_, upper_bound) = nfa.end_states(&initial, queue);
            (consumed, upper_bound)
        })
        .collect();

    let mut rows: Vec<(String, Vec<usize>)> = policies
        .iter()
        .map(|(name, _)| (name.clone(), Vec::with_capacity(cli.num_trials)))
        .collect();
    let mut upper = Vec::with_capacity(cli.num_trials);
    for (consumed, upper_bound) in results {
        for (idx, c) in consumed.into_iter().enumerate() {
            rows[idx].1.push(c);
        }
        upper.push(upper_bound);
    }
    rows.push(("Upper-bound".to_string(), upper));

    println!(
        "\nPreview Size = {} pieces\nTrials = {}\nMax sequence per trial = {}",
        cli.preview_size, cli.num_trials, pieces_per_trial
    );
    print!("{:<14}{:<9}", "", "Avg");
    for c in CHECKPOINTS {
        print!("{:<12}", format!("Reach {c}"));
    }
    println!();
    for (name, counts) in rows {
        let avg = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
        print!("{name:<14}{:<9}", format!("{avg:.1}"));
        for checkpoint in CHECKPOINTS {
            let reached = counts.iter().filter(|&&c| c >= checkpoint).count();
            let pct = reached as f64 * 100.0 / counts.len() as f64;
            print!("{:<12}", format!("{pct:.1}%"));
        }
        println!();
    }
    Ok(())
}
