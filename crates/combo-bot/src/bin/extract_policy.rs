//! Extracts the compressed policy from a solved MDP snapshot.

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Parser;
use combo_bot::MDP;
use tracing::{info, Level};

#[derive(Debug, Parser)]
#[command(about = "Extracts a compressed playing policy from an MDP snapshot")]
struct Cli {
    #[arg(long, help = "Path of the MDP snapshot to read")]
    mdp_file: PathBuf,

    #[arg(long, help = "Path to write the compressed policy to")]
    policy_file: PathBuf,

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

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let bytes = fs::read(&cli.mdp_file)
        .with_context(|| format!("reading {}", cli.mdp_file.display()))?;
    let mdp = MDP::decode(&bytes)?;

    let policy = mdp.compressed_policy();
    info!("compressed policy holds {} explicit choices", policy.len());
    policy.save(&cli.policy_file)
}
