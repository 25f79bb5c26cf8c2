//! Builds (or resumes) an MDP solve and snapshots progress as it goes.

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use combo_bot::MDP;
use tracing::{info, Level};

#[derive(Debug, Parser)]
#[command(about = "Generates an MDP solve for 4-wide combo play")]
struct Cli {
    #[arg(
        long,
        default_value = "mdp3.bin",
        help = "Path of the MDP snapshot to read and write"
    )]
    gob_file: PathBuf,

    #[arg(long, default_value_t = 3, help = "The number of pieces in the preview")]
    preview_len: usize,

    #[arg(long, help = "Cap expected values at this combo count")]
    max_combo: Option<u32>,

    #[arg(
        long,
        help = "Build a new MDP instead of reading one from the snapshot"
    )]
    from_scratch: bool,

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

    let start = Instant::now();
    let mut mdp = if cli.from_scratch {
        MDP::new(cli.preview_len, cli.max_combo)?
    } else {
        let bytes = fs::read(&cli.gob_file).with_context(|| {
            format!(
                "reading {} (maybe try --from_scratch)",
                cli.gob_file.display()
            )
        })?;
        MDP::decode(&bytes)?
    };
    info!("got initial MDP in {:?}", start.elapsed());

    let path = cli.gob_file.clone();
    mdp.update(|m| m.save(&path))?;
    info!("completed in {:?}", start.elapsed());
    Ok(())
}
