//! Plays 4-wide combos interactively through the terminal.
//!
//! Start it with the current piece and the known preview, then feed it
//! each newly revealed piece; it prints the state to move to.

use std::io::{self, BufRead, Write};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{ensure, Result};
use clap::Parser;
use combo_bot::{start_game, NFAScorer, ScorePolicy};
use combo_game::{all_continuous_moves, Piece, Seq, LEFT_I, NFA};
use crossbeam_channel::bounded;
use tracing::Level;

#[derive(Debug, Parser)]
#[command(about = "Plays 4-wide combos interactively")]
struct Cli {
    #[arg(help = "The current piece, e.g. T")]
    first: String,

    #[arg(help = "The known preview pieces, e.g. LJSZ")]
    preview: String,

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

    let first = Piece::from_char(cli.first.chars().next().unwrap_or(' '));
    ensure!(
        first != Piece::Empty,
        "the first piece must be one of T L J S Z O I"
    );
    let preview = Seq::parse(&cli.preview)?;

    let nfa = Arc::new(NFA::new(&all_continuous_moves()));
    let policy = Arc::new(ScorePolicy::from_scorer(
        nfa.clone(),
        NFAScorer::new(nfa, 7),
    ));

    let (tx, input) = bounded(1);
    let output = start_game(policy, LEFT_I, first, &preview.to_vec(), input);

    let stdin = io::stdin();
    for state in output.iter() {
        match state {
            Some(state) => println!("{state}"),
            None => {
                println!("No more combos!");
                break;
            }
        }

        let piece = loop {
            print!("Newest next piece (q to quit): ");
            io::stdout().flush()?;
            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                return Ok(());
            }
            let line = line.trim();
            if line.starts_with('q') {
                println!("goodbye!");
                return Ok(());
            }
            match line.chars().next().map(Piece::from_char) {
                Some(p) if p != Piece::Empty => break p,
                _ => println!("input {line:?} must be one of T L J S Z O I"),
            }
        };
        if tx.send(piece).is_err() {
            break;
        }
    }
    Ok(())
}
