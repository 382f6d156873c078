// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All real work is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `record` — one launch of a run: header, metrics, checkpoint
//   2. `show`   — summarise a checkpoint directory
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, RecordArgs, ShowArgs};

/// Rank-aware config log and metric checkpointer for training runs.
#[derive(Parser, Debug)]
#[command(
    name = "run-logger",
    version,
    about = "Write training-run config logs and metric checkpoints from rank 0."
)]
pub struct Cli {
    /// The subcommand to run (record or show)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Record(args) => run_record(args),
            Commands::Show(args)   => run_show(args),
        }
    }
}

fn run_record(args: RecordArgs) -> Result<()> {
    use crate::application::record_use_case::RecordUseCase;

    let config = args.into_record_config()?;
    tracing::info!(
        "Recording into '{}' as rank {}",
        config.run_dir.display(),
        config.rank
    );

    match RecordUseCase::new(config).execute()? {
        Some(dir) => println!("Checkpoint saved to {}", dir.display()),
        None      => println!("Not the primary process; nothing written."),
    }
    Ok(())
}

fn run_show(args: ShowArgs) -> Result<()> {
    use crate::application::show_use_case::ShowUseCase;

    let summary = ShowUseCase::new(args.dir).summary()?;
    print!("{summary}");
    Ok(())
}
