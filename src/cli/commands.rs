// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `record` and `show`, and all
// their flags.
//
// Without `--rank` the rank comes from the launcher's
// environment (RANK, then JAX_PROCESS_INDEX, else 0).
//
// Reference: Rust Book §12 (Building a CLI Program)

use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::record_use_case::RecordConfig;
use crate::domain::{milestone::Milestone, rank::ProcessRank};

/// The top-level subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record one launch: write the config header, append metrics, save checkpoints
    Record(RecordArgs),

    /// Summarise the checkpoints in a directory
    Show(ShowArgs),
}

/// All arguments for the `record` command
#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Run directory (config.txt and checkpoints live here)
    #[arg(long)]
    pub run_dir: PathBuf,

    /// Training config JSON; may carry a nested "model_config"
    #[arg(long)]
    pub config: PathBuf,

    /// Model config JSON; overrides any nested "model_config"
    #[arg(long)]
    pub model_config: Option<PathBuf>,

    /// Per-step metrics, one JSON object per line
    #[arg(long)]
    pub metrics: PathBuf,

    /// Directory holding all_stat_dict.pth to resume from
    #[arg(long)]
    pub resume_from: Option<PathBuf>,

    /// Checkpoint subdirectory, e.g. the step count
    #[arg(long)]
    pub milestone: Option<String>,

    /// Per-layer statistics JSON to save alongside the metrics
    #[arg(long)]
    pub layer_stats: Option<PathBuf>,

    /// Rank of this process; only rank 0 writes files
    #[arg(long)]
    pub rank: Option<u32>,
}

impl RecordArgs {
    /// Convert CLI args into the application-layer RecordConfig.
    /// Fails only if the rank has to come from a malformed env var.
    pub fn into_record_config(self) -> Result<RecordConfig> {
        let rank = match self.rank {
            Some(rank) => ProcessRank::new(rank),
            None       => ProcessRank::from_env()?,
        };

        Ok(RecordConfig {
            run_dir:           self.run_dir,
            config_path:       self.config,
            model_config_path: self.model_config,
            metrics_path:      self.metrics,
            resume_from:       self.resume_from,
            milestone:         self.milestone.map(|m| m.parse::<Milestone>().unwrap_or_else(|e| match e {})),
            layer_stats_path:  self.layer_stats,
            rank,
        })
    }
}

/// All arguments for the `show` command
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Directory holding all_stat_dict.pth (and optionally ttt_stats.pth)
    #[arg(long)]
    pub dir: PathBuf,
}
