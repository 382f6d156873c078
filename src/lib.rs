// ============================================================
// run-logger
// ============================================================
// Config log and metric checkpointer for distributed training
// runs. Every worker process creates a `RunLogger`; only rank 0
// writes to disk.
//
//   use run_logger::{RunLogger, ProcessRank, RunConfig, Milestone};
//
//   let mut logger = RunLogger::new("runs/exp1", ProcessRank::from_env()?,
//                                   RunConfig::new(config), Some(model_config))?;
//   logger.update_metrics(&step_records)?;
//   logger.save(Some(Milestone::Step(1000)), None)?;
//
// Layers:
//   cli/          — `run-logger` binary argument parsing
//   application/  — record / show workflows
//   domain/       — rank, metric history, layer stats, configs
//   infra/        — RunLogger, checkpoint format, config.txt

pub mod application;
pub mod cli;
pub mod domain;
pub mod infra;

pub use domain::{
    layer_stats::{HostArray, LayerStats, LayerStatsTable},
    metrics::{MetricRecord, MetricsAccumulator},
    milestone::Milestone,
    rank::ProcessRank,
    run_config::RunConfig,
    traits::ToHostArray,
};
pub use infra::{checkpoint::CheckpointDir, run_logger::RunLogger};
