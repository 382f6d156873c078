// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem:
//
//   run_logger.rs  — The per-process RunLogger
//                    Writes config.txt and checkpoints on
//                    rank 0, keeps metric history in memory.
//
//   checkpoint.rs  — Versioned JSON checkpoint container
//                    for metric history and layer stats.
//
//   config_log.rs  — Launch banner, config pretty-printing,
//                    and the text emit helper.
//
//   fs.rs          — Idempotent directory creation, safe
//                    to call from every worker at once.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// Rank-aware config log and checkpoint writer
pub mod run_logger;

/// Checkpoint container format
pub mod checkpoint;

/// config.txt header rendering
pub mod config_log;

/// Directory helpers
pub mod fs;
