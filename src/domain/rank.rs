// ============================================================
// Layer 3 — Process Rank
// ============================================================
// Every worker process of a distributed job has an integer
// identity (its rank). Rank 0 is the primary process: the
// only one that writes the config log and checkpoints.
//
// The rank is handed to the logger explicitly. The logger
// never asks the distributed runtime for it, so the same
// code runs unchanged in a single-process test.
//
// Environment lookup order for `from_env`:
//   RANK               → torchrun / most launchers
//   JAX_PROCESS_INDEX  → JAX multi-host launchers
//   (neither set)      → 0, a single-process run
//
// Reference: Rust Book §5 (Structs), §9 (Error Handling)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment variables consulted by [`ProcessRank::from_env`], in order.
pub const RANK_ENV_VARS: [&str; 2] = ["RANK", "JAX_PROCESS_INDEX"];

/// Identity of the calling process within the distributed job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessRank(u32);

impl ProcessRank {
    /// The primary process.
    pub const PRIMARY: ProcessRank = ProcessRank(0);

    pub fn new(rank: u32) -> Self {
        Self(rank)
    }

    /// Raw integer rank
    pub fn get(self) -> u32 {
        self.0
    }

    /// True only for rank 0 — the process that owns all file output
    pub fn is_primary(self) -> bool {
        self.0 == 0
    }

    /// Resolve the rank from the launcher's environment.
    ///
    /// Returns rank 0 when no rank variable is set. A variable that
    /// is set but not a non-negative integer is an error, since a
    /// silently-defaulted rank could make two processes primary.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        for key in RANK_ENV_VARS {
            if let Some(raw) = lookup(key) {
                let rank = raw
                    .trim()
                    .parse::<u32>()
                    .with_context(|| format!("{key}='{raw}' is not a valid process rank"))?;
                return Ok(Self(rank));
            }
        }
        Ok(Self::PRIMARY)
    }
}

impl From<u32> for ProcessRank {
    fn from(rank: u32) -> Self {
        Self(rank)
    }
}

impl fmt::Display for ProcessRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
