// ============================================================
// Layer 6 — Directory Helpers
// ============================================================
// Every worker may call `ensure_dir` on the same path at the
// same moment. `create_dir_all` treats an existing directory
// as success, including one created by another process between
// its own check and mkdir, so no coordination is needed.

use anyhow::{Context, Result};
use std::{fs, path::Path};

/// Create `dir` and all missing parents; succeed if it already exists.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create directory '{}'", dir.display()))?;
    tracing::debug!("Ensured directory '{}'", dir.display());
    Ok(())
}
