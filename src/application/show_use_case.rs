// ============================================================
// Layer 2 — Show Use Case
// ============================================================
// Summarises the checkpoints in one directory:
//
//   metrics (3 series)
//     gradient_norm   steps=1200  last=0.8712  min=0.4120  max=9.0031
//     learning_rate   steps=1200  last=0.0001  min=0.0000  max=0.0003
//     train/loss      steps=1200  last=2.1044  min=2.0987  max=10.8123
//   layer stats (4 stats)
//     ssl_tgt_last_in_mini_batch_from_mean_mse  layers=12
//     ...
//
// NaN values are skipped when computing min/max.

use anyhow::Result;
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::infra::checkpoint::CheckpointDir;

pub struct ShowUseCase {
    dir: PathBuf,
}

impl ShowUseCase {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Render a human-readable summary of the directory's checkpoints
    pub fn summary(&self) -> Result<String> {
        let ckpt    = CheckpointDir::new(&self.dir);
        let metrics = ckpt.load_metrics()?;
        let mut out = String::new();

        writeln!(out, "metrics ({} series)", metrics.series().len())?;
        for (name, values) in metrics.series() {
            match values.last() {
                Some(last) => {
                    let (min, max) = finite_range(values);
                    writeln!(
                        out,
                        "  {name:<15} steps={:<6} last={last:.4}  min={min:.4}  max={max:.4}",
                        values.len()
                    )?;
                }
                None => writeln!(out, "  {name:<15} steps=0")?,
            }
        }

        if ckpt.has_layer_stats() {
            let table = ckpt.load_layer_stats()?;
            writeln!(out, "layer stats ({} stats)", table.stats().len())?;
            for (name, layers) in table.stats() {
                writeln!(out, "  {name}  layers={}", layers.len())?;
            }
        }

        Ok(out)
    }
}

fn finite_range(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold((f64::NAN, f64::NAN), |(lo, hi), v| (lo.min(v), hi.max(v)))
}
