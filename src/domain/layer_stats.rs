// ============================================================
// Layer 3 — Per-Layer Diagnostic Statistics
// ============================================================
// At save time the training loop may hand over one entry per
// model layer, each holding four arrays:
//
//   0. target deviation MSE   (last target in the mini-batch vs. its mean)
//   1. inner loss at init
//   2. inner loss after step 0
//   3. inner loss after step 1
//
// On disk the data is regrouped by statistic instead of by layer:
//
//   layers:  [ (a0,b0,c0,d0), (a1,b1,c1,d1), ... ]
//                         │
//                         ▼
//   table:   { stat_a: [a0, a1, ...], stat_b: [b0, b1, ...], ... }
//
// so each statistic can be plotted across depth directly.
//
// Reference: Rust Book §8 (Collections)

use anyhow::{bail, Result};
use std::collections::BTreeMap;

use crate::domain::traits::ToHostArray;

/// On-disk statistic names, in per-layer tuple order
pub const STAT_NAMES: [&str; 4] = [
    "ssl_tgt_last_in_mini_batch_from_mean_mse",
    "ttt_loss_mse_init",
    "ttt_loss_mse_step_0",
    "ttt_loss_mse_step_1",
];

// ─── HostArray ────────────────────────────────────────────────────────────────
/// A dense, row-major `f64` array living in host memory.
///
/// `f64` inputs are widened, which is exact.
///
/// Invariant: `shape.iter().product() == data.len()`.
/// A scalar has an empty shape and exactly one element.
#[derive(Debug, Clone, PartialEq)]
pub struct HostArray {
    shape: Vec<usize>,
    data:  Vec<f64>,
}

impl HostArray {
    /// Build an array, checking that `data` fills `shape` exactly
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            bail!(
                "array shape {:?} needs {} elements, got {}",
                shape,
                expected,
                data.len()
            );
        }
        Ok(Self { shape, data })
    }

    pub fn scalar(value: f64) -> Self {
        Self { shape: Vec::new(), data: vec![value] }
    }

    pub fn vector(data: Vec<f64>) -> Self {
        Self { shape: vec![data.len()], data }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_parts(self) -> (Vec<usize>, Vec<f64>) {
        (self.shape, self.data)
    }
}

// ─── LayerStats ───────────────────────────────────────────────────────────────
/// The four diagnostic arrays reported for one model layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerStats {
    pub target_deviation_mse: HostArray,
    pub loss_init:            HostArray,
    pub loss_step_0:          HostArray,
    pub loss_step_1:          HostArray,
}

impl LayerStats {
    /// Copy four framework values into host arrays
    pub fn from_values<A, B, C, D>(
        target_deviation_mse: A,
        loss_init:            B,
        loss_step_0:          C,
        loss_step_1:          D,
    ) -> Result<Self>
    where
        A: ToHostArray,
        B: ToHostArray,
        C: ToHostArray,
        D: ToHostArray,
    {
        Ok(Self {
            target_deviation_mse: target_deviation_mse.to_host_array()?,
            loss_init:            loss_init.to_host_array()?,
            loss_step_0:          loss_step_0.to_host_array()?,
            loss_step_1:          loss_step_1.to_host_array()?,
        })
    }

    /// The arrays in `STAT_NAMES` order
    pub fn arrays(&self) -> [&HostArray; 4] {
        [
            &self.target_deviation_mse,
            &self.loss_init,
            &self.loss_step_0,
            &self.loss_step_1,
        ]
    }
}

impl From<[HostArray; 4]> for LayerStats {
    fn from([target_deviation_mse, loss_init, loss_step_0, loss_step_1]: [HostArray; 4]) -> Self {
        Self { target_deviation_mse, loss_init, loss_step_0, loss_step_1 }
    }
}

// ─── LayerStatsTable ──────────────────────────────────────────────────────────
/// Statistic name → per-layer arrays (index = layer index).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerStatsTable {
    stats: BTreeMap<String, Vec<HostArray>>,
}

impl LayerStatsTable {
    /// Regroup per-layer entries by statistic, keeping layer order
    pub fn from_layers(layers: &[LayerStats]) -> Self {
        let mut stats: BTreeMap<String, Vec<HostArray>> = STAT_NAMES
            .iter()
            .map(|name| (name.to_string(), Vec::with_capacity(layers.len())))
            .collect();

        for layer in layers {
            for (name, array) in STAT_NAMES.iter().zip(layer.arrays()) {
                if let Some(column) = stats.get_mut(*name) {
                    column.push(array.clone());
                }
            }
        }

        Self { stats }
    }

    /// Wrap an already-grouped table (e.g. a decoded checkpoint)
    pub fn from_stats(stats: BTreeMap<String, Vec<HostArray>>) -> Self {
        Self { stats }
    }

    pub fn get(&self, name: &str) -> Option<&[HostArray]> {
        self.stats.get(name).map(Vec::as_slice)
    }

    /// Number of layers, measured on the longest column
    pub fn num_layers(&self) -> usize {
        self.stats.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn stats(&self) -> &BTreeMap<String, Vec<HostArray>> {
        &self.stats
    }

    pub fn into_stats(self) -> BTreeMap<String, Vec<HostArray>> {
        self.stats
    }
}
