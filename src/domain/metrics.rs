// ============================================================
// Layer 3 — Metrics Accumulator
// ============================================================
// Holds the full scalar history of a training run in memory:
//
//   "train/loss"    → [2.31, 2.28, 2.25, ...]
//   "learning_rate" → [1e-4, 1e-4, 9e-5, ...]
//   "gradient_norm" → [0.91, 0.88, 0.87, ...]
//
// One value is appended per training step. The sequences are
// never trimmed: every checkpoint is a full-history snapshot,
// not a delta since the previous save.
//
// The accumulator is a general name → sequence map rather than
// a struct with three fields because a resumed run replaces it
// wholesale with whatever the checkpoint held.
//
// Reference: Rust Book §8 (Collections)

use anyhow::{anyhow, Result};
use std::collections::{BTreeMap, HashMap};

pub const TRAIN_LOSS: &str    = "train/loss";
pub const LEARNING_RATE: &str = "learning_rate";
pub const GRADIENT_NORM: &str = "gradient_norm";

/// Series present in a freshly created accumulator
pub const TRACKED_METRICS: [&str; 3] = [TRAIN_LOSS, LEARNING_RATE, GRADIENT_NORM];

/// (key in a step record, series it is appended to), in append order
pub const RECORD_FIELDS: [(&str, &str); 3] = [
    ("loss",          TRAIN_LOSS),
    ("learning_rate", LEARNING_RATE),
    ("gradient_norm", GRADIENT_NORM),
];

/// Metrics reported by the training loop for a single step.
/// Extra keys are allowed and ignored.
pub type MetricRecord = HashMap<String, f64>;

/// Append-only per-metric history.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsAccumulator {
    series: BTreeMap<String, Vec<f64>>,
}

impl MetricsAccumulator {
    /// Create an accumulator with the three tracked series, all empty
    pub fn new() -> Self {
        let series = TRACKED_METRICS
            .iter()
            .map(|key| (key.to_string(), Vec::new()))
            .collect();
        Self { series }
    }

    /// Wrap an existing name → sequence map (e.g. a decoded checkpoint).
    /// No key validation is performed.
    pub fn from_series(series: BTreeMap<String, Vec<f64>>) -> Self {
        Self { series }
    }

    /// Append each record's values in input order.
    ///
    /// Within a record the fields are looked up one at a time in
    /// `RECORD_FIELDS` order. A missing field aborts with an error,
    /// leaving every value appended before it in place:
    ///
    ///   [{"loss": 1.0}]  →  train/loss: [1.0], learning_rate: [], gradient_norm: []
    pub fn append_records<'a, I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a MetricRecord>,
    {
        for (index, record) in records.into_iter().enumerate() {
            for (field, series_key) in RECORD_FIELDS {
                let value = *record
                    .get(field)
                    .ok_or_else(|| anyhow!("metric record {index} has no '{field}' key"))?;

                self.series
                    .get_mut(series_key)
                    .ok_or_else(|| anyhow!("accumulator has no '{series_key}' series"))?
                    .push(value);
            }
        }
        Ok(())
    }

    /// The history of one metric, if the series exists
    pub fn get(&self, key: &str) -> Option<&[f64]> {
        self.series.get(key).map(Vec::as_slice)
    }

    /// Length of one series (0 if it does not exist)
    pub fn len_of(&self, key: &str) -> usize {
        self.series.get(key).map_or(0, Vec::len)
    }

    /// Number of recorded training steps, measured on `train/loss`
    pub fn steps(&self) -> usize {
        self.len_of(TRAIN_LOSS)
    }

    /// True when no series holds any value
    pub fn is_empty(&self) -> bool {
        self.series.values().all(Vec::is_empty)
    }

    pub fn series(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.series
    }

    pub fn into_series(self) -> BTreeMap<String, Vec<f64>> {
        self.series
    }
}

impl Default for MetricsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
