// ============================================================
// Layer 2 — Record Use Case
// ============================================================
// Replays one launch of a training run from files on disk:
//
//   Step 1: Read the training config (and model config)
//   Step 2: Create the RunLogger       → config.txt header
//   Step 3: Resume history             (optional, --resume-from)
//   Step 4: Read per-step metrics      (one JSON object per line)
//   Step 5: Append them to the history
//   Step 6: Read layer stats           (optional)
//   Step 7: Save checkpoints           → all_stat_dict.pth [+ ttt_stats.pth]
//
// Metrics file format (JSON Lines):
//   {"step": 1, "loss": 2.31, "learning_rate": 0.0001, "gradient_norm": 0.91}
//   {"step": 2, "loss": 2.28, "learning_rate": 0.0001, "gradient_norm": 0.88}
//
// Non-numeric fields on a line are ignored; blank lines are skipped.
//
// Layer stats file format: a JSON list with one entry per layer,
// each a list of four arrays. An array is a number, a list of
// numbers, or {"shape": [...], "data": [...]}.
//
// Reference: Rust Book §9 (Error Handling), §13 (Iterators)

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use std::{fs, path::{Path, PathBuf}};

use crate::domain::{
    layer_stats::{HostArray, LayerStats},
    metrics::MetricRecord,
    milestone::Milestone,
    rank::ProcessRank,
    run_config::{non_null, RunConfig, MODEL_CONFIG_KEY},
};
use crate::infra::run_logger::RunLogger;

/// Inputs for one recorded launch.
#[derive(Debug, Clone)]
pub struct RecordConfig {
    pub run_dir:           PathBuf,
    pub config_path:       PathBuf,
    pub model_config_path: Option<PathBuf>,
    pub metrics_path:      PathBuf,
    pub resume_from:       Option<PathBuf>,
    pub milestone:         Option<Milestone>,
    pub layer_stats_path:  Option<PathBuf>,
    pub rank:              ProcessRank,
}

pub struct RecordUseCase {
    config: RecordConfig,
}

impl RecordUseCase {
    pub fn new(config: RecordConfig) -> Self {
        Self { config }
    }

    /// Run the launch. Returns the checkpoint directory written,
    /// or `None` when this process is not the primary.
    pub fn execute(&self) -> Result<Option<PathBuf>> {
        let cfg = &self.config;

        // ── Step 1: Configs ───────────────────────────────────────────────────
        let combined = read_json(&cfg.config_path)?;
        let (run_config, model_config) = match &cfg.model_config_path {
            Some(path) => (strip_model_config(combined), non_null(read_json(path)?)),
            None       => split_if_present(combined)?,
        };

        // ── Step 2: Logger ────────────────────────────────────────────────────
        let mut logger = RunLogger::new(&cfg.run_dir, cfg.rank, run_config, model_config)?;

        // ── Step 3: Resume ────────────────────────────────────────────────────
        if let Some(resume_dir) = &cfg.resume_from {
            logger.load(resume_dir)?;
            logger.log(&format!(
                "Resumed {} steps from {}",
                logger.metrics().steps(),
                resume_dir.display()
            ))?;
        }

        // ── Steps 4–5: Metrics ────────────────────────────────────────────────
        let records = read_metric_records(&cfg.metrics_path)?;
        logger.update_metrics(&records)?;
        logger.log(&format!(
            "Recorded {} steps ({} total)",
            records.len(),
            logger.metrics().steps()
        ))?;

        // ── Step 6: Layer stats ───────────────────────────────────────────────
        let layer_stats = match &cfg.layer_stats_path {
            Some(path) => Some(read_layer_stats(path)?),
            None       => None,
        };

        // ── Step 7: Save ──────────────────────────────────────────────────────
        logger.save(cfg.milestone.clone(), layer_stats.as_deref())
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("'{}' is not valid JSON", path.display()))
}

/// Drop a nested model config when one is given separately
fn strip_model_config(mut combined: Value) -> RunConfig {
    if let Value::Object(map) = &mut combined {
        map.shift_remove(MODEL_CONFIG_KEY);
    }
    RunConfig::new(combined)
}

fn split_if_present(combined: Value) -> Result<(RunConfig, Option<Value>)> {
    if combined.get(MODEL_CONFIG_KEY).is_some() {
        RunConfig::split(combined)
    } else {
        Ok((RunConfig::new(combined), None))
    }
}

/// Parse a JSON Lines file into step records (numeric fields only)
pub fn read_metric_records(path: &Path) -> Result<Vec<MetricRecord>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read metrics file '{}'", path.display()))?;

    let mut records = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .with_context(|| format!("{}:{} is not valid JSON", path.display(), index + 1))?;
        let Value::Object(map) = value else {
            bail!("{}:{} is not a JSON object", path.display(), index + 1);
        };

        let record: MetricRecord = map
            .into_iter()
            .filter_map(|(key, v)| v.as_f64().map(|x| (key, x)))
            .collect();
        records.push(record);
    }

    tracing::debug!("Read {} metric records from '{}'", records.len(), path.display());
    Ok(records)
}

/// Parse a layer stats file (see the module header for the format)
pub fn read_layer_stats(path: &Path) -> Result<Vec<LayerStats>> {
    let value = read_json(path)?;
    let Value::Array(layers) = value else {
        bail!("'{}' must hold a JSON list of layers", path.display());
    };

    layers
        .iter()
        .enumerate()
        .map(|(layer, entry)| {
            parse_layer(entry).with_context(|| format!("'{}' layer {}", path.display(), layer))
        })
        .collect()
}

fn parse_layer(entry: &Value) -> Result<LayerStats> {
    let arrays = entry
        .as_array()
        .ok_or_else(|| anyhow!("expected a list of four arrays"))?;
    if arrays.len() != 4 {
        bail!("expected four arrays, got {}", arrays.len());
    }

    let parsed = arrays
        .iter()
        .map(parse_array)
        .collect::<Result<Vec<_>>>()?;
    let four: [HostArray; 4] = parsed
        .try_into()
        .map_err(|_| anyhow!("expected four arrays"))?;
    Ok(LayerStats::from(four))
}

fn parse_array(value: &Value) -> Result<HostArray> {
    match value {
        Value::Number(n) => {
            let v = n.as_f64().ok_or_else(|| anyhow!("number {n} is out of range"))?;
            Ok(HostArray::scalar(v))
        }
        Value::Array(items) => Ok(HostArray::vector(parse_numbers(items)?)),
        Value::Object(map) => {
            let shape = map
                .get("shape")
                .and_then(Value::as_array)
                .ok_or_else(|| anyhow!("array object needs a 'shape' list"))?
                .iter()
                .map(|d| {
                    d.as_u64()
                        .map(|d| d as usize)
                        .ok_or_else(|| anyhow!("shape entries must be non-negative integers"))
                })
                .collect::<Result<Vec<_>>>()?;
            let data = map
                .get("data")
                .and_then(Value::as_array)
                .ok_or_else(|| anyhow!("array object needs a 'data' list"))?;
            HostArray::new(shape, parse_numbers(data)?)
        }
        other => bail!("expected a number, a list, or a shape/data object, got {other}"),
    }
}

fn parse_numbers(items: &[Value]) -> Result<Vec<f64>> {
    items
        .iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| anyhow!("expected a number, got {v}"))
        })
        .collect()
}
