// ============================================================
// Layer 6 — Checkpoint Files
// ============================================================
// Saves and restores the two checkpoint artifacts of a run:
//
//   <dir>/all_stat_dict.pth   — full metric history
//   <dir>/ttt_stats.pth       — per-layer statistics (optional)
//
// Container format (version 1)
// ----------------------------
// Each file is a UTF-8 JSON document wrapped in an envelope:
//
//   {
//     "format":  "run-logger-checkpoint",
//     "version": 1,
//     "kind":    "metrics" | "layer_stats",
//     "payload": ...
//   }
//
// metrics payload:
//   { "gradient_norm": [0.5, ...], "learning_rate": [0.01, ...], "train/loss": [1.0, ...] }
//
// layer_stats payload:
//   { "ttt_loss_mse_init": [ { "shape": [4], "data": [0.1, 0.2, 0.3, 0.4] }, ... ], ... }
//
// JSON has no NaN or infinity, but a diverging run produces
// both. Non-finite values are written as the strings "NaN",
// "Infinity" and "-Infinity" and turned back into floats on
// load, so a checkpoint always round-trips exactly.
//
// Readers refuse a foreign `format`, a newer `version`, or the
// wrong `kind`, each with an error naming the file.
//
// Reference: serde docs (custom Serialize / Deserialize)
//            Rust Book §9 (Error Handling)

use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::domain::{
    layer_stats::{HostArray, LayerStatsTable},
    metrics::MetricsAccumulator,
};

pub const CHECKPOINT_FORMAT: &str  = "run-logger-checkpoint";
pub const CHECKPOINT_VERSION: u32  = 1;
pub const METRICS_FILE: &str       = "all_stat_dict.pth";
pub const LAYER_STATS_FILE: &str   = "ttt_stats.pth";

/// What a checkpoint file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    Metrics,
    LayerStats,
}

impl CheckpointKind {
    fn as_str(self) -> &'static str {
        match self {
            CheckpointKind::Metrics    => "metrics",
            CheckpointKind::LayerStats => "layer_stats",
        }
    }
}

// ─── Wire Types ───────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct Envelope<P> {
    format:  String,
    version: u32,
    kind:    CheckpointKind,
    payload: P,
}

/// A float that survives JSON even when it is not finite.
#[derive(Debug, Clone, Copy)]
struct WireFloat(f64);

impl Serialize for WireFloat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let v = self.0;
        if v.is_nan() {
            serializer.serialize_str("NaN")
        } else if v == f64::INFINITY {
            serializer.serialize_str("Infinity")
        } else if v == f64::NEG_INFINITY {
            serializer.serialize_str("-Infinity")
        } else {
            serializer.serialize_f64(v)
        }
    }
}

impl<'de> Deserialize<'de> for WireFloat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Num(v) => Ok(WireFloat(v)),
            Raw::Text(s) => match s.as_str() {
                "NaN"       => Ok(WireFloat(f64::NAN)),
                "Infinity"  => Ok(WireFloat(f64::INFINITY)),
                "-Infinity" => Ok(WireFloat(f64::NEG_INFINITY)),
                other => Err(serde::de::Error::custom(format!(
                    "expected a number, \"NaN\", \"Infinity\" or \"-Infinity\", got \"{other}\""
                ))),
            },
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireArray {
    shape: Vec<usize>,
    data:  Vec<WireFloat>,
}

type MetricsPayload    = BTreeMap<String, Vec<WireFloat>>;
type LayerStatsPayload = BTreeMap<String, Vec<WireArray>>;

fn metrics_to_wire(metrics: &MetricsAccumulator) -> MetricsPayload {
    metrics
        .series()
        .iter()
        .map(|(name, values)| (name.clone(), values.iter().copied().map(WireFloat).collect()))
        .collect()
}

fn metrics_from_wire(payload: MetricsPayload) -> MetricsAccumulator {
    let series = payload
        .into_iter()
        .map(|(name, values)| (name, values.into_iter().map(|w| w.0).collect()))
        .collect();
    MetricsAccumulator::from_series(series)
}

fn stats_to_wire(table: &LayerStatsTable) -> LayerStatsPayload {
    table
        .stats()
        .iter()
        .map(|(name, layers)| {
            let arrays = layers
                .iter()
                .map(|a| WireArray {
                    shape: a.shape().to_vec(),
                    data:  a.data().iter().copied().map(WireFloat).collect(),
                })
                .collect();
            (name.clone(), arrays)
        })
        .collect()
}

fn stats_from_wire(payload: LayerStatsPayload) -> Result<LayerStatsTable> {
    let mut stats = BTreeMap::new();
    for (name, layers) in payload {
        let arrays = layers
            .into_iter()
            .enumerate()
            .map(|(layer, w)| {
                let data = w.data.into_iter().map(|v| v.0).collect();
                HostArray::new(w.shape, data)
                    .with_context(|| format!("'{name}' layer {layer}"))
            })
            .collect::<Result<Vec<_>>>()?;
        stats.insert(name, arrays);
    }
    Ok(LayerStatsTable::from_stats(stats))
}

// ─── Envelope I/O ─────────────────────────────────────────────────────────────

fn write_envelope<P: Serialize>(path: &Path, kind: CheckpointKind, payload: P) -> Result<()> {
    let envelope = Envelope {
        format:  CHECKPOINT_FORMAT.to_string(),
        version: CHECKPOINT_VERSION,
        kind,
        payload,
    };

    // File::create truncates, so a second save fully replaces the first
    let file = File::create(path)
        .with_context(|| format!("Cannot create checkpoint '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &envelope)
        .with_context(|| format!("Cannot write checkpoint '{}'", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Cannot flush checkpoint '{}'", path.display()))?;

    tracing::debug!("Wrote {} checkpoint '{}'", kind.as_str(), path.display());
    Ok(())
}

fn read_envelope<P: DeserializeOwned>(path: &Path, kind: CheckpointKind) -> Result<P> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read checkpoint '{}'", path.display()))?;

    let envelope: Envelope<Value> = serde_json::from_str(&text)
        .with_context(|| format!("'{}' is not a valid checkpoint file", path.display()))?;

    if envelope.format != CHECKPOINT_FORMAT {
        bail!(
            "'{}' has format '{}', expected '{}'",
            path.display(),
            envelope.format,
            CHECKPOINT_FORMAT
        );
    }
    if envelope.version > CHECKPOINT_VERSION {
        bail!(
            "'{}' is checkpoint version {}, newest supported is {}",
            path.display(),
            envelope.version,
            CHECKPOINT_VERSION
        );
    }
    if envelope.kind != kind {
        bail!(
            "'{}' holds a {} checkpoint, expected {}",
            path.display(),
            envelope.kind.as_str(),
            kind.as_str()
        );
    }

    let payload = serde_json::from_value(envelope.payload)
        .with_context(|| format!("Malformed {} payload in '{}'", kind.as_str(), path.display()))?;

    tracing::debug!("Read {} checkpoint '{}'", kind.as_str(), path.display());
    Ok(payload)
}

// ─── CheckpointDir ────────────────────────────────────────────────────────────
/// One directory holding a metrics checkpoint and, optionally,
/// a layer-stats checkpoint.
#[derive(Debug, Clone)]
pub struct CheckpointDir {
    dir: PathBuf,
}

impl CheckpointDir {
    /// Point at `dir`. Nothing is created or read here.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.dir.join(METRICS_FILE)
    }

    pub fn layer_stats_path(&self) -> PathBuf {
        self.dir.join(LAYER_STATS_FILE)
    }

    pub fn has_layer_stats(&self) -> bool {
        self.layer_stats_path().is_file()
    }

    /// Write the full metric history, replacing any earlier file
    pub fn save_metrics(&self, metrics: &MetricsAccumulator) -> Result<()> {
        write_envelope(&self.metrics_path(), CheckpointKind::Metrics, metrics_to_wire(metrics))
    }

    /// Read a metric history back. No check is made on which series it holds.
    pub fn load_metrics(&self) -> Result<MetricsAccumulator> {
        let payload = read_envelope::<MetricsPayload>(&self.metrics_path(), CheckpointKind::Metrics)?;
        Ok(metrics_from_wire(payload))
    }

    pub fn save_layer_stats(&self, table: &LayerStatsTable) -> Result<()> {
        write_envelope(&self.layer_stats_path(), CheckpointKind::LayerStats, stats_to_wire(table))
    }

    pub fn load_layer_stats(&self) -> Result<LayerStatsTable> {
        let payload =
            read_envelope::<LayerStatsPayload>(&self.layer_stats_path(), CheckpointKind::LayerStats)?;
        stats_from_wire(payload)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::layer_stats::LayerStats;
    use serde_json::json;

    fn history(loss: Vec<f64>) -> MetricsAccumulator {
        let n = loss.len();
        let mut series = BTreeMap::new();
        series.insert("train/loss".to_string(), loss);
        series.insert("learning_rate".to_string(), vec![0.01; n]);
        series.insert("gradient_norm".to_string(), vec![0.5; n]);
        MetricsAccumulator::from_series(series)
    }

    #[test]
    fn test_metrics_file_layout() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointDir::new(tmp.path());
        ckpt.save_metrics(&history(vec![1.0])).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(ckpt.metrics_path()).unwrap()).unwrap();
        assert_eq!(raw["format"], json!("run-logger-checkpoint"));
        assert_eq!(raw["version"], json!(1));
        assert_eq!(raw["kind"], json!("metrics"));
        assert_eq!(
            raw["payload"],
            json!({ "train/loss": [1.0], "learning_rate": [0.01], "gradient_norm": [0.5] })
        );
    }

    #[test]
    fn test_non_finite_values_round_trip() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointDir::new(tmp.path());
        ckpt.save_metrics(&history(vec![2.0, f64::INFINITY, f64::NAN, f64::NEG_INFINITY])).unwrap();

        let text = fs::read_to_string(ckpt.metrics_path()).unwrap();
        assert!(text.contains("\"NaN\""));

        let loaded = ckpt.load_metrics().unwrap();
        let loss   = loaded.get("train/loss").unwrap();
        assert_eq!(loss[0], 2.0);
        assert_eq!(loss[1], f64::INFINITY);
        assert!(loss[2].is_nan());
        assert_eq!(loss[3], f64::NEG_INFINITY);
    }

    #[test]
    fn test_second_save_replaces_first() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointDir::new(tmp.path());
        ckpt.save_metrics(&history(vec![1.0, 2.0, 3.0])).unwrap();
        ckpt.save_metrics(&history(vec![9.0])).unwrap();

        assert_eq!(ckpt.load_metrics().unwrap(), history(vec![9.0]));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = CheckpointDir::new(tmp.path()).load_metrics().unwrap_err();
        assert!(err.to_string().contains("Cannot read checkpoint"));
    }

    #[test]
    fn test_garbage_file_is_an_error() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointDir::new(tmp.path());
        fs::write(ckpt.metrics_path(), b"\x80\x02}q\x00.").unwrap();
        assert!(ckpt.load_metrics().is_err());
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointDir::new(tmp.path());
        let doc  = json!({ "format": CHECKPOINT_FORMAT, "version": 2, "kind": "metrics", "payload": {} });
        fs::write(ckpt.metrics_path(), doc.to_string()).unwrap();

        let err = ckpt.load_metrics().unwrap_err();
        assert!(err.to_string().contains("version 2"));
    }

    #[test]
    fn test_wrong_kind_is_rejected() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointDir::new(tmp.path());
        let doc  = json!({ "format": CHECKPOINT_FORMAT, "version": 1, "kind": "layer_stats", "payload": {} });
        fs::write(ckpt.metrics_path(), doc.to_string()).unwrap();

        let err = ckpt.load_metrics().unwrap_err();
        assert!(err.to_string().contains("holds a layer_stats checkpoint"));
    }

    #[test]
    fn test_unknown_series_are_kept_on_load() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointDir::new(tmp.path());
        let doc  = json!({
            "format": CHECKPOINT_FORMAT, "version": 1, "kind": "metrics",
            "payload": { "eval/loss": [0.3, "NaN"] }
        });
        fs::write(ckpt.metrics_path(), doc.to_string()).unwrap();

        let loaded = ckpt.load_metrics().unwrap();
        assert_eq!(loaded.series().len(), 1);
        assert_eq!(loaded.len_of("eval/loss"), 2);
    }

    #[test]
    fn test_layer_stats_round_trip() {
        let tmp    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointDir::new(tmp.path());
        let layers = vec![
            LayerStats::from_values(vec![0.1f64, 0.2], 1.0f64, 0.5f64, 0.25f64).unwrap(),
            LayerStats::from_values(vec![0.3f64, f64::NAN], 2.0f64, 1.5f64, 1.25f64).unwrap(),
        ];
        let table = LayerStatsTable::from_layers(&layers);

        assert!(!ckpt.has_layer_stats());
        ckpt.save_layer_stats(&table).unwrap();
        assert!(ckpt.has_layer_stats());

        let loaded = ckpt.load_layer_stats().unwrap();
        assert_eq!(loaded.num_layers(), 2);
        assert_eq!(loaded.get("ttt_loss_mse_step_1").unwrap()[1].data(), &[1.25]);

        let dev = &loaded.get("ssl_tgt_last_in_mini_batch_from_mean_mse").unwrap()[1];
        assert_eq!(dev.shape(), &[2]);
        assert_eq!(dev.data()[0], 0.3);
        assert!(dev.data()[1].is_nan());
    }

    #[test]
    fn test_layer_stats_keep_f64_precision() {
        let tmp    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointDir::new(tmp.path());
        let layers = [LayerStats::from_values(0.1f64, 1e-300f64, 0.5f32, vec![1.0 / 3.0f64]).unwrap()];
        ckpt.save_layer_stats(&LayerStatsTable::from_layers(&layers)).unwrap();

        let loaded = ckpt.load_layer_stats().unwrap();
        assert_eq!(loaded.get("ssl_tgt_last_in_mini_batch_from_mean_mse").unwrap()[0].data(), &[0.1]);
        assert_eq!(loaded.get("ttt_loss_mse_init").unwrap()[0].data(), &[1e-300]);
        assert_eq!(loaded.get("ttt_loss_mse_step_0").unwrap()[0].data(), &[0.5]);
        assert_eq!(loaded.get("ttt_loss_mse_step_1").unwrap()[0].data(), &[1.0 / 3.0]);
    }

    #[test]
    fn test_layer_stats_with_bad_shape_is_rejected() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointDir::new(tmp.path());
        let doc  = json!({
            "format": CHECKPOINT_FORMAT, "version": 1, "kind": "layer_stats",
            "payload": { "ttt_loss_mse_init": [ { "shape": [3], "data": [1.0] } ] }
        });
        fs::write(ckpt.layer_stats_path(), doc.to_string()).unwrap();

        let err = ckpt.load_layer_stats().unwrap_err();
        assert!(format!("{err:#}").contains("'ttt_loss_mse_init' layer 0"));
    }
}
