// ============================================================
// Layer 6 — Run Logger
// ============================================================
// One RunLogger is created per worker process at launch. All
// workers run identical code; only rank 0 touches the disk.
//
//                    rank 0            rank != 0
//   new()            mkdir run_dir     mkdir run_dir
//                    write config.txt  (nothing)
//   update_metrics   append to memory  no-op
//   save             write .pth files  no-op
//   log              append line       no-op
//   load             read .pth         read .pth
//
// `load` is not rank-gated: a resumed run may call it on every
// worker so all of them agree on the restored history.
//
// There is no locking. If two processes were launched with
// rank 0 they would both write the same files.
//
// Files produced under run_dir (M = optional milestone):
//   config.txt              — launch header + log lines (append)
//   [M/]all_stat_dict.pth   — metric history (overwritten per save)
//   [M/]ttt_stats.pth       — layer stats, only if supplied
//
// Reference: Rust Book §9 (Error Handling), §12 (I/O)

use anyhow::{Context, Result};
use serde_json::Value;
use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::{
    layer_stats::{LayerStats, LayerStatsTable},
    metrics::{MetricRecord, MetricsAccumulator},
    milestone::Milestone,
    rank::ProcessRank,
    run_config::RunConfig,
};
use crate::infra::{
    checkpoint::CheckpointDir,
    config_log::{self, launch_time_now},
    fs::ensure_dir,
};

/// Name of the text log inside the run directory
pub const CONFIG_LOG_FILE: &str = "config.txt";

pub struct RunLogger {
    run_dir:      PathBuf,
    rank:         ProcessRank,
    config:       RunConfig,
    model_config: Option<Value>,
    /// Open only on the primary process
    log_file:     Option<File>,
    metrics:      MetricsAccumulator,
}

impl RunLogger {
    /// Create the logger for this process.
    ///
    /// Every process makes sure `run_dir` exists. The primary
    /// process additionally appends the launch header (banner,
    /// training config, model config, training marker) to
    /// `run_dir/config.txt`.
    pub fn new(
        run_dir:      impl Into<PathBuf>,
        rank:         ProcessRank,
        config:       RunConfig,
        model_config: Option<Value>,
    ) -> Result<Self> {
        let run_dir = run_dir.into();
        ensure_dir(&run_dir)?;

        let log_file = if rank.is_primary() {
            let path = run_dir.join(CONFIG_LOG_FILE);
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Cannot open config log '{}'", path.display()))?;

            config_log::write_header(
                &mut file,
                &launch_time_now(),
                config.as_value(),
                model_config.as_ref(),
            )
            .with_context(|| format!("Cannot write launch header to '{}'", path.display()))?;

            tracing::info!("Run logger ready at '{}'", run_dir.display());
            Some(file)
        } else {
            tracing::debug!("Rank {} logger holds no files", rank);
            None
        };

        Ok(Self {
            run_dir,
            rank,
            config,
            model_config,
            log_file,
            metrics: MetricsAccumulator::new(),
        })
    }

    /// Create the logger from a training config that carries the
    /// model config under `"model_config"`. Fails if the key is absent.
    /// A `null` model config means no model config section.
    pub fn from_combined_config(
        run_dir:  impl Into<PathBuf>,
        rank:     ProcessRank,
        combined: Value,
    ) -> Result<Self> {
        let (config, model_config) = RunConfig::split(combined)?;
        Self::new(run_dir, rank, config, model_config)
    }

    /// Write checkpoints for the current metric history.
    ///
    /// Target directory is `run_dir` for no milestone (or a blank
    /// one), otherwise `run_dir/<milestone>`. Writes
    /// `ttt_stats.pth` when `layer_stats` is given, and always
    /// writes `all_stat_dict.pth`. The history is not cleared.
    ///
    /// Returns the target directory, or `None` on non-primary
    /// processes, where nothing is created or written.
    pub fn save(
        &self,
        milestone:   Option<Milestone>,
        layer_stats: Option<&[LayerStats]>,
    ) -> Result<Option<PathBuf>> {
        if !self.rank.is_primary() {
            return Ok(None);
        }

        let target = self.milestone_dir(milestone.as_ref());
        ensure_dir(&target)?;
        let ckpt = CheckpointDir::new(&target);

        if let Some(layers) = layer_stats {
            ckpt.save_layer_stats(&LayerStatsTable::from_layers(layers))?;
            tracing::debug!("Saved stats for {} layers", layers.len());
        }

        ckpt.save_metrics(&self.metrics)?;
        tracing::info!(
            "Saved {} steps of metrics to '{}'",
            self.metrics.steps(),
            target.display()
        );

        Ok(Some(target))
    }

    /// Replace the in-memory history with `source_dir/all_stat_dict.pth`.
    ///
    /// Runs on every rank. The loaded series are taken as-is.
    pub fn load(&mut self, source_dir: impl AsRef<Path>) -> Result<()> {
        let source_dir = source_dir.as_ref();
        self.metrics = CheckpointDir::new(source_dir).load_metrics()?;
        tracing::info!(
            "Resumed {} steps of metrics from '{}'",
            self.metrics.steps(),
            source_dir.display()
        );
        Ok(())
    }

    /// Append one value per record to each tracked series (primary only).
    ///
    /// See [`MetricsAccumulator::append_records`] for what is left
    /// behind when a record is missing a key.
    pub fn update_metrics<'a, I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a MetricRecord>,
    {
        if !self.rank.is_primary() {
            return Ok(());
        }
        self.metrics.append_records(records)
    }

    /// Append a line to `config.txt` below the launch header (primary only).
    pub fn log(&mut self, text: &str) -> Result<()> {
        if let Some(file) = self.log_file.as_mut() {
            config_log::emit(Some(&mut *file), text).context("Cannot append to config log")?;
            file.flush().context("Cannot flush config log")?;
        }
        Ok(())
    }

    fn milestone_dir(&self, milestone: Option<&Milestone>) -> PathBuf {
        match milestone {
            Some(m) if !m.is_blank() => self.run_dir.join(m.to_string()),
            _ => self.run_dir.clone(),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn rank(&self) -> ProcessRank {
        self.rank
    }

    pub fn is_primary(&self) -> bool {
        self.rank.is_primary()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn model_config(&self) -> Option<&Value> {
        self.model_config.as_ref()
    }

    pub fn metrics(&self) -> &MetricsAccumulator {
        &self.metrics
    }

    /// Path of the text log (whether or not this process writes it)
    pub fn config_log_path(&self) -> PathBuf {
        self.run_dir.join(CONFIG_LOG_FILE)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::{GRADIENT_NORM, LEARNING_RATE, TRACKED_METRICS, TRAIN_LOSS};
    use crate::infra::checkpoint::{LAYER_STATS_FILE, METRICS_FILE};
    use serde_json::json;
    use std::fs;

    fn record(loss: f64, lr: f64, norm: f64) -> MetricRecord {
        [("loss", loss), ("learning_rate", lr), ("gradient_norm", norm)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn primary(dir: &Path) -> RunLogger {
        RunLogger::new(dir, ProcessRank::PRIMARY, RunConfig::new(json!({ "lr": 0.01 })), None).unwrap()
    }

    fn worker(dir: &Path) -> RunLogger {
        RunLogger::new(dir, ProcessRank::new(1), RunConfig::new(json!({ "lr": 0.01 })), None).unwrap()
    }

    fn files_under(dir: &Path) -> Vec<PathBuf> {
        let mut out = Vec::new();
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                out.extend(files_under(&path));
            } else {
                out.push(path);
            }
        }
        out
    }

    #[test]
    fn test_combined_config_header() {
        let tmp    = tempfile::tempdir().unwrap();
        let logger = RunLogger::from_combined_config(
            tmp.path(),
            ProcessRank::PRIMARY,
            json!({ "model_config": { "arch": "x" }, "lr": 0.01 }),
        )
        .unwrap();

        assert!(logger.config().as_value().get("model_config").is_none());
        assert_eq!(logger.model_config(), Some(&json!({ "arch": "x" })));

        let text  = fs::read_to_string(logger.config_log_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], config_log::BANNER_RULE);
        assert!(lines[1].starts_with("Launching Time: "));
        assert_eq!(lines[2], config_log::BANNER_RULE);

        let lr_at      = text.find("\"lr\": 0.01").unwrap();
        let model_at   = text.find(config_log::MODEL_CONFIG_HEADER).unwrap();
        let arch_at    = text.find("\"arch\": \"x\"").unwrap();
        let training_at = text.find(config_log::TRAINING_HEADER).unwrap();
        assert!(lr_at < model_at && model_at < arch_at && arch_at < training_at);
    }

    #[test]
    fn test_config_keeps_caller_key_order() {
        let tmp    = tempfile::tempdir().unwrap();
        let logger = RunLogger::from_combined_config(
            tmp.path(),
            ProcessRank::PRIMARY,
            json!({ "total_steps": 5000, "lr": 0.01, "model_config": { "width": 64, "depth": 2 }, "batch_size": 8 }),
        )
        .unwrap();

        let text = fs::read_to_string(logger.config_log_path()).unwrap();
        let at   = |needle: &str| text.find(needle).unwrap();
        assert!(at("\"total_steps\"") < at("\"lr\""));
        assert!(at("\"lr\"") < at("\"batch_size\""));
        assert!(at("\"width\"") < at("\"depth\""));
    }

    #[test]
    fn test_null_model_config_skips_section() {
        let tmp    = tempfile::tempdir().unwrap();
        let logger = RunLogger::from_combined_config(
            tmp.path(),
            ProcessRank::PRIMARY,
            json!({ "lr": 0.01, "model_config": null }),
        )
        .unwrap();

        assert_eq!(logger.model_config(), None);
        let text = fs::read_to_string(logger.config_log_path()).unwrap();
        assert!(!text.contains(config_log::MODEL_CONFIG_HEADER));
        assert!(!text.contains("null"));
        assert!(text.contains(config_log::TRAINING_HEADER));
    }

    #[test]
    fn test_combined_config_without_model_config_fails() {
        let tmp    = tempfile::tempdir().unwrap();
        let result = RunLogger::from_combined_config(tmp.path(), ProcessRank::PRIMARY, json!({ "lr": 0.01 }));
        assert!(result.is_err());
    }

    #[test]
    fn test_relaunch_appends_second_header() {
        let tmp = tempfile::tempdir().unwrap();
        drop(primary(tmp.path()));
        drop(primary(tmp.path()));

        let text = fs::read_to_string(tmp.path().join(CONFIG_LOG_FILE)).unwrap();
        assert_eq!(text.matches("Launching Time: ").count(), 2);
    }

    #[test]
    fn test_every_rank_starts_with_empty_tracked_series() {
        let tmp = tempfile::tempdir().unwrap();
        for logger in [primary(tmp.path()), worker(tmp.path())] {
            for key in TRACKED_METRICS {
                assert_eq!(logger.metrics().len_of(key), 0);
            }
        }
    }

    #[test]
    fn test_save_with_milestone_decodes_to_history() {
        let tmp        = tempfile::tempdir().unwrap();
        let mut logger = primary(tmp.path());
        logger.update_metrics(&[record(1.0, 0.01, 0.5)]).unwrap();

        let target = logger.save(Some(Milestone::Step(100)), None).unwrap();
        assert_eq!(target, Some(tmp.path().join("100")));

        let raw: Value =
            serde_json::from_str(&fs::read_to_string(tmp.path().join("100").join(METRICS_FILE)).unwrap()).unwrap();
        assert_eq!(
            raw["payload"],
            json!({ "train/loss": [1.0], "learning_rate": [0.01], "gradient_norm": [0.5] })
        );
        assert!(!tmp.path().join("100").join(LAYER_STATS_FILE).exists());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let tmp        = tempfile::tempdir().unwrap();
        let mut logger = primary(tmp.path());
        let batch: Vec<_> = (0..10).map(|i| record(3.0 - i as f64 * 0.1, 1e-4, 0.9)).collect();
        logger.update_metrics(&batch).unwrap();
        logger.save(None, None).unwrap();

        let mut resumed = primary(tmp.path());
        resumed.load(tmp.path()).unwrap();
        assert_eq!(resumed.metrics(), logger.metrics());
    }

    #[test]
    fn test_blank_milestone_saves_to_run_dir() {
        let tmp    = tempfile::tempdir().unwrap();
        let logger = primary(tmp.path());

        assert_eq!(logger.save(Some(Milestone::Step(0)), None).unwrap(), Some(tmp.path().to_path_buf()));
        assert_eq!(logger.save(Some(Milestone::from("")), None).unwrap(), Some(tmp.path().to_path_buf()));
        assert!(tmp.path().join(METRICS_FILE).is_file());
        assert!(!tmp.path().join("0").exists());
    }

    #[test]
    fn test_same_milestone_twice_overwrites() {
        let tmp        = tempfile::tempdir().unwrap();
        let mut logger = primary(tmp.path());
        logger.update_metrics(&[record(1.0, 0.01, 0.5)]).unwrap();
        logger.save(Some(Milestone::from("best")), None).unwrap();

        logger.update_metrics(&[record(0.5, 0.01, 0.4)]).unwrap();
        logger.save(Some(Milestone::from("best")), None).unwrap();

        let loaded = CheckpointDir::new(tmp.path().join("best")).load_metrics().unwrap();
        assert_eq!(loaded.get(TRAIN_LOSS).unwrap(), &[1.0, 0.5]);
    }

    #[test]
    fn test_save_does_not_clear_history() {
        let tmp        = tempfile::tempdir().unwrap();
        let mut logger = primary(tmp.path());
        logger.update_metrics(&[record(1.0, 0.01, 0.5)]).unwrap();
        logger.save(Some(Milestone::Step(1)), None).unwrap();
        logger.update_metrics(&[record(0.9, 0.01, 0.5)]).unwrap();
        logger.save(Some(Milestone::Step(2)), None).unwrap();

        let first  = CheckpointDir::new(tmp.path().join("1")).load_metrics().unwrap();
        let second = CheckpointDir::new(tmp.path().join("2")).load_metrics().unwrap();
        assert_eq!(first.steps(), 1);
        assert_eq!(second.steps(), 2);
    }

    #[test]
    fn test_save_with_layer_stats() {
        let tmp    = tempfile::tempdir().unwrap();
        let logger = primary(tmp.path());
        let layers: Vec<LayerStats> = (0..3)
            .map(|i| LayerStats::from_values(vec![i as f32; 4], 1.0f32, 0.5f32, 0.25f32).unwrap())
            .collect();

        let target = logger.save(Some(Milestone::Step(500)), Some(&layers)).unwrap().unwrap();
        let table  = CheckpointDir::new(&target).load_layer_stats().unwrap();

        assert_eq!(table.stats().len(), 4);
        assert_eq!(table.num_layers(), 3);
        let dev = table.get("ssl_tgt_last_in_mini_batch_from_mean_mse").unwrap();
        assert_eq!(dev[2].data(), &[2.0; 4]);
        assert!(target.join(METRICS_FILE).is_file());
    }

    #[test]
    fn test_missing_key_partial_state() {
        let tmp        = tempfile::tempdir().unwrap();
        let mut logger = primary(tmp.path());
        let partial: MetricRecord = [("loss".to_string(), 1.0)].into_iter().collect();

        assert!(logger.update_metrics(&[partial]).is_err());
        assert_eq!(logger.metrics().len_of(TRAIN_LOSS),    1);
        assert_eq!(logger.metrics().len_of(LEARNING_RATE), 0);
        assert_eq!(logger.metrics().len_of(GRADIENT_NORM), 0);
    }

    #[test]
    fn test_non_primary_touches_nothing() {
        let tmp        = tempfile::tempdir().unwrap();
        let run_dir    = tmp.path().join("run");
        let mut logger = worker(&run_dir);

        assert!(run_dir.is_dir());
        logger.update_metrics(&[record(1.0, 0.01, 0.5)]).unwrap();
        logger.log("should not appear").unwrap();
        let layers = [LayerStats::from_values(1.0f32, 1.0f32, 1.0f32, 1.0f32).unwrap()];
        assert_eq!(logger.save(Some(Milestone::Step(100)), Some(&layers)).unwrap(), None);
        assert_eq!(logger.save(None, None).unwrap(), None);

        assert!(logger.metrics().is_empty());
        assert!(files_under(&run_dir).is_empty());
    }

    #[test]
    fn test_non_primary_can_load() {
        let tmp        = tempfile::tempdir().unwrap();
        let mut writer = primary(tmp.path());
        writer.update_metrics(&[record(1.0, 0.01, 0.5)]).unwrap();
        writer.save(None, None).unwrap();

        let mut reader = worker(tmp.path());
        reader.load(tmp.path()).unwrap();
        assert_eq!(reader.metrics().steps(), 1);
    }

    #[test]
    fn test_load_of_missing_checkpoint_fails_and_keeps_history() {
        let tmp        = tempfile::tempdir().unwrap();
        let mut logger = primary(tmp.path());
        logger.update_metrics(&[record(1.0, 0.01, 0.5)]).unwrap();

        assert!(logger.load(tmp.path().join("nowhere")).is_err());
        assert_eq!(logger.metrics().steps(), 1);
    }

    #[test]
    fn test_log_lines_follow_training_marker() {
        let tmp        = tempfile::tempdir().unwrap();
        let mut logger = primary(tmp.path());
        logger.log("step 1 | loss 2.3000").unwrap();

        let text = fs::read_to_string(logger.config_log_path()).unwrap();
        assert!(text.ends_with(&format!("{}\nstep 1 | loss 2.3000\n", config_log::TRAINING_HEADER)));
    }
}
