// ============================================================
// Layer 6 — Config Log Writer
// ============================================================
// Renders the header written to `config.txt` when a run (or a
// resumed run) is launched. Example output:
//
//   ==================================
//   Launching Time: 2024-05-01 09:30:00 PDT-0700
//   ==================================
//
//   ============= Training Config ===============
//   {
//       "lr": 0.01
//   }
//   ============= Model Config ===============
//   {
//       "arch": "x"
//   }
//   ============= Training ===============
//
// The file is opened in append mode, so every relaunch adds a
// new header below the log lines of the previous launch.
//
// Timestamps are always rendered in US Pacific time so that
// logs from machines in different zones line up.
//
// Reference: Rust Book §12 (I/O), serde_json docs (PrettyFormatter)

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::{America::Los_Angeles, Tz};
use serde::Serialize;
use serde_json::{ser::PrettyFormatter, Serializer, Value};
use std::io::{self, Write};

pub const BANNER_RULE: &str            = "==================================";
pub const TRAINING_CONFIG_HEADER: &str = "============= Training Config ===============";
pub const MODEL_CONFIG_HEADER: &str    = "============= Model Config ===============";
pub const TRAINING_HEADER: &str        = "============= Training ===============";

/// strftime pattern for the launch timestamp
pub const LAUNCH_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z%z";

/// Zone every launch timestamp is rendered in
pub const LAUNCH_TIME_ZONE: Tz = Los_Angeles;

/// Render an instant as a Pacific-time launch timestamp
pub fn format_launch_time<Z: TimeZone>(instant: &DateTime<Z>) -> String {
    instant
        .with_timezone(&LAUNCH_TIME_ZONE)
        .format(LAUNCH_TIME_FORMAT)
        .to_string()
}

/// Launch timestamp for the current wall-clock time
pub fn launch_time_now() -> String {
    format_launch_time(&Utc::now())
}

/// The three-line banner that opens each launch's header
pub fn launch_banner(launch_time: &str) -> String {
    format!("{BANNER_RULE}\nLaunching Time: {launch_time}\n{BANNER_RULE}\n")
}

/// Pretty-print JSON with a 4-space indent
pub fn pretty_json(value: &Value) -> Result<String> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value
        .serialize(&mut ser)
        .context("Cannot render config as JSON")?;
    Ok(String::from_utf8(buf)?)
}

/// Write `text` plus a newline to `sink`, or to stdout when no sink is given.
pub fn emit(sink: Option<&mut dyn Write>, text: &str) -> io::Result<()> {
    match sink {
        Some(w) => writeln!(w, "{text}"),
        None    => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            writeln!(lock, "{text}")
        }
    }
}

/// Write the full launch header (banner, configs, training marker).
pub fn write_header<W: Write>(
    out:          &mut W,
    launch_time:  &str,
    config:       &Value,
    model_config: Option<&Value>,
) -> Result<()> {
    emit(Some(&mut *out), &launch_banner(launch_time))?;

    writeln!(out, "{TRAINING_CONFIG_HEADER}")?;
    writeln!(out, "{}", pretty_json(config)?)?;

    if let Some(model_config) = model_config {
        writeln!(out, "{MODEL_CONFIG_HEADER}")?;
        writeln!(out, "{}", pretty_json(model_config)?)?;
    }

    writeln!(out, "{TRAINING_HEADER}")?;
    out.flush()?;
    Ok(())
}
