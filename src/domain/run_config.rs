// ============================================================
// Layer 3 — Run Configuration
// ============================================================
// Training scripts often keep the model architecture nested
// inside the training config:
//
//   { "lr": 0.01, "total_steps": 5000, "model_config": { ... } }
//
// The config log prints the two separately, so the nested key
// is split off first. `split` takes the combined value by value
// and hands both halves back; the caller's copy is untouched.
//
// Both halves are opaque JSON: the logger only pretty-prints
// them and never interprets a field.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use serde_json::Value;

/// Key under which a combined config carries the model config
pub const MODEL_CONFIG_KEY: &str = "model_config";

/// Training hyperparameters, held as plain JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig(Value);

impl RunConfig {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Convert any serialisable config struct into its JSON form
    pub fn from_serialize<T: Serialize + ?Sized>(config: &T) -> Result<Self> {
        let value = serde_json::to_value(config)
            .context("training config is not representable as JSON")?;
        Ok(Self(value))
    }

    /// Split a combined config into (training config, model config).
    ///
    /// Fails if the combined value is not an object or carries no
    /// `model_config` key. A `null` model config comes back as `None`.
    pub fn split(combined: Value) -> Result<(RunConfig, Option<Value>)> {
        let mut map = match combined {
            Value::Object(map) => map,
            other => return Err(anyhow!("training config must be a JSON object, got {other}")),
        };

        let model_config = map
            .shift_remove(MODEL_CONFIG_KEY)
            .ok_or_else(|| anyhow!("training config has no '{MODEL_CONFIG_KEY}' key"))?;

        Ok((RunConfig(Value::Object(map)), non_null(model_config)))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

/// `None` for JSON `null`, the value otherwise
pub fn non_null(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        other       => Some(other),
    }
}

impl From<Value> for RunConfig {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
