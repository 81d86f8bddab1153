//! Shared call parameters and numeric clamping.
//!
//! Every numeric knob a caller can pass is clamped into a documented range;
//! absent, non-numeric and non-finite values fall back to a default.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::engine::EngineMode;
use crate::error::BrowserError;

/// Inclusive numeric range for one parameter.
#[derive(Debug, Clone, Copy)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: Option<f64>, default: f64) -> f64 {
        match value {
            Some(v) if v.is_finite() => v.clamp(self.min, self.max),
            _ => default,
        }
    }

    pub fn clamp_u64(&self, value: Option<f64>, default: u64) -> u64 {
        self.clamp(value, default as f64).round() as u64
    }

    pub fn clamp_usize(&self, value: Option<f64>, default: usize) -> usize {
        self.clamp(value, default as f64).round() as usize
    }
}

pub const TIMEOUT_MS: Range = Range::new(500.0, 120_000.0);
pub const MAX_CHARS: Range = Range::new(200.0, 200_000.0);
pub const MAX_BYTES: Range = Range::new(1024.0, 20_000_000.0);
pub const MAX_LINKS: Range = Range::new(0.0, 500.0);
pub const RETRIES: Range = Range::new(0.0, 3.0);
pub const DIMENSION: Range = Range::new(200.0, 8192.0);
pub const SCROLL_DELTA: Range = Range::new(-100_000.0, 100_000.0);
pub const WAIT_MS: Range = Range::new(0.0, 60_000.0);
pub const LIMIT: Range = Range::new(1.0, 400.0);
pub const LINK_INDEX: Range = Range::new(1.0, 10_000.0);

pub const DEFAULT_LIMIT: usize = 50;
pub const DEFAULT_SCROLL_Y: f64 = 600.0;

/// Accepts a JSON number or a numeric string; anything else reads as absent.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite()))
}

/// Accepts a single string or an array of strings.
pub(crate) fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => vec![s],
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::Number(n)) => vec![n.to_string()],
        _ => Vec::new(),
    })
}

/// Accepts a string, number or bool and renders it as a string.
pub(crate) fn string_like<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string value, got {}",
            other
        ))),
    }
}

/// Fields every action accepts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonParams {
    #[serde(default, alias = "tab", alias = "targetId")]
    pub tab_id: Option<String>,

    #[serde(default)]
    pub engine: Option<String>,

    #[serde(default, alias = "fallback")]
    pub allow_fallback: Option<bool>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub timeout_ms: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub max_chars: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub max_bytes: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub max_links: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub retries: Option<f64>,
}

impl CommonParams {
    pub fn engine_mode(&self, default: EngineMode) -> Result<EngineMode, BrowserError> {
        match self.engine.as_deref() {
            None | Some("") => Ok(default),
            Some(raw) => EngineMode::parse(raw).ok_or_else(|| {
                BrowserError::InvalidParameter(format!(
                    "engine must be one of auto, fetch, live (got '{}')",
                    raw
                ))
            }),
        }
    }
}
