//! # Core Types Module
//!
//! Value types shared by every layer of the probe engine.
//!
//! ## Key Types
//!
//! * `ValueKind` - The declared shape of a metric (numeric, text or structured)
//! * `MetricValue` - A successfully parsed probe value
//! * `ResolvedValue` - A metric value or an explicit `Unavailable` marker
//! * `Resolution` - A resolved value together with its staleness and resolution time
//!
//! ## Example
//!
//! ```rust
//! use host_pulse::core::types::{MetricValue, ResolvedValue, ValueKind};
//!
//! let value = ResolvedValue::from(MetricValue::Numeric(45.2));
//! assert_eq!(value.kind(), Some(ValueKind::Numeric));
//! assert_eq!(value.as_f64(), Some(45.2));
//! assert!(!ResolvedValue::Unavailable.is_available());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// The declared shape of a metric's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// A single floating point reading (averaged when downsampled)
    Numeric,
    /// A categorical string (latest value wins when downsampled)
    Text,
    /// A JSON document such as per-interface counters (latest value wins when downsampled)
    Structured,
}

impl ValueKind {
    /// Returns the lowercase label used in storage and the HTTP envelope
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Text => "text",
            Self::Structured => "structured",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successfully parsed probe value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Numeric(f64),
    Text(String),
    Structured(serde_json::Value),
}

impl MetricValue {
    /// Returns the kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Numeric(_) => ValueKind::Numeric,
            Self::Text(_) => ValueKind::Text,
            Self::Structured(_) => ValueKind::Structured,
        }
    }
}

/// A metric's value after resolution, with unavailability as a first-class variant
///
/// Serialized with an explicit `kind` tag so aggregation can dispatch on it without
/// guessing from the JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResolvedValue {
    Numeric(f64),
    Text(String),
    Structured(serde_json::Value),
    Unavailable,
}

impl ResolvedValue {
    /// Returns the value kind, or `None` for `Unavailable`
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Self::Numeric(_) => Some(ValueKind::Numeric),
            Self::Text(_) => Some(ValueKind::Text),
            Self::Structured(_) => Some(ValueKind::Structured),
            Self::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    /// Renders the bare value as JSON (`null` when unavailable)
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Numeric(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Structured(v) => v.clone(),
            Self::Unavailable => serde_json::Value::Null,
        }
    }
}

impl From<MetricValue> for ResolvedValue {
    fn from(value: MetricValue) -> Self {
        match value {
            MetricValue::Numeric(v) => Self::Numeric(v),
            MetricValue::Text(s) => Self::Text(s),
            MetricValue::Structured(v) => Self::Structured(v),
        }
    }
}

/// The outcome of resolving one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// The resolved value, or `Unavailable`
    pub value: ResolvedValue,
    /// True when the value is a previous good reading served because every probe failed
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
    /// Unix timestamp (milliseconds) of the probe execution that produced `value`
    pub resolved_at: i64,
}

impl Resolution {
    /// A fresh resolution produced just now
    pub fn fresh(value: MetricValue) -> Self {
        Self { value: value.into(), stale: false, resolved_at: crate::core::metrics::now_millis() }
    }

    /// An unavailable marker stamped with the current time
    pub fn unavailable() -> Self {
        Self { value: ResolvedValue::Unavailable, stale: false, resolved_at: crate::core::metrics::now_millis() }
    }

    /// Re-serves this resolution's value flagged as stale
    pub fn into_stale(self) -> Self {
        Self { stale: true, ..self }
    }

    pub fn is_available(&self) -> bool {
        self.value.is_available()
    }
}
