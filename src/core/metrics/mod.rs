//! # Core Metrics Module
//!
//! Samples are the unit of history: one per sampler tick, holding a reading for every
//! metric declared in the registry.
//!
//! ## Example
//!
//! ```rust
//! use host_pulse::core::metrics::{Reading, Sample};
//! use host_pulse::core::types::ResolvedValue;
//!
//! let mut sample = Sample::new(1_700_000_000_000);
//! sample.insert("load_average", Reading::new(ResolvedValue::Numeric(0.42)));
//! sample.insert("cpu_temperature", Reading::unavailable());
//!
//! assert_eq!(sample.len(), 2);
//! assert!(!sample.get("cpu_temperature").unwrap().is_available());
//! ```

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::core::types::{Resolution, ResolvedValue};

/// Current Unix time in milliseconds
pub fn now_millis() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or_default()
}

/// One metric's reading inside a sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub value: ResolvedValue,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
}

impl Reading {
    pub fn new(value: ResolvedValue) -> Self {
        Self { value, stale: false }
    }

    pub fn stale(value: ResolvedValue) -> Self {
        Self { value, stale: true }
    }

    pub fn unavailable() -> Self {
        Self { value: ResolvedValue::Unavailable, stale: false }
    }

    pub fn is_available(&self) -> bool {
        self.value.is_available()
    }
}

impl From<Resolution> for Reading {
    fn from(resolution: Resolution) -> Self {
        Self { value: resolution.value, stale: resolution.stale }
    }
}

/// A point-in-time snapshot of every registered metric
///
/// Immutable once handed to the history store. Metrics that could not be resolved
/// are present with an unavailable reading, never omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    pub values: BTreeMap<String, Reading>,
}

/// A sample as persisted by the history store
pub type HistoryRecord = Sample;

impl Sample {
    pub fn new(timestamp: i64) -> Self {
        Self { timestamp, values: BTreeMap::new() }
    }

    pub fn insert(&mut self, name: impl Into<String>, reading: Reading) {
        self.values.insert(name.into(), reading);
    }

    pub fn get(&self, name: &str) -> Option<&Reading> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of metrics that were resolved to a value (fresh or stale)
    pub fn available_count(&self) -> usize {
        self.values.values().filter(|r| r.is_available()).count()
    }
}
