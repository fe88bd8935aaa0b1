use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;
use crate::core::metrics::{Reading, Sample};
use crate::core::types::ValueKind;
use crate::history::HistoryStats;
use crate::query::{Bucket, QueryResult};
use crate::registry::{MetricSpec, ProbeRegistry};
use crate::sampler::SamplerSnapshot;

/// How one metric value is presented to API clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub value: serde_json::Value,
    pub unit: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub unavailable: bool,
}

impl Envelope {
    pub fn new(reading: &Reading, unit: &str) -> Self {
        Self {
            value: reading.value.to_json(),
            unit: unit.to_string(),
            stale: reading.stale,
            unavailable: !reading.is_available(),
        }
    }
}

/// Wraps every reading of `values`, using the registry for units
pub fn envelopes(registry: &ProbeRegistry, values: &BTreeMap<String, Reading>) -> BTreeMap<String, Envelope> {
    values
        .iter()
        .map(|(name, reading)| {
            let unit = registry.spec_for(name).map(|spec| spec.unit.clone()).unwrap_or_default();
            (name.clone(), Envelope::new(reading, &unit))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct SystemParams {
    /// Minutes of aggregated history to return alongside the current reading
    pub history: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct MetricsParams {
    pub minutes: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CommandParams {
    pub command: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SystemResponse {
    pub timestamp: i64,
    pub metrics: BTreeMap<String, Envelope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<MetricsResponse>,
}

impl SystemResponse {
    pub fn new(registry: &ProbeRegistry, sample: &Sample) -> Self {
        Self { timestamp: sample.timestamp, metrics: envelopes(registry, &sample.values), history: None }
    }
}

#[derive(Debug, Serialize)]
pub struct BucketView {
    pub timestamp: i64,
    pub samples: usize,
    pub metrics: BTreeMap<String, Envelope>,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub minutes: u64,
    /// `null` when raw samples are returned
    pub bucket_seconds: Option<u64>,
    pub buckets: Vec<BucketView>,
    pub partial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl MetricsResponse {
    pub fn new(registry: &ProbeRegistry, minutes: u64, result: QueryResult) -> Self {
        let buckets = result
            .buckets
            .iter()
            .map(|Bucket { timestamp, samples, values }| BucketView {
                timestamp: *timestamp,
                samples: *samples,
                metrics: envelopes(registry, values),
            })
            .collect();
        Self {
            minutes,
            bucket_seconds: result.bucket_seconds,
            buckets,
            partial: result.partial,
            diagnostic: result.diagnostic,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommandInfo {
    pub name: String,
    pub unit: String,
    pub kind: ValueKind,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Probe labels in fallback order
    pub probes: Vec<String>,
    pub serve_stale: bool,
}

impl From<&MetricSpec> for CommandInfo {
    fn from(spec: &MetricSpec) -> Self {
        Self {
            name: spec.name.clone(),
            unit: spec.unit.clone(),
            kind: spec.kind,
            description: spec.description.clone(),
            probes: spec.probes.iter().map(|p| p.label()).collect(),
            serve_stale: spec.serve_stale,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommandsResponse {
    pub commands: Vec<CommandInfo>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub command: String,
    #[serde(flatten)]
    pub envelope: Envelope,
    pub resolved_at: i64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sampler: SamplerSnapshot,
    pub history: HistoryStats,
    pub cache: CacheStats,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
