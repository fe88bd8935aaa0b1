use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::core::metrics::{Reading, Sample};
use crate::core::types::ResolvedValue;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;

/// Window length to bucket width, first match wins; `None` width means raw samples
const BUCKET_TABLE: &[(Duration, Option<Duration>)] = &[
    (Duration::from_secs(30 * MINUTE), None),
    (Duration::from_secs(2 * HOUR), Some(Duration::from_secs(5 * MINUTE))),
    (Duration::from_secs(6 * HOUR), Some(Duration::from_secs(15 * MINUTE))),
    (Duration::from_secs(12 * HOUR), Some(Duration::from_secs(HOUR))),
    (Duration::from_secs(24 * HOUR), Some(Duration::from_secs(2 * HOUR))),
];

const WIDEST_BUCKET: Duration = Duration::from_secs(6 * HOUR);

/// Bucket width for a query window, or `None` when raw samples should be returned
pub fn bucket_width_for(window: Duration) -> Option<Duration> {
    BUCKET_TABLE
        .iter()
        .find(|(limit, _)| window <= *limit)
        .map(|(_, width)| *width)
        .unwrap_or(Some(WIDEST_BUCKET))
}

/// Start of the epoch-aligned bucket containing `timestamp`
pub fn bucket_start(timestamp: i64, width_ms: i64) -> i64 {
    timestamp.div_euclid(width_ms) * width_ms
}

/// Aggregated readings of every sample that fell into one bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    /// Bucket start, Unix ms, aligned to a multiple of the width
    pub timestamp: i64,
    /// Number of samples reduced into this bucket
    pub samples: usize,
    pub values: BTreeMap<String, Reading>,
}

impl Bucket {
    /// A raw sample presented as a bucket of one
    pub fn from_sample(sample: Sample) -> Self {
        Self { timestamp: sample.timestamp, samples: 1, values: sample.values }
    }

    pub fn into_sample(self) -> Sample {
        Sample { timestamp: self.timestamp, values: self.values }
    }
}

/// Reduces time-ordered `records` into epoch-aligned buckets of `width_ms`
///
/// Empty buckets are omitted, so gaps in collection show up as missing buckets.
pub fn aggregate(records: &[Sample], width_ms: i64) -> Vec<Bucket> {
    let width_ms = width_ms.max(1);
    let mut buckets = Vec::new();
    let mut start = 0;
    while start < records.len() {
        let key = bucket_start(records[start].timestamp, width_ms);
        let len = records[start..].iter().take_while(|r| bucket_start(r.timestamp, width_ms) == key).count();
        buckets.push(reduce_bucket(key, &records[start..start + len]));
        start += len;
    }
    buckets
}

fn reduce_bucket(timestamp: i64, samples: &[Sample]) -> Bucket {
    let mut per_metric: BTreeMap<&str, Vec<&Reading>> = BTreeMap::new();
    for sample in samples {
        for (name, reading) in &sample.values {
            per_metric.entry(name.as_str()).or_default().push(reading);
        }
    }

    let values = per_metric.into_iter().map(|(name, readings)| (name.to_string(), reduce(&readings))).collect();
    Bucket { timestamp, samples: samples.len(), values }
}

/// Mean of numeric readings, latest value for categorical ones
///
/// The kind of the latest available reading decides the reduction. The result is stale
/// only when every contributing reading was stale.
pub fn reduce(readings: &[&Reading]) -> Reading {
    let available: Vec<&Reading> = readings.iter().copied().filter(|r| r.is_available()).collect();
    let Some(latest) = available.last() else {
        return Reading::unavailable();
    };
    let stale = available.iter().all(|r| r.stale);

    let value = match latest.value {
        ResolvedValue::Numeric(_) => {
            let numbers: Vec<f64> = available.iter().filter_map(|r| r.value.as_f64()).collect();
            ResolvedValue::Numeric(numbers.iter().sum::<f64>() / numbers.len() as f64)
        }
        _ => latest.value.clone(),
    };
    Reading { value, stale }
}
