use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::metrics::{Reading, Sample};
use crate::core::types::{MetricValue, ResolvedValue};
use crate::error::{Error, Result};
use crate::registry::{MetricSpec, OutputParser, ProbeSpec};
use crate::traits::{ProbeExecutor, SampleStore};

/// What a scripted probe does when executed
#[derive(Debug, Clone)]
pub enum Behavior {
    Value(MetricValue),
    Fail,
    Hang,
    Delay(Duration, MetricValue),
}

/// Probe executor driven by a per-label script, counting every execution
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    behaviors: Mutex<HashMap<String, Behavior>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, label: &str, behavior: Behavior) {
        self.behaviors.lock().insert(label.to_string(), behavior);
    }

    pub fn calls(&self, label: &str) -> usize {
        self.calls.lock().get(label).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }
}

#[async_trait]
impl ProbeExecutor for ScriptedExecutor {
    async fn execute(&self, probe: &ProbeSpec) -> Result<MetricValue> {
        let label = probe.label();
        *self.calls.lock().entry(label.clone()).or_default() += 1;
        let behavior = self.behaviors.lock().get(&label).cloned().unwrap_or(Behavior::Fail);
        match behavior {
            Behavior::Value(value) => Ok(value),
            Behavior::Fail => Err(Error::probe_failed(label, "scripted failure")),
            Behavior::Hang => std::future::pending().await,
            Behavior::Delay(delay, value) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
        }
    }
}

/// A numeric metric whose probes are commands named after `probes`, in order
pub fn scripted_metric(name: &str, probes: &[&str]) -> MetricSpec {
    probes.iter().fold(MetricSpec::numeric(name, "°C"), |spec, program| {
        spec.probe(ProbeSpec::command(*program, &[], OutputParser::number()))
    })
}

/// Label of the command probe created by [`scripted_metric`]
pub fn label(program: &str) -> String {
    format!("command:{program}")
}

pub fn numeric_sample(timestamp: i64, values: &[(&str, f64)]) -> Sample {
    let mut sample = Sample::new(timestamp);
    for (name, value) in values {
        sample.insert(*name, Reading::new(ResolvedValue::Numeric(*value)));
    }
    sample
}

/// In-memory sample store that can be told to fail its next appends or reads
#[derive(Debug, Default)]
pub struct FlakyStore {
    samples: Mutex<BTreeMap<i64, Sample>>,
    failing_appends: AtomicUsize,
    failing_reads: AtomicUsize,
    appends: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_appends(&self, count: usize) {
        self.failing_appends.store(count, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, count: usize) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    pub fn timestamps(&self) -> Vec<i64> {
        self.samples.lock().keys().copied().collect()
    }

    pub fn append_calls(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
    }
}

#[async_trait]
impl SampleStore for FlakyStore {
    async fn append(&self, batch: &[Sample]) -> Result<()> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_appends) {
            return Err(Error::persistence_write("disk full"));
        }
        let mut samples = self.samples.lock();
        for sample in batch {
            samples.insert(sample.timestamp, sample.clone());
        }
        Ok(())
    }

    async fn range(&self, from: i64, to: i64) -> Result<Vec<Sample>> {
        if Self::take_failure(&self.failing_reads) {
            return Err(Error::persistence_read("database is locked"));
        }
        Ok(self.samples.lock().range(from..=to).map(|(_, s)| s.clone()).collect())
    }

    async fn delete_before(&self, cutoff: i64) -> Result<u64> {
        let mut samples = self.samples.lock();
        let before = samples.len();
        samples.retain(|&ts, _| ts >= cutoff);
        Ok((before - samples.len()) as u64)
    }

    async fn compact(&self, _before: i64, _bucket_ms: i64) -> Result<u64> {
        Ok(0)
    }
}
