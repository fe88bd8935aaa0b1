use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use host_pulse::core::MetricValue;
use host_pulse::registry::ProbeSpec;
use host_pulse::traits::ProbeExecutor;
use host_pulse::{Error, Result};

/// Canned outcome for one probe label
#[derive(Debug, Clone)]
pub enum Stub {
    Value(MetricValue),
    Fail,
    Slow(Duration, MetricValue),
}

/// Executor answering from a table of probe labels, counting every call
#[derive(Debug, Default)]
pub struct StubExecutor {
    stubs: Mutex<HashMap<String, Stub>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl StubExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stub(&self, label: &str, stub: Stub) -> &Self {
        self.stubs.lock().unwrap().insert(label.to_string(), stub);
        self
    }

    pub fn calls(&self, label: &str) -> usize {
        self.calls.lock().unwrap().get(label).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ProbeExecutor for StubExecutor {
    async fn execute(&self, probe: &ProbeSpec) -> Result<MetricValue> {
        let label = probe.label();
        *self.calls.lock().unwrap().entry(label.clone()).or_default() += 1;
        let stub = self.stubs.lock().unwrap().get(&label).cloned();
        match stub {
            Some(Stub::Value(value)) => Ok(value),
            Some(Stub::Slow(delay, value)) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            Some(Stub::Fail) | None => Err(Error::ProbeFailed { probe: label, reason: "stubbed failure".into() }),
        }
    }
}
