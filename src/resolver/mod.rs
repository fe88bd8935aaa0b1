//! Fallback resolution
//!
//! [`FallbackResolver`] walks a metric's probes in declared order and stops at the first
//! one that produces a value of the declared kind. Every attempt is bounded by the probe's
//! timeout, so the worst case for a metric is the sum of its probe timeouts. Probe errors
//! never escape: when the whole chain fails the result is an unavailable reading, or the
//! last good value flagged stale for metrics that opt into serve-stale.


use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::config::ProbesConfig;
use crate::core::types::Resolution;
use crate::error::Error;
use crate::registry::MetricSpec;
use crate::traits::ProbeExecutor;

pub struct FallbackResolver {
    executor: Arc<dyn ProbeExecutor>,
    timeouts: ProbesConfig,
}

impl FallbackResolver {
    pub fn new(executor: Arc<dyn ProbeExecutor>, timeouts: ProbesConfig) -> Self {
        Self { executor, timeouts }
    }

    /// Resolves `metric`, returning an unavailable reading if every probe fails
    pub async fn resolve(&self, metric: &MetricSpec) -> Resolution {
        self.resolve_or_stale(metric, None).await
    }

    /// Resolves `metric`; when every probe fails and the metric serves stale values,
    /// `last_good` is returned flagged stale instead of an unavailable reading
    #[instrument(skip_all, fields(metric = %metric.name))]
    pub async fn resolve_or_stale(&self, metric: &MetricSpec, last_good: Option<Resolution>) -> Resolution {
        for probe in &metric.probes {
            let timeout = self.timeouts.timeout_for(probe);
            let error = match tokio::time::timeout(timeout, self.executor.execute(probe)).await {
                Ok(Ok(value)) if value.kind() == metric.kind => {
                    debug!(probe = %probe.label(), "probe succeeded");
                    return Resolution::fresh(value);
                }
                Ok(Ok(value)) => Error::probe_parse(
                    probe.label(),
                    format!("expected a {} value, got {}", metric.kind, value.kind()),
                ),
                Ok(Err(e)) => e,
                Err(_) => Error::probe_timeout(probe.label(), timeout),
            };
            debug!(error = %error, "probe failed, trying next");
        }

        match last_good.filter(|r| metric.serve_stale && r.is_available()) {
            Some(previous) => {
                warn!(probes = metric.probes.len(), "all probes failed, serving last good value as stale");
                previous.into_stale()
            }
            None => {
                warn!(probes = metric.probes.len(), "all probes failed, metric unavailable");
                Resolution::unavailable()
            }
        }
    }
}

impl std::fmt::Debug for FallbackResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackResolver").field("timeouts", &self.timeouts).finish_non_exhaustive()
    }
}
