// Traits module
//
// The two seams of the engine: how a single probe is executed, and where samples
// are persisted. Everything above them (resolver, cache, sampler, query) is generic
// over these so tests can substitute scripted implementations.

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::core::metrics::Sample;
use crate::core::types::MetricValue;
use crate::error::Result;
use crate::registry::ProbeSpec;

/// Runs a single probe and parses its output
///
/// Implementations report failure as an error and never retry internally; falling back
/// to the next probe is the resolver's job. The resolver also bounds every call with the
/// probe's timeout and drops the returned future when it expires, so implementations must
/// release whatever they acquired (child processes, file handles) on drop.
///
/// # Examples
///
/// ```rust
/// use host_pulse::core::types::MetricValue;
/// use host_pulse::registry::ProbeSpec;
/// use host_pulse::traits::ProbeExecutor;
/// use host_pulse::Result;
///
/// struct Constant(f64);
///
/// #[async_trait::async_trait]
/// impl ProbeExecutor for Constant {
///     async fn execute(&self, _probe: &ProbeSpec) -> Result<MetricValue> {
///         Ok(MetricValue::Numeric(self.0))
///     }
/// }
/// ```
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProbeExecutor: Send + Sync {
    async fn execute(&self, probe: &ProbeSpec) -> Result<MetricValue>;
}

/// Durable, append-mostly storage for samples
///
/// A single persistence task writes; any number of query handlers read concurrently.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SampleStore: Send + Sync {
    /// Writes a batch atomically. Re-appending a sample with an existing timestamp replaces it.
    async fn append(&self, batch: &[Sample]) -> Result<()>;

    /// Samples with `from <= timestamp <= to`, ordered by timestamp
    async fn range(&self, from: i64, to: i64) -> Result<Vec<Sample>>;

    /// Deletes every sample older than `cutoff`, returning the number of rows removed
    async fn delete_before(&self, cutoff: i64) -> Result<u64>;

    /// Replaces raw samples older than `before` with one aggregated sample per
    /// `bucket_ms`-wide bucket, returning the number of buckets written
    async fn compact(&self, before: i64, bucket_ms: i64) -> Result<u64>;
}
