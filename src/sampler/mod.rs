//! Background sampler
//!
//! One task wakes on a fixed interval, resolves every registered metric through the
//! [`CommandCache`] (so it shares freshness and single-flight with request handlers),
//! assembles a [`Sample`] and hands it to the [`HistoryStore`].
//!
//! A tick that overruns the interval causes the missed ticks to be skipped, never
//! queued. On shutdown an in-progress tick is abandoned; nothing it produced has been
//! ingested yet, so the ring buffer is never left half-written.

mod types;


use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::CommandCache;
use crate::core::metrics::{now_millis, Reading, Sample};
use crate::history::HistoryStore;

pub use types::{SamplerSnapshot, SamplerStats};

/// Resolves every registered metric into one sample stamped `timestamp`
///
/// Metrics resolve concurrently; each one's probes still run in order. Every registry
/// name is present in the result, unresolvable ones as unavailable readings.
pub async fn collect_sample_at(cache: &CommandCache, timestamp: i64) -> Sample {
    let registry = Arc::clone(cache.registry());
    let resolutions = join_all(registry.names().map(|name| async move {
        let reading = match cache.get_or_resolve(name).await {
            Ok(resolution) => Reading::from(resolution),
            Err(e) => {
                warn!(metric = name, error = %e, "metric could not be resolved");
                Reading::unavailable()
            }
        };
        (name.to_string(), reading)
    }))
    .await;

    let mut sample = Sample::new(timestamp);
    for (name, reading) in resolutions {
        sample.insert(name, reading);
    }
    sample
}

/// [`collect_sample_at`] stamped with the current time
pub async fn collect_sample(cache: &CommandCache) -> Sample {
    collect_sample_at(cache, now_millis()).await
}

pub struct Sampler {
    cache: CommandCache,
    history: HistoryStore,
    interval: Duration,
    stats: Arc<SamplerStats>,
}

impl Sampler {
    pub fn new(cache: CommandCache, history: HistoryStore, interval: Duration) -> Self {
        Self { cache, history, interval, stats: Arc::new(SamplerStats::default()) }
    }

    /// Counters shared with the health endpoint
    pub fn stats(&self) -> Arc<SamplerStats> {
        Arc::clone(&self.stats)
    }

    /// Runs until `shutdown` flips to true or its sender is dropped
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval = ?self.interval, metrics = self.cache.registry().len(), "sampler started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let started = Instant::now();
            let timestamp = now_millis();
            let sample = tokio::select! {
                sample = collect_sample_at(&self.cache, timestamp) => sample,
                _ = shutdown.changed() => {
                    info!("shutdown during tick, abandoning sample");
                    break;
                }
            };

            let elapsed = started.elapsed();
            let available = sample.available_count();
            let total = sample.len();
            self.history.ingest(sample);
            self.stats.record_tick(timestamp, elapsed, available, total);

            if elapsed > self.interval {
                let skipped = (elapsed.as_nanos() / self.interval.as_nanos().max(1)) as u32;
                ticker.reset_at(started + self.interval * (skipped + 1));
                self.stats.record_skipped(u64::from(skipped));
                warn!(elapsed = ?elapsed, skipped, "sample collection overran the interval, skipping ticks");
            } else {
                debug!(elapsed = ?elapsed, available, total, "sample collected");
            }
        }
        info!(ticks = self.stats.snapshot().ticks, "sampler stopped");
    }
}
