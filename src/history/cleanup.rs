use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::core::metrics::now_millis;
use crate::traits::SampleStore;

#[derive(Debug, Clone, Copy)]
pub(crate) struct CleanupPolicy {
    pub interval: Duration,
    pub max_age: Duration,
    pub downsample_after: Duration,
    pub downsample_bucket: Duration,
}

/// Applies retention to the durable tier every `policy.interval`, starting immediately
pub(crate) async fn run(store: Arc<dyn SampleStore>, policy: CleanupPolicy, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(policy.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => apply(store.as_ref(), &policy, now_millis()).await,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// One retention pass at wall-clock time `now`
pub(crate) async fn apply(store: &dyn SampleStore, policy: &CleanupPolicy, now: i64) {
    let cutoff = now - policy.max_age.as_millis() as i64;
    match store.delete_before(cutoff).await {
        Ok(0) => {}
        Ok(deleted) => info!(deleted, cutoff, "expired history records removed"),
        Err(e) => warn!(error = %e, "history cleanup failed"),
    }

    if policy.downsample_after >= policy.max_age {
        return;
    }
    let before = now - policy.downsample_after.as_millis() as i64;
    let bucket_ms = policy.downsample_bucket.as_millis() as i64;
    match store.compact(before, bucket_ms).await {
        Ok(0) => {}
        Ok(buckets) => info!(buckets, bucket_ms, "old history compacted"),
        Err(e) => warn!(error = %e, "history compaction failed"),
    }
}
