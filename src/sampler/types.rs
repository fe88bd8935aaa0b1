use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Tick counters updated by the sampler and read by the health endpoint
#[derive(Debug, Default)]
pub struct SamplerStats {
    ticks: AtomicU64,
    skipped: AtomicU64,
    last_tick: AtomicI64,
    last_duration_ms: AtomicU64,
    last_available: AtomicUsize,
    last_total: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SamplerSnapshot {
    pub ticks: u64,
    pub skipped: u64,
    /// Unix ms of the last completed tick, 0 before the first one
    pub last_tick: i64,
    pub last_duration_ms: u64,
    pub last_available: usize,
    pub last_total: usize,
}

impl SamplerStats {
    pub(crate) fn record_tick(&self, timestamp: i64, elapsed: Duration, available: usize, total: usize) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.last_tick.store(timestamp, Ordering::Relaxed);
        self.last_duration_ms.store(elapsed.as_millis() as u64, Ordering::Relaxed);
        self.last_available.store(available, Ordering::Relaxed);
        self.last_total.store(total, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self, count: u64) {
        self.skipped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SamplerSnapshot {
        SamplerSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            last_tick: self.last_tick.load(Ordering::Relaxed),
            last_duration_ms: self.last_duration_ms.load(Ordering::Relaxed),
            last_available: self.last_available.load(Ordering::Relaxed),
            last_total: self.last_total.load(Ordering::Relaxed),
        }
    }
}
