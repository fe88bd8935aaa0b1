use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::core::types::Resolution;

/// The cached resolution of one metric
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub resolution: Resolution,
    pub stored_at: Instant,
    /// Freshness window this entry was stored with
    pub ttl: Duration,
    /// Most recent fresh, available resolution; survives negative entries
    pub last_good: Option<Resolution>,
}

impl CacheEntry {
    pub fn new(resolution: Resolution, ttl: Duration, last_good: Option<Resolution>) -> Self {
        Self { resolution, stored_at: Instant::now(), ttl, last_good }
    }

    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }

    /// Whether the entry is still inside its freshness window
    pub fn is_live(&self) -> bool {
        self.age() < self.ttl
    }
}

/// Counters reported on the health endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub in_flight: usize,
    pub hits: u64,
    /// Resolutions started
    pub misses: u64,
    /// Callers that awaited an already running resolution
    pub joined: u64,
    pub flight_timeouts: u64,
}
