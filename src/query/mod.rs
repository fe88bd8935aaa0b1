//! Range queries over the history tiers
//!
//! A window the ring buffer fully covers is answered from memory. Anything older goes
//! to the durable store and is merged with the in-memory tail, de-duplicated by
//! timestamp. A failed durable read degrades to a partial, memory-only answer carrying
//! a diagnostic instead of failing the query.

pub mod aggregate;


use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::core::metrics::{now_millis, Sample};
use crate::history::HistoryStore;

pub use aggregate::{bucket_width_for, Bucket};

/// Answer to a range query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub from: i64,
    pub to: i64,
    /// Width of each bucket, `None` when raw samples were returned
    pub bucket_seconds: Option<u64>,
    pub buckets: Vec<Bucket>,
    /// True when the durable tier could not be read and only memory was served
    pub partial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

#[derive(Debug, Clone)]
pub struct QueryEngine {
    history: HistoryStore,
    max_window: Duration,
}

impl QueryEngine {
    /// `max_window` bounds [`QueryEngine::recent`], usually the retention age
    pub fn new(history: HistoryStore, max_window: Duration) -> Self {
        Self { history, max_window }
    }

    /// Records with `from <= timestamp <= to`, bucketed when `width` is given
    #[instrument(skip(self))]
    pub async fn query(&self, from: i64, to: i64, width: Option<Duration>) -> QueryResult {
        let mut result = QueryResult {
            from,
            to,
            bucket_seconds: width.map(|w| w.as_secs()),
            buckets: Vec::new(),
            partial: false,
            diagnostic: None,
        };
        if from > to {
            return result;
        }

        let records = self.records(from, to, &mut result).await;
        result.buckets = match width {
            Some(width) => aggregate::aggregate(&records, width.as_millis() as i64),
            None => records.into_iter().map(Bucket::from_sample).collect(),
        };
        result
    }

    /// The last `minutes` minutes, clamped to the retention window, at the width the
    /// bucket table picks for that window length
    pub async fn recent(&self, minutes: u64) -> QueryResult {
        self.recent_at(minutes, now_millis()).await
    }

    pub async fn recent_at(&self, minutes: u64, now: i64) -> QueryResult {
        let window = Duration::from_secs(minutes.saturating_mul(60)).min(self.max_window);
        let from = now.saturating_sub(window.as_millis() as i64);
        self.query(from, now, bucket_width_for(window)).await
    }

    /// Window length in whole minutes after clamping to the retention window
    pub fn clamp_minutes(&self, minutes: u64) -> u64 {
        minutes.min(self.max_window.as_secs() / 60)
    }

    async fn records(&self, from: i64, to: i64, result: &mut QueryResult) -> Vec<Sample> {
        let memory = self.history.memory_range(from, to);
        let covered = self.history.oldest_in_memory().is_some_and(|oldest| oldest <= from);

        let durable = match self.history.durable() {
            Some(store) if !covered => store,
            _ => return memory,
        };

        match durable.range(from, to).await {
            Ok(stored) => {
                debug!(durable = stored.len(), memory = memory.len(), "merging history tiers");
                merge(stored, memory)
            }
            Err(e) => {
                warn!(error = %e, "durable history unavailable, serving memory only");
                result.partial = true;
                result.diagnostic = Some(e.to_string());
                memory
            }
        }
    }
}

/// Union of both tiers ordered by timestamp; the in-memory copy wins on collision
fn merge(stored: Vec<Sample>, memory: Vec<Sample>) -> Vec<Sample> {
    let mut by_time: BTreeMap<i64, Sample> = stored.into_iter().map(|s| (s.timestamp, s)).collect();
    for sample in memory {
        by_time.insert(sample.timestamp, sample);
    }
    by_time.into_values().collect()
}
