//! History store
//!
//! Two tiers:
//!
//! * an in-memory [`RingBuffer`] that serves recent windows without I/O
//! * a durable [`SampleStore`], written by a background persistence task fed through a
//!   bounded channel so ingest never waits on disk
//!
//! A cleanup task applies the retention policy to the durable tier: it deletes records
//! older than `max_age` and compacts raw records older than `downsample_after` into
//! coarser buckets.
//!
//! # Examples
//!
//! ```rust
//! use host_pulse::core::metrics::{Reading, Sample};
//! use host_pulse::core::types::ResolvedValue;
//! use host_pulse::history::HistoryStore;
//!
//! let history = HistoryStore::in_memory(2);
//! for ts in [1_000, 2_000, 3_000] {
//!     let mut sample = Sample::new(ts);
//!     sample.insert("load_average", Reading::new(ResolvedValue::Numeric(0.5)));
//!     history.ingest(sample);
//! }
//! assert_eq!(history.oldest_in_memory(), Some(2_000));
//! ```

mod cleanup;
pub mod migrations;
mod persistence;
mod ring;
mod store;
mod types;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::Config;
use crate::core::metrics::Sample;
use crate::traits::SampleStore;

pub use ring::RingBuffer;
pub use store::SqliteStore;
pub use types::{HistoryStats, PersistenceStatus};

/// Tunables of the history tiers, usually taken from [`Config`]
#[derive(Debug, Clone)]
pub struct HistoryOptions {
    pub ring_capacity: usize,
    pub channel_capacity: usize,
    pub flush_interval: Duration,
    pub flush_batch: usize,
    pub max_age: Duration,
    pub cleanup_interval: Duration,
    pub downsample_after: Duration,
    pub downsample_bucket: Duration,
}

impl HistoryOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ring_capacity: config.retention.max_points,
            channel_capacity: config.sampler.channel_capacity,
            flush_interval: config.storage.flush_interval,
            flush_batch: config.storage.flush_batch,
            max_age: config.retention.max_age,
            cleanup_interval: config.retention.cleanup_interval,
            downsample_after: config.retention.downsample_after,
            downsample_bucket: config.retention.downsample_bucket,
        }
    }
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

struct Inner {
    ring: RwLock<RingBuffer>,
    tx: Option<mpsc::Sender<Sample>>,
    durable: Option<Arc<dyn SampleStore>>,
    status: Arc<Mutex<PersistenceStatus>>,
}

/// Shared handle to both history tiers
#[derive(Clone)]
pub struct HistoryStore {
    inner: Arc<Inner>,
}

/// Background tasks owned by a durable history store
pub struct HistoryTasks {
    persistence: JoinHandle<()>,
    cleanup: JoinHandle<()>,
}

impl HistoryTasks {
    /// Waits for both tasks after shutdown was signalled; the persistence task makes a
    /// final flush of its backlog before it returns
    pub async fn join(self) {
        if let Err(e) = self.persistence.await {
            warn!(error = %e, "persistence task ended abnormally");
        }
        if let Err(e) = self.cleanup.await {
            warn!(error = %e, "cleanup task ended abnormally");
        }
    }
}

impl HistoryStore {
    /// Ring buffer only, nothing is persisted
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                ring: RwLock::new(RingBuffer::new(capacity)),
                tx: None,
                durable: None,
                status: Arc::new(Mutex::new(PersistenceStatus::default())),
            }),
        }
    }

    /// Ring buffer backed by `store`; spawns the persistence and cleanup tasks, which run
    /// until `shutdown` flips to true (or its sender is dropped)
    pub fn with_store(
        store: Arc<dyn SampleStore>,
        options: HistoryOptions,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, HistoryTasks) {
        let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));
        let status = Arc::new(Mutex::new(PersistenceStatus::default()));

        let persistence = tokio::spawn(persistence::run(
            Arc::clone(&store),
            rx,
            persistence::FlushPolicy {
                interval: options.flush_interval,
                batch: options.flush_batch.max(1),
                max_backlog: options.ring_capacity.max(1),
            },
            Arc::clone(&status),
            shutdown.clone(),
        ));
        let cleanup = tokio::spawn(cleanup::run(
            Arc::clone(&store),
            cleanup::CleanupPolicy {
                interval: options.cleanup_interval,
                max_age: options.max_age,
                downsample_after: options.downsample_after,
                downsample_bucket: options.downsample_bucket,
            },
            shutdown,
        ));

        let history = Self {
            inner: Arc::new(Inner {
                ring: RwLock::new(RingBuffer::new(options.ring_capacity)),
                tx: Some(tx),
                durable: Some(store),
                status,
            }),
        };
        (history, HistoryTasks { persistence, cleanup })
    }

    /// Adds `sample` to the ring buffer and queues it for persistence without waiting
    ///
    /// Returns the sample as stored (its timestamp may have been moved forward to keep
    /// the stream strictly increasing).
    pub fn ingest(&self, sample: Sample) -> Sample {
        let stored = self.inner.ring.write().push(sample);

        if let Some(tx) = &self.inner.tx {
            match tx.try_send(stored.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(dropped)) => {
                    self.inner.status.lock().dropped += 1;
                    warn!(timestamp = dropped.timestamp, "persistence channel full, sample kept in memory only");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("persistence task stopped, sample kept in memory only");
                }
            }
        }
        stored
    }

    pub fn latest(&self) -> Option<Sample> {
        self.inner.ring.read().latest().cloned()
    }

    /// In-memory samples with `from <= timestamp <= to`
    pub fn memory_range(&self, from: i64, to: i64) -> Vec<Sample> {
        self.inner.ring.read().range(from, to)
    }

    pub fn oldest_in_memory(&self) -> Option<i64> {
        self.inner.ring.read().oldest_timestamp()
    }

    pub fn durable(&self) -> Option<&Arc<dyn SampleStore>> {
        self.inner.durable.as_ref()
    }

    pub fn persistence_status(&self) -> PersistenceStatus {
        self.inner.status.lock().clone()
    }

    pub fn stats(&self) -> HistoryStats {
        let ring = self.inner.ring.read();
        HistoryStats {
            ring_len: ring.len(),
            ring_capacity: ring.capacity(),
            ring_evicted: ring.evicted(),
            oldest: ring.oldest_timestamp(),
            newest: ring.newest_timestamp(),
            durable: self.inner.durable.is_some(),
            persistence: self.persistence_status(),
        }
    }
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore").field("stats", &self.stats()).finish()
    }
}
