use serde::Serialize;

/// State of the durable tier as seen by the persistence task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistenceStatus {
    /// Samples waiting to be written
    pub backlog: usize,
    /// Samples written successfully since start
    pub persisted: u64,
    pub failed_flushes: u64,
    /// Samples never written because the channel or the backlog was full
    pub dropped: u64,
    /// Unix ms of the last successful flush
    pub last_flush: Option<i64>,
    /// Cleared by the next successful flush
    pub last_error: Option<String>,
}

/// Snapshot reported on the health endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    pub ring_len: usize,
    pub ring_capacity: usize,
    pub ring_evicted: u64,
    pub oldest: Option<i64>,
    pub newest: Option<i64>,
    pub durable: bool,
    pub persistence: PersistenceStatus,
}
