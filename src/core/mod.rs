// Core modules
pub mod metrics;
pub mod types;

pub use metrics::{now_millis, HistoryRecord, Reading, Sample};
pub use types::{MetricValue, Resolution, ResolvedValue, ValueKind};
