use std::time::Duration;

/// Error type for host-pulse operations
///
/// Probe-level variants (`ProbeTimeout`, `ProbeParse`, `ProbeFailed`) never escape the
/// fallback resolver; they are folded into an unavailable reading for the affected metric.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Probe `{probe}` timed out after {timeout:?}")]
    ProbeTimeout { probe: String, timeout: Duration },

    #[error("Probe `{probe}` produced unparseable output: {reason}")]
    ProbeParse { probe: String, reason: String },

    #[error("Probe `{probe}` failed: {reason}")]
    ProbeFailed { probe: String, reason: String },

    #[error("Metric unavailable: {0}")]
    MetricUnavailable(String),

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("History write failed: {0}")]
    PersistenceWrite(String),

    #[error("History read failed: {0}")]
    PersistenceRead(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    pub(crate) fn probe_timeout<S: Into<String>>(probe: S, timeout: Duration) -> Self {
        Error::ProbeTimeout { probe: probe.into(), timeout }
    }

    pub(crate) fn probe_parse<S: Into<String>, R: Into<String>>(probe: S, reason: R) -> Self {
        Error::ProbeParse { probe: probe.into(), reason: reason.into() }
    }

    pub(crate) fn probe_failed<S: Into<String>, R: Into<String>>(probe: S, reason: R) -> Self {
        Error::ProbeFailed { probe: probe.into(), reason: reason.into() }
    }

    pub(crate) fn unknown_metric<S: Into<String>>(name: S) -> Self {
        Error::UnknownMetric(name.into())
    }

    pub(crate) fn persistence_write<S: Into<String>>(msg: S) -> Self {
        Error::PersistenceWrite(msg.into())
    }

    pub(crate) fn persistence_read<S: Into<String>>(msg: S) -> Self {
        Error::PersistenceRead(msg.into())
    }

    pub(crate) fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Error::InvalidConfig(msg.into())
    }

    pub(crate) fn invalid_request<S: Into<String>>(msg: S) -> Self {
        Error::InvalidRequest(msg.into())
    }

    /// Whether this error came from a single probe attempt (recoverable by falling back)
    pub fn is_probe_error(&self) -> bool {
        matches!(self, Error::ProbeTimeout { .. } | Error::ProbeParse { .. } | Error::ProbeFailed { .. })
    }
}

/// Result type for host-pulse operations
pub type Result<T> = std::result::Result<T, Error>;
