//! Host Pulse - live and historical host metrics behind an HTTP API
//!
//! This crate samples a host's resource metrics (CPU, memory, disk, temperature, network
//! and board-specific sensors) through external commands, `/proc` and `/sys` files and
//! direct system calls, caches the results, and keeps a bounded queryable history.
//!
//! # Architecture
//!
//! - **Probe Registry** ([`registry`]): declares each metric's unit, value kind and
//!   ordered fallback chain of probes
//! - **Probe Executor** ([`probe`]): runs one probe and parses its output into a typed value
//! - **Fallback Resolver** ([`resolver`]): tries a metric's probes in order, each under
//!   its own deadline
//! - **Command Cache** ([`cache`]): TTL cache with single-flight, shared by the sampler
//!   and request handlers
//! - **Sampler** ([`sampler`]): fixed-interval background collection into samples
//! - **History Store** ([`history`]): in-memory ring buffer plus SQLite persistence
//!   with retention and compaction
//! - **Query Engine** ([`query`]): range queries with time-bucketed downsampling
//! - **HTTP API** ([`server`]): axum handlers over all of the above
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use host_pulse::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let registry = Arc::new(ProbeRegistry::builtin()?);
//! let config = Config::default();
//! let resolver = Arc::new(FallbackResolver::new(Arc::new(SystemProbeExecutor::new()), config.probes));
//! let cache = CommandCache::new(registry, resolver, config.cache);
//!
//! let load = cache.get_or_resolve("load_average").await?;
//! println!("load average: {:?}", load.value);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Probe failures never surface as errors: they are folded into an unavailable reading
//! for the affected metric. [`Error`] is returned for unknown metric names, invalid
//! configuration and durable-store failures.

pub mod cache;
pub mod config;
pub mod core;
pub mod error;
pub mod history;
pub mod probe;
pub mod query;
pub mod registry;
pub mod resolver;
pub mod sampler;
pub mod server;
pub mod traits;

#[cfg(test)]
mod test_utils;

pub use error::{Error, Result};

/// Re-export common types for convenience
pub mod prelude {
    pub use crate::cache::CommandCache;
    pub use crate::config::Config;
    pub use crate::core::{MetricValue, Reading, Resolution, ResolvedValue, Sample, ValueKind};
    pub use crate::history::{HistoryStore, SqliteStore};
    pub use crate::probe::SystemProbeExecutor;
    pub use crate::query::QueryEngine;
    pub use crate::registry::{MetricSpec, ProbeRegistry, ProbeSpec};
    pub use crate::resolver::FallbackResolver;
    pub use crate::sampler::Sampler;
    pub use crate::traits::{ProbeExecutor, SampleStore};
    pub use crate::{Error, Result};
}
