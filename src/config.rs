//! Runtime configuration
//!
//! Loaded from a YAML file. Every field has a default, so an empty file (or no file at
//! all) yields a working configuration. Durations use humantime notation (`5s`, `7d`).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::registry::constants::{CHEAP_TIMEOUT, EXPENSIVE_TIMEOUT, MODERATE_TIMEOUT};
use crate::registry::{CostClass, MetricSpec, ProbeSpec};

/// Top-level configuration for host-pulse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub sampler: SamplerConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub probes: ProbesConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Extra metric declarations. A metric named like a built-in replaces it.
    #[serde(default)]
    pub metrics: Vec<MetricSpec>,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address. Default: 127.0.0.1:8787.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

/// Background sampler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Tick interval. Default: 5s.
    #[serde(default = "default_sample_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Capacity of the sampler to persistence channel. Default: 1024.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Command cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Freshness window for unavailable and stale results. Default: 5s.
    #[serde(default = "default_negative_ttl", with = "humantime_serde")]
    pub negative_ttl: Duration,

    /// How long callers wait on an in-flight resolution, and how long its marker
    /// is honoured before a new resolution may start. Default: 30s.
    #[serde(default = "default_flight_timeout", with = "humantime_serde")]
    pub flight_timeout: Duration,

    /// Maximum number of cache entries. Default: 256.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

/// Per cost class probe timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbesConfig {
    #[serde(default = "default_cheap_timeout", with = "humantime_serde")]
    pub cheap_timeout: Duration,

    #[serde(default = "default_moderate_timeout", with = "humantime_serde")]
    pub moderate_timeout: Duration,

    #[serde(default = "default_expensive_timeout", with = "humantime_serde")]
    pub expensive_timeout: Duration,
}

impl ProbesConfig {
    pub fn timeout_for_class(&self, cost: CostClass) -> Duration {
        match cost {
            CostClass::Cheap => self.cheap_timeout,
            CostClass::Moderate => self.moderate_timeout,
            CostClass::Expensive => self.expensive_timeout,
        }
    }

    /// The probe's own timeout if declared, otherwise its cost class default
    pub fn timeout_for(&self, probe: &ProbeSpec) -> Duration {
        probe.timeout.unwrap_or_else(|| self.timeout_for_class(probe.cost))
    }
}

/// History retention and downsampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// In-memory ring buffer capacity, in samples. Default: 20000.
    #[serde(default = "default_max_points")]
    pub max_points: usize,

    /// Durable records older than this are deleted. Default: 7d.
    #[serde(default = "default_max_age", with = "humantime_serde")]
    pub max_age: Duration,

    /// How often cleanup and compaction run. Default: 1h.
    #[serde(default = "default_cleanup_interval", with = "humantime_serde")]
    pub cleanup_interval: Duration,

    /// Raw records older than this are compacted into buckets. Default: 2d.
    #[serde(default = "default_downsample_after", with = "humantime_serde")]
    pub downsample_after: Duration,

    /// Width of compacted buckets. Default: 5m.
    #[serde(default = "default_downsample_bucket", with = "humantime_serde")]
    pub downsample_bucket: Duration,
}

/// Durable store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file. Default: host-pulse.db.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,

    /// Maximum time a sample waits in the persistence backlog. Default: 5s.
    #[serde(default = "default_flush_interval", with = "humantime_serde")]
    pub flush_interval: Duration,

    /// Samples written per transaction. Default: 500.
    #[serde(default = "default_flush_batch")]
    pub flush_batch: usize,
}

impl Config {
    /// Load and validate configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::invalid_config(format!("reading {}: {e}", path.display())))?;
        Self::from_yaml(&data)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(data: &str) -> Result<Self> {
        let cfg: Config = if data.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(data).map_err(|e| Error::invalid_config(e.to_string()))?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        let non_zero = [
            ("sampler.interval", self.sampler.interval),
            ("cache.negative_ttl", self.cache.negative_ttl),
            ("cache.flight_timeout", self.cache.flight_timeout),
            ("probes.cheap_timeout", self.probes.cheap_timeout),
            ("probes.moderate_timeout", self.probes.moderate_timeout),
            ("probes.expensive_timeout", self.probes.expensive_timeout),
            ("retention.max_age", self.retention.max_age),
            ("retention.cleanup_interval", self.retention.cleanup_interval),
            ("retention.downsample_bucket", self.retention.downsample_bucket),
            ("storage.flush_interval", self.storage.flush_interval),
        ];
        if let Some((name, _)) = non_zero.iter().find(|(_, d)| d.is_zero()) {
            return Err(Error::invalid_config(format!("{name} must be positive")));
        }

        if self.sampler.channel_capacity == 0 {
            return Err(Error::invalid_config("sampler.channel_capacity must be positive"));
        }
        if self.cache.max_entries == 0 {
            return Err(Error::invalid_config("cache.max_entries must be positive"));
        }
        if self.retention.max_points == 0 {
            return Err(Error::invalid_config("retention.max_points must be positive"));
        }
        if self.storage.flush_batch == 0 {
            return Err(Error::invalid_config("storage.flush_batch must be positive"));
        }
        if self.retention.downsample_after >= self.retention.max_age {
            tracing::warn!("retention.downsample_after >= retention.max_age, compaction will never run");
        }
        Ok(())
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8787))
}

fn default_sample_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_negative_ttl() -> Duration {
    Duration::from_secs(5)
}

fn default_flight_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_entries() -> usize {
    256
}

fn default_cheap_timeout() -> Duration {
    CHEAP_TIMEOUT
}

fn default_moderate_timeout() -> Duration {
    MODERATE_TIMEOUT
}

fn default_expensive_timeout() -> Duration {
    EXPENSIVE_TIMEOUT
}

fn default_max_points() -> usize {
    20_000
}

fn default_max_age() -> Duration {
    Duration::from_secs(7 * 24 * 3600)
}

fn default_cleanup_interval() -> Duration {
    Duration::from_secs(3600)
}

fn default_downsample_after() -> Duration {
    Duration::from_secs(2 * 24 * 3600)
}

fn default_downsample_bucket() -> Duration {
    Duration::from_secs(300)
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("host-pulse.db")
}

fn default_flush_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_flush_batch() -> usize {
    500
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { listen: default_listen() }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self { interval: default_sample_interval(), channel_capacity: default_channel_capacity() }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            negative_ttl: default_negative_ttl(),
            flight_timeout: default_flight_timeout(),
            max_entries: default_max_entries(),
        }
    }
}

impl Default for ProbesConfig {
    fn default() -> Self {
        Self {
            cheap_timeout: default_cheap_timeout(),
            moderate_timeout: default_moderate_timeout(),
            expensive_timeout: default_expensive_timeout(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_points: default_max_points(),
            max_age: default_max_age(),
            cleanup_interval: default_cleanup_interval(),
            downsample_after: default_downsample_after(),
            downsample_bucket: default_downsample_bucket(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            flush_interval: default_flush_interval(),
            flush_batch: default_flush_batch(),
        }
    }
}
