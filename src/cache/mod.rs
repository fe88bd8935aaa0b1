//! Command cache
//!
//! [`CommandCache`] sits in front of the [`FallbackResolver`] and is shared by the sampler
//! and every request handler. It provides three guarantees:
//!
//! * a live entry is served without touching any probe
//! * at most one resolution per metric is in flight; concurrent callers await the same
//!   shared future instead of starting their own
//! * no caller waits longer than the flight timeout, and a flight marker older than the
//!   flight timeout is replaced, so a hung probe cannot starve later callers
//!
//! Unavailable and stale results are cached too, with the shorter negative TTL, so a metric
//! that is broken on this host is not re-probed on every request.

mod types;


use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::config::CacheConfig;
use crate::core::types::Resolution;
use crate::error::Result;
use crate::registry::{MetricSpec, ProbeRegistry};
use crate::resolver::FallbackResolver;

pub use types::{CacheEntry, CacheStats};

type Flight = Shared<BoxFuture<'static, Resolution>>;

struct InFlight {
    id: u64,
    started: Instant,
    future: Flight,
}

enum Join {
    Hit(Resolution),
    Wait(Flight, Instant),
}

struct Inner {
    registry: Arc<ProbeRegistry>,
    resolver: Arc<FallbackResolver>,
    config: CacheConfig,
    entries: RwLock<HashMap<String, CacheEntry>>,
    in_flight: Mutex<HashMap<String, InFlight>>,
    next_flight: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    joined: AtomicU64,
    flight_timeouts: AtomicU64,
}

/// Time-bounded, size-bounded, single-flight cache of metric resolutions
#[derive(Clone)]
pub struct CommandCache {
    inner: Arc<Inner>,
}

impl CommandCache {
    pub fn new(registry: Arc<ProbeRegistry>, resolver: Arc<FallbackResolver>, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                resolver,
                config,
                entries: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                next_flight: AtomicU64::new(0),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                joined: AtomicU64::new(0),
                flight_timeouts: AtomicU64::new(0),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<ProbeRegistry> {
        &self.inner.registry
    }

    /// Returns the live cached resolution for `name`, resolving it if needed
    ///
    /// The only error is [`Error::UnknownMetric`](crate::Error::UnknownMetric); probe
    /// failures come back as an unavailable (or stale) resolution.
    #[instrument(skip(self))]
    pub async fn get_or_resolve(&self, name: &str) -> Result<Resolution> {
        let spec = self.inner.registry.spec_for(name)?;
        if let Some(hit) = self.inner.lookup(name) {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }

        let (flight, started) = match self.join_or_start(&spec) {
            Join::Hit(hit) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(hit);
            }
            Join::Wait(flight, started) => (flight, started),
        };

        let deadline = started + self.inner.config.flight_timeout;
        match tokio::time::timeout_at(deadline, flight).await {
            Ok(resolution) => Ok(resolution),
            Err(_) => {
                self.inner.flight_timeouts.fetch_add(1, Ordering::Relaxed);
                warn!(timeout = ?self.inner.config.flight_timeout, "in-flight resolution timed out");
                Ok(self.inner.fallback_for(&spec))
            }
        }
    }

    /// Cached entry for `name` regardless of freshness
    pub fn peek(&self, name: &str) -> Option<CacheEntry> {
        self.inner.entries.read().get(name).cloned()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.inner.entries.read().len(),
            in_flight: self.inner.in_flight.lock().len(),
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            joined: self.inner.joined.load(Ordering::Relaxed),
            flight_timeouts: self.inner.flight_timeouts.load(Ordering::Relaxed),
        }
    }

    /// Joins the running resolution for `spec` or starts one. The entry is re-checked
    /// under the in-flight lock since a flight may have finished after the first lookup.
    fn join_or_start(&self, spec: &Arc<MetricSpec>) -> Join {
        let mut in_flight = self.inner.in_flight.lock();
        if let Some(hit) = self.inner.lookup(&spec.name) {
            return Join::Hit(hit);
        }

        if let Some(flight) = in_flight.get(&spec.name) {
            if flight.started.elapsed() < self.inner.config.flight_timeout {
                self.inner.joined.fetch_add(1, Ordering::Relaxed);
                return Join::Wait(flight.future.clone(), flight.started);
            }
            warn!(metric = %spec.name, "replacing expired in-flight marker");
        }

        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        let id = self.inner.next_flight.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let future = Inner::spawn_flight(Arc::clone(&self.inner), Arc::clone(spec), id);
        in_flight.insert(spec.name.clone(), InFlight { id, started, future: future.clone() });
        Join::Wait(future, started)
    }
}

impl Inner {
    fn lookup(&self, name: &str) -> Option<Resolution> {
        let entries = self.entries.read();
        entries.get(name).filter(|e| e.is_live()).map(|e| e.resolution.clone())
    }

    fn last_good(&self, name: &str) -> Option<Resolution> {
        self.entries.read().get(name).and_then(|e| e.last_good.clone())
    }

    /// What a caller gets when it gives up waiting on a flight
    fn fallback_for(&self, spec: &MetricSpec) -> Resolution {
        match self.last_good(&spec.name) {
            Some(previous) if spec.serve_stale => previous.into_stale(),
            _ => Resolution::unavailable(),
        }
    }

    /// Runs the resolution on its own task so it completes (and is cached) even if
    /// every waiter gives up. The marker is cleared on every exit path.
    fn spawn_flight(inner: Arc<Inner>, spec: Arc<MetricSpec>, id: u64) -> Flight {
        let name = spec.name.clone();
        let handle = tokio::spawn(async move {
            let _marker = scopeguard::guard(Arc::clone(&inner), move |inner| inner.finish_flight(&name, id));
            let last_good = inner.last_good(&spec.name);
            let resolution = inner.resolver.resolve_or_stale(&spec, last_good).await;
            inner.store(&spec, resolution.clone());
            resolution
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                warn!(error = %e, "resolution task failed");
                Resolution::unavailable()
            })
        }
        .boxed()
        .shared()
    }

    fn finish_flight(&self, name: &str, id: u64) {
        let mut in_flight = self.in_flight.lock();
        if in_flight.get(name).is_some_and(|f| f.id == id) {
            in_flight.remove(name);
        }
    }

    fn store(&self, spec: &MetricSpec, resolution: Resolution) {
        let ttl = if resolution.is_available() && !resolution.stale {
            spec.effective_ttl()
        } else {
            self.config.negative_ttl
        };

        let mut entries = self.entries.write();
        let last_good = if resolution.is_available() && !resolution.stale {
            Some(resolution.clone())
        } else {
            entries.get(&spec.name).and_then(|e| e.last_good.clone())
        };
        debug!(metric = %spec.name, ttl = ?ttl, available = resolution.is_available(), "caching resolution");
        entries.insert(spec.name.clone(), CacheEntry::new(resolution, ttl, last_good));

        if entries.len() > self.config.max_entries {
            entries.retain(|_, e| e.is_live());
        }
        while entries.len() > self.config.max_entries {
            let oldest = entries
                .iter()
                .filter(|(name, _)| **name != spec.name)
                .min_by_key(|(_, e)| e.stored_at)
                .map(|(name, _)| name.clone());
            match oldest {
                Some(key) => entries.remove(&key),
                None => break,
            };
        }
    }
}

impl std::fmt::Debug for CommandCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandCache").field("stats", &self.stats()).finish()
    }
}
