use std::path::Path;
use std::sync::Arc;

use axum::Router;
use host_pulse::cache::CommandCache;
use host_pulse::config::Config;
use host_pulse::history::{HistoryOptions, HistoryStore, HistoryTasks, SqliteStore};
use host_pulse::probe::SystemProbeExecutor;
use host_pulse::query::QueryEngine;
use host_pulse::registry::{MetricSpec, ProbeRegistry};
use host_pulse::resolver::FallbackResolver;
use host_pulse::sampler::SamplerStats;
use host_pulse::server::{router, AppState};
use host_pulse::traits::ProbeExecutor;
use tokio::sync::watch;

/// Wires registry, resolver, cache, history and query the way the binary does
pub struct TestEngineBuilder {
    metrics: Vec<MetricSpec>,
    executor: Arc<dyn ProbeExecutor>,
    config: Config,
}

pub struct TestEngine {
    pub cache: CommandCache,
    pub history: HistoryStore,
    pub query: QueryEngine,
    pub config: Config,
}

/// A durable engine plus the handles needed to stop it
pub struct DurableEngine {
    pub engine: TestEngine,
    pub store: SqliteStore,
    pub shutdown: watch::Sender<bool>,
    pub tasks: HistoryTasks,
}

impl Default for TestEngineBuilder {
    fn default() -> Self {
        Self { metrics: Vec::new(), executor: Arc::new(SystemProbeExecutor::new()), config: Config::default() }
    }
}

impl TestEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metric(mut self, spec: MetricSpec) -> Self {
        self.metrics.push(spec);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn ProbeExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn configure(mut self, f: impl FnOnce(&mut Config)) -> Self {
        f(&mut self.config);
        self
    }

    fn cache(&self) -> CommandCache {
        let registry = Arc::new(ProbeRegistry::new(self.metrics.clone()).unwrap());
        let resolver = Arc::new(FallbackResolver::new(Arc::clone(&self.executor), self.config.probes));
        CommandCache::new(registry, resolver, self.config.cache.clone())
    }

    pub fn build_in_memory(self) -> TestEngine {
        let cache = self.cache();
        let history = HistoryStore::in_memory(self.config.retention.max_points);
        let query = QueryEngine::new(history.clone(), self.config.retention.max_age);
        TestEngine { cache, history, query, config: self.config }
    }

    pub async fn build_durable(self, path: &Path) -> DurableEngine {
        let cache = self.cache();
        let store = SqliteStore::open(path).await.unwrap();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (history, tasks) =
            HistoryStore::with_store(Arc::new(store.clone()), HistoryOptions::from_config(&self.config), shutdown_rx);
        let query = QueryEngine::new(history.clone(), self.config.retention.max_age);
        DurableEngine { engine: TestEngine { cache, history, query, config: self.config }, store, shutdown, tasks }
    }
}

impl TestEngine {
    pub fn router(&self) -> Router {
        router(AppState::new(
            self.cache.clone(),
            self.history.clone(),
            self.query.clone(),
            Arc::new(SamplerStats::default()),
        ))
    }
}
