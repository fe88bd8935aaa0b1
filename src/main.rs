use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

use host_pulse::cache::CommandCache;
use host_pulse::config::Config;
use host_pulse::core::Reading;
use host_pulse::history::{HistoryOptions, HistoryStore, SqliteStore};
use host_pulse::probe::SystemProbeExecutor;
use host_pulse::query::QueryEngine;
use host_pulse::registry::ProbeRegistry;
use host_pulse::resolver::FallbackResolver;
use host_pulse::sampler::Sampler;
use host_pulse::server::{self, AppState, CommandInfo, CommandResponse, Envelope};

/// Host metrics sampler, cache and history server.
#[derive(Parser)]
#[command(name = "host-pulse", version, about)]
struct Cli {
    /// Path to the YAML configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Logging verbosity level (trace, debug, info, warn, error) or a filter directive.
    /// RUST_LOG takes precedence when set.
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the sampler, history store and HTTP API until SIGINT or SIGTERM.
    Serve,
    /// Print the metric registry as JSON.
    List,
    /// Resolve one metric once and print it.
    Probe {
        /// Metric name, as printed by `list`.
        name: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cli.log_level)
            .with_context(|| format!("invalid log level: {}", cli.log_level))?,
    };
    // stdout carries command output
    fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();

    let cfg = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    let registry = Arc::new(
        ProbeRegistry::with_overrides(cfg.metrics.clone()).context("building the metric registry")?,
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    match cli.command {
        Command::Serve => rt.block_on(serve(cfg, registry)),
        Command::List => list(&registry),
        Command::Probe { name } => rt.block_on(probe(cfg, registry, &name)),
    }
}

fn list(registry: &ProbeRegistry) -> Result<()> {
    let commands: Vec<CommandInfo> = registry.iter().map(|spec| CommandInfo::from(&**spec)).collect();
    println!("{}", serde_json::to_string_pretty(&commands)?);
    Ok(())
}

async fn probe(cfg: Config, registry: Arc<ProbeRegistry>, name: &str) -> Result<()> {
    let spec = registry.spec_for(name)?;
    let resolver = FallbackResolver::new(Arc::new(SystemProbeExecutor::new()), cfg.probes);

    let resolution = resolver.resolve(&spec).await;
    let available = resolution.is_available();
    let resolved_at = resolution.resolved_at;
    let response = CommandResponse {
        command: name.to_string(),
        envelope: Envelope::new(&Reading::from(resolution), &spec.unit),
        resolved_at,
    };
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !available {
        return Err(host_pulse::Error::MetricUnavailable(name.to_string()).into());
    }
    Ok(())
}

async fn serve(cfg: Config, registry: Arc<ProbeRegistry>) -> Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), metrics = registry.len(), "starting host-pulse");

    // the durable tier is required; refuse to start without it
    let store = SqliteStore::open(&cfg.storage.path)
        .await
        .with_context(|| format!("opening history database {}", cfg.storage.path.display()))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (history, history_tasks) =
        HistoryStore::with_store(Arc::new(store.clone()), HistoryOptions::from_config(&cfg), shutdown_rx.clone());

    let resolver = Arc::new(FallbackResolver::new(Arc::new(SystemProbeExecutor::new()), cfg.probes));
    let cache = CommandCache::new(registry, resolver, cfg.cache.clone());

    let sampler = Sampler::new(cache.clone(), history.clone(), cfg.sampler.interval);
    let sampler_stats = sampler.stats();
    let sampler_task = tokio::spawn(sampler.run(shutdown_rx.clone()));

    let listener = TcpListener::bind(cfg.server.listen)
        .await
        .with_context(|| format!("binding {}", cfg.server.listen))?;
    let query = QueryEngine::new(history.clone(), cfg.retention.max_age);
    let state = AppState::new(cache, history, query, sampler_stats);
    let mut server_task = tokio::spawn(server::serve(listener, state, shutdown_rx));

    let mut server_result = None;
    tokio::select! {
        signal = wait_for_signal() => signal?,
        result = &mut server_task => server_result = Some(result),
    }
    let _ = shutdown_tx.send(true);

    let server_result = match server_result {
        Some(result) => result,
        None => server_task.await,
    };
    if let Err(e) = sampler_task.await {
        tracing::warn!(error = %e, "sampler task ended abnormally");
    }
    history_tasks.join().await;
    store.close().await;

    server_result.context("HTTP server task panicked")?.context("HTTP server failed")?;
    tracing::info!("host-pulse stopped");
    Ok(())
}

async fn wait_for_signal() -> Result<()> {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("registering SIGTERM handler")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("listening for SIGINT")?;
            tracing::info!("received SIGINT, shutting down");
        }
        _ = sigterm.recv() => {
            tracing::info!("received SIGTERM, shutting down");
        }
    }
    Ok(())
}
