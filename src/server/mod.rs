//! HTTP surface
//!
//! Thin axum handlers over the engine: `/api/system` and `/api/commands` resolve through
//! the [`CommandCache`], so request bursts share probe executions with the sampler, and
//! `/api/metrics` reads history through the [`QueryEngine`]. Unavailable metrics are
//! reported as data, never as HTTP errors.

mod handlers;
mod types;


use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::cache::CommandCache;
use crate::error::{Error, Result};
use crate::history::HistoryStore;
use crate::query::QueryEngine;
use crate::sampler::SamplerStats;

pub use types::{
    envelopes, BucketView, CommandInfo, CommandResponse, CommandsResponse, Envelope, ErrorResponse, HealthResponse,
    MetricsResponse, SystemResponse,
};

/// Minutes of history served by `/api/metrics` when none are requested
pub const DEFAULT_MINUTES: u64 = 60;

/// Everything the handlers share
pub struct AppState {
    pub cache: CommandCache,
    pub history: HistoryStore,
    pub query: QueryEngine,
    pub sampler: Arc<SamplerStats>,
}

impl AppState {
    pub fn new(cache: CommandCache, history: HistoryStore, query: QueryEngine, sampler: Arc<SamplerStats>) -> Self {
        Self { cache, history, query, sampler }
    }

    async fn metrics_for(&self, minutes: u64) -> MetricsResponse {
        let minutes = self.query.clamp_minutes(minutes);
        let result = self.query.recent(minutes).await;
        MetricsResponse::new(self.cache.registry(), minutes, result)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/system", get(handlers::system))
        .route("/api/metrics", get(handlers::metrics))
        .route("/api/commands", get(handlers::commands))
        .route("/health", get(handlers::health))
        .with_state(Arc::new(state))
}

/// Serves `state` on `listener` until `shutdown` flips to true, then lets in-flight
/// requests finish
pub async fn serve(listener: TcpListener, state: AppState, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    info!(addr = %listener.local_addr()?, "HTTP server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            // a dropped sender also means shut down
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;
    info!("HTTP server stopped");
    Ok(())
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::UnknownMetric(_) => StatusCode::NOT_FOUND,
            Error::InvalidConfig(_) | Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}
