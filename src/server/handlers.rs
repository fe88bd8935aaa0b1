use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json, Response};
use tracing::debug;

use super::types::{
    CommandInfo, CommandParams, CommandResponse, CommandsResponse, Envelope, HealthResponse, MetricsParams,
    MetricsResponse, SystemParams, SystemResponse,
};
use super::{AppState, DEFAULT_MINUTES};
use crate::core::metrics::Reading;
use crate::error::{Error, Result};
use crate::sampler::collect_sample;

/// Unwraps query parameters, turning axum's plain-text rejection into a JSON error
fn query_params<T>(query: std::result::Result<Query<T>, QueryRejection>) -> Result<T> {
    query.map(|Query(params)| params).map_err(|rejection| Error::invalid_request(rejection.body_text()))
}

pub(super) async fn system(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<SystemParams>, QueryRejection>,
) -> Result<Json<SystemResponse>> {
    let params = query_params(query)?;
    let sample = collect_sample(&state.cache).await;
    let mut response = SystemResponse::new(state.cache.registry(), &sample);
    if let Some(minutes) = params.history {
        response.history = Some(state.metrics_for(minutes).await);
    }
    Ok(Json(response))
}

pub(super) async fn metrics(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<MetricsParams>, QueryRejection>,
) -> Result<Json<MetricsResponse>> {
    let minutes = query_params(query)?.minutes.unwrap_or(DEFAULT_MINUTES);
    Ok(Json(state.metrics_for(minutes).await))
}

/// Lists the registry, or resolves one metric on demand when `command` is given
pub(super) async fn commands(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<CommandParams>, QueryRejection>,
) -> Result<Response> {
    let Some(name) = query_params(query)?.command else {
        let commands: Vec<CommandInfo> = state.cache.registry().iter().map(|spec| CommandInfo::from(&**spec)).collect();
        let total = commands.len();
        return Ok(Json(CommandsResponse { commands, total }).into_response());
    };

    debug!(command = %name, "on-demand resolution");
    let spec = state.cache.registry().spec_for(&name)?;
    let resolution = state.cache.get_or_resolve(&name).await?;
    let resolved_at = resolution.resolved_at;
    let envelope = Envelope::new(&Reading::from(resolution), &spec.unit);
    Ok(Json(CommandResponse { command: name, envelope, resolved_at }).into_response())
}

pub(super) async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let history = state.history.stats();
    let status = if history.persistence.last_error.is_some() { "degraded" } else { "ok" };
    Json(HealthResponse { status, sampler: state.sampler.snapshot(), history, cache: state.cache.stats() })
}
