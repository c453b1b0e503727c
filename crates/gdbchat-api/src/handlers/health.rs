//! Health and metrics handlers.

use std::collections::BTreeMap;

use axum::{extract::State, Json};

use crate::state::AppState;
use crate::types::{HealthResponse, MetricsResponse};

/// GET /api/health - Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.config.uptime_seconds(),
        debugger_running: state.engine.is_running(),
    })
}

/// GET /api/metrics - Provider counters, cache stats and circuit states.
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    let orchestrator = &state.orchestrator;
    let circuits: BTreeMap<String, _> = orchestrator
        .resilience()
        .circuits()
        .states()
        .into_iter()
        .map(|(provider, circuit)| (provider.as_str().to_string(), circuit))
        .collect();

    Json(MetricsResponse {
        providers: orchestrator.metrics().snapshot(),
        cache: orchestrator.cache().stats(),
        circuits,
    })
}
