//! Health check handler

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::relay::SharedRelay;

/// Health check state
#[derive(Clone)]
pub struct HealthState {
    pub relay: SharedRelay,
    pub started_at: Arc<Instant>,
}

/// Service health response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` while the upstream is connected, `degraded` otherwise
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Upstream connection state
    pub upstream: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<HealthState>) -> Json<HealthResponse> {
    let upstream = state.relay.adapter().state();
    let status = if upstream.is_connected() { "ok" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        upstream: upstream.to_string(),
    })
}
