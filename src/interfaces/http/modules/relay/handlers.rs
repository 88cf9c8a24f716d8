use axum::{extract::State, Json};

use super::dto::RelayStatusDto;
use crate::interfaces::http::common::ApiResponse;
use crate::relay::SharedRelay;

#[derive(Clone)]
pub struct RelayState {
    pub relay: SharedRelay,
}

/// Upstream connection status
#[utoipa::path(
    get,
    path = "/api/v1/relay/status",
    tag = "Relay",
    responses(
        (status = 200, description = "Current relay status", body = ApiResponse<RelayStatusDto>)
    )
)]
pub async fn get_relay_status(State(state): State<RelayState>) -> Json<ApiResponse<RelayStatusDto>> {
    let snapshot = state.relay.adapter().snapshot();
    Json(ApiResponse::success(RelayStatusDto {
        state: snapshot.state.to_string(),
        peer: snapshot.peer,
        connected_at: snapshot.connected_at,
        last_error: snapshot.last_error,
        inbound_subscribers: state.relay.inbound().listener_count(),
        outbound_listeners: state.relay.outbound().listener_count(),
    }))
}
