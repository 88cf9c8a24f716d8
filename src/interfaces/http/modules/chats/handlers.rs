//! Chat handlers

use axum::{extract::State, Json};

use super::dto::{ChatDto, SendChatRequest};
use crate::interfaces::http::common::{ApiResponse, ValidatedJson};
use crate::relay::SharedRelay;

#[derive(Clone)]
pub struct ChatState {
    pub relay: SharedRelay,
}

/// Liveness probe for API clients
#[utoipa::path(
    get,
    path = "/api/v1/ping",
    tag = "Chat",
    responses(
        (status = 200, description = "Always `pong`", body = ApiResponse<String>)
    )
)]
pub async fn ping() -> Json<ApiResponse<String>> {
    Json(ApiResponse::success("pong".to_string()))
}

/// Send a chat to the upstream peer
///
/// The chat is accepted for relay and echoed back. It is dropped silently
/// when the upstream is not connected; local subscribers only see it if the
/// peer sends it back.
#[utoipa::path(
    post,
    path = "/api/v1/chats",
    tag = "Chat",
    request_body = SendChatRequest,
    responses(
        (status = 200, description = "Chat accepted for relay", body = ApiResponse<ChatDto>),
        (status = 400, description = "Malformed JSON"),
        (status = 422, description = "Handle or text too long")
    )
)]
pub async fn send_chat(
    State(state): State<ChatState>,
    ValidatedJson(request): ValidatedJson<SendChatRequest>,
) -> Json<ApiResponse<ChatDto>> {
    let accepted = state.relay.submit_local_chat(request.into());
    Json(ApiResponse::success(accepted.into()))
}
