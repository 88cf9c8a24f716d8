//! API Router with Swagger UI

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::common::ApiResponse;
use super::modules::chats::{self, ChatDto, SendChatRequest};
use super::modules::health::{self, HealthResponse};
use super::modules::metrics::{http_metrics_middleware, prometheus_metrics, MetricsState};
use super::modules::relay::{self as relay_status, RelayStatusDto};
use crate::interfaces::ws::{ws_chats_handler, ChatSocketState};
use crate::relay::SharedRelay;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        chats::ping,
        chats::send_chat,
        relay_status::get_relay_status,
    ),
    components(
        schemas(
            ApiResponse<String>,
            ApiResponse<ChatDto>,
            ApiResponse<RelayStatusDto>,
            HealthResponse,
            SendChatRequest,
            ChatDto,
            RelayStatusDto,
        )
    ),
    tags(
        (name = "Health", description = "Server health check"),
        (name = "Chat", description = "Send chats to the upstream peer"),
        (name = "Relay", description = "Upstream connection status"),
    ),
    info(
        title = "Chat Relay API",
        version = "1.0.0",
        description = "Relays chats between local clients and an upstream WebSocket peer. \
                       Inbound chats are streamed over `GET /api/v1/chats/ws`.",
        license(name = "MIT")
    )
)]
pub struct ApiDoc;

/// Create the API router with all routes.
///
/// `/metrics` is only mounted when a Prometheus recorder handle is given.
pub fn create_api_router(relay: SharedRelay, prometheus: Option<PrometheusHandle>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .with_state(health::HealthState {
            relay: Arc::clone(&relay),
            started_at: Arc::new(Instant::now()),
        });

    let chat_routes = Router::new()
        .route("/ping", get(chats::ping))
        .route("/chats", post(chats::send_chat))
        .with_state(chats::ChatState {
            relay: Arc::clone(&relay),
        });

    // WebSocket upgrade; no body, so it stays out of the OpenAPI paths
    let chat_socket_routes = Router::new()
        .route("/chats/ws", get(ws_chats_handler))
        .with_state(ChatSocketState {
            relay: Arc::clone(&relay),
        });

    let relay_routes = Router::new()
        .route("/relay/status", get(relay_status::get_relay_status))
        .with_state(relay_status::RelayState { relay });

    let swagger_routes = SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi());

    let mut router = Router::new()
        .merge(swagger_routes)
        .merge(health_routes)
        .nest(
            "/api/v1",
            chat_routes.merge(chat_socket_routes).merge(relay_routes),
        );

    if let Some(handle) = prometheus {
        router = router.merge(
            Router::new()
                .route("/metrics", get(prometheus_metrics))
                .with_state(MetricsState { handle }),
        );
    }

    router
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChatEvent;
    use crate::relay::Relay;
    use crate::session::Connection;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tokio::sync::mpsc;
    use tower::Service;

    async fn call(router: Router, req: Request<Body>) -> (StatusCode, Value) {
        let mut svc = router.into_service();
        let resp = svc.call(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn ping_answers_pong() {
        let router = create_api_router(Arc::new(Relay::new()), None);
        let (status, body) = call(router, get_req("/api/v1/ping")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], "pong");
    }

    #[tokio::test]
    async fn health_is_degraded_without_upstream() {
        let router = create_api_router(Arc::new(Relay::new()), None);
        let (status, body) = call(router, get_req("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["upstream"], "connecting");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn send_chat_is_accepted_while_disconnected() {
        let router = create_api_router(Arc::new(Relay::new()), None);
        let (status, body) = call(
            router,
            post_json("/api/v1/chats", r#"{"handle":"alice","text":"hi"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["handle"], "alice");
        assert_eq!(body["data"]["text"], "hi");
    }

    #[tokio::test]
    async fn send_chat_forwards_to_live_connection() {
        let relay = Arc::new(Relay::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        relay.adapter().begin_connecting("ws://peer/");
        relay.adapter().on_connect(Connection::new("ws://peer/".to_string(), tx));

        let router = create_api_router(Arc::clone(&relay), None);
        let (status, _) = call(router, post_json("/api/v1/chats", r#"{"text":"only text"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        let sent = rx.try_recv().expect("payload queued for upstream");
        assert_eq!(ChatEvent::decode(&sent).unwrap().text.as_deref(), Some("only text"));
    }

    #[tokio::test]
    async fn send_chat_rejects_oversized_handle() {
        let router = create_api_router(Arc::new(Relay::new()), None);
        let handle = "h".repeat(65);
        let (status, body) = call(
            router,
            post_json("/api/v1/chats", &format!(r#"{{"handle":"{}"}}"#, handle)),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn send_chat_rejects_malformed_json() {
        let router = create_api_router(Arc::new(Relay::new()), None);
        let (status, _) = call(router, post_json("/api/v1/chats", "not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn relay_status_reports_listeners() {
        let relay = Arc::new(Relay::new());
        let _chats = relay.stream_inbound_chats();
        let router = create_api_router(Arc::clone(&relay), None);

        let (status, body) = call(router, get_req("/api/v1/relay/status")).await;

        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["state"], "connecting");
        assert_eq!(data["inbound_subscribers"], 1);
        assert_eq!(data["outbound_listeners"], 1);
    }

    #[tokio::test]
    async fn openapi_document_lists_chat_routes() {
        let router = create_api_router(Arc::new(Relay::new()), None);
        let (status, body) = call(router, get_req("/api-doc/openapi.json")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/v1/chats"].is_object());
        assert!(body["paths"]["/health"].is_object());
    }

    #[tokio::test]
    async fn metrics_route_absent_without_recorder() {
        let router = create_api_router(Arc::new(Relay::new()), None);
        let (status, _) = call(router, get_req("/metrics")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
