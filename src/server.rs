//! Reusable chat relay server runtime.
//!
//! [`ServerHandle`] owns the full lifecycle: metrics recorder, relay wiring,
//! upstream client, REST API and graceful shutdown. The CLI binary is a thin
//! wrapper around it.

use std::sync::{Arc, OnceLock};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::interfaces::http::create_api_router;
use crate::interfaces::ws::UpstreamClient;
use crate::relay::{Relay, SharedRelay};
use crate::support::errors::RelayError;
use crate::support::shutdown::{ShutdownCoordinator, ShutdownSignal};

// ── Options ────────────────────────────────────────────────────────

/// Options for starting the relay.
#[derive(Default)]
pub struct ServerOptions {
    pub config: AppConfig,
}

// ── ServerHandle ───────────────────────────────────────────────────

/// Handle to a running relay.
///
/// ```rust,no_run
/// use chat_relay::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     handle.install_signal_handler();
///     handle.shutdown_signal().wait().await;
///     handle.wait().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    /// The wired buses and upstream adapter.
    pub relay: SharedRelay,
    /// The configuration the server was started with.
    pub config: AppConfig,
    /// Port the REST API is actually bound to.
    pub api_port: u16,

    shutdown: ShutdownCoordinator,
    upstream_task: tokio::task::JoinHandle<()>,
    api_task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Start the relay: wire the buses, dial the upstream and serve the API.
    pub async fn start(opts: ServerOptions) -> Result<Self, RelayError> {
        let app_cfg = opts.config;

        info!("Starting chat relay...");

        let prometheus_handle = prometheus_handle();

        let relay: SharedRelay = Arc::new(Relay::with_stream_capacity(app_cfg.relay.stream_buffer));

        let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
        let shutdown_signal = shutdown.signal();

        // ── REST API server ────────────────────────────────────
        let api_router = create_api_router(Arc::clone(&relay), prometheus_handle);

        let api_addr = app_cfg.server.address();
        let listener = tokio::net::TcpListener::bind(&api_addr).await?;
        let api_port = listener.local_addr()?.port();
        info!("REST API server listening on http://{}", listener.local_addr()?);
        info!("Swagger UI available at http://{}/docs/", listener.local_addr()?);

        let api_shutdown = shutdown_signal.clone();
        let api_server = axum::serve(
            listener,
            api_router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            api_shutdown.wait().await;
            info!("🛑 REST API server received shutdown signal");
        });

        let api_task = tokio::spawn(async move {
            if let Err(e) = api_server.await {
                error!("REST API server error: {}", e);
            }
        });

        // ── Upstream client ────────────────────────────────────
        info!(
            "Dialing upstream {} (reconnect: {})",
            app_cfg.upstream.url, app_cfg.upstream.reconnect
        );
        let upstream = UpstreamClient::new(app_cfg.upstream.clone(), Arc::clone(relay.adapter()))
            .with_shutdown(shutdown_signal);
        let upstream_task = tokio::spawn(async move { upstream.run().await });

        info!("🚀 Chat relay started.");

        Ok(Self {
            relay,
            config: app_cfg,
            api_port,
            shutdown,
            upstream_task,
            api_task,
        })
    }

    /// Get a cloneable shutdown signal.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    /// Trigger graceful shutdown without waiting for it.
    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for the API server and the upstream client to stop, bounded by
    /// the configured shutdown timeout.
    pub async fn wait(self) {
        info!("⏳ Waiting for server tasks to complete...");

        let tasks = async {
            match self.api_task.await {
                Ok(()) => info!("REST API server stopped"),
                Err(e) => error!("REST API server task panicked: {}", e),
            }
            match self.upstream_task.await {
                Ok(()) => info!("Upstream client stopped"),
                Err(e) => error!("Upstream client task panicked: {}", e),
            }
        };

        if tokio::time::timeout(self.shutdown.timeout(), tasks).await.is_err() {
            warn!(
                "Shutdown timed out after {}s, abandoning remaining tasks",
                self.shutdown.timeout().as_secs()
            );
        }

        info!("👋 Chat relay shutdown complete");
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        info!("🛑 Shutting down chat relay...");
        self.trigger_shutdown();
        self.wait().await;
    }

    /// Check if any server task is still running.
    pub fn is_running(&self) -> bool {
        !self.upstream_task.is_finished() || !self.api_task.is_finished()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// The global recorder can only be installed once per process, so restarts
/// within the same process reuse the first handle.
fn prometheus_handle() -> Option<PrometheusHandle> {
    static PROM_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

    PROM_HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                info!("📊 Prometheus metrics recorder installed");
                Some(handle)
            }
            Err(e) => {
                warn!("Prometheus recorder unavailable, /metrics disabled: {}", e);
                None
            }
        })
        .clone()
}

/// Initialize tracing (logging) from the application config.
///
/// `RUST_LOG` takes precedence over `logging.level`. Call once at startup,
/// before [`ServerHandle::start`].
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ServerConfig, UpstreamConfig};
    use crate::domain::ChatEvent;
    use crate::session::ConnectionState;
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::Message;

    const WAIT: Duration = Duration::from_secs(5);

    fn config_with_upstream(url: String) -> AppConfig {
        AppConfig {
            server: ServerConfig {
                api_host: "127.0.0.1".to_string(),
                api_port: 0,
                shutdown_timeout: 5,
            },
            upstream: UpstreamConfig {
                url,
                ..UpstreamConfig::default()
            },
            ..AppConfig::default()
        }
    }

    async fn http_get(port: u16, path: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        timeout(WAIT, async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("Timeout");
    }

    #[tokio::test]
    async fn serves_health_and_shuts_down_without_upstream() {
        let refused = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/", refused.local_addr().unwrap());
        drop(refused);

        let handle = ServerHandle::start(ServerOptions {
            config: config_with_upstream(url),
        })
        .await
        .unwrap();

        let relay = Arc::clone(&handle.relay);
        wait_until(|| relay.adapter().state() == ConnectionState::Failed).await;

        let response = http_get(handle.api_port, "/health").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("\"degraded\""));

        timeout(WAIT, handle.shutdown()).await.expect("Timeout");
    }

    #[tokio::test]
    async fn relays_upstream_chats_to_websocket_subscribers() {
        let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/", upstream.local_addr().unwrap());

        let handle = ServerHandle::start(ServerOptions {
            config: config_with_upstream(url),
        })
        .await
        .unwrap();

        let (stream, _) = timeout(WAIT, upstream.accept()).await.expect("Timeout").unwrap();
        let mut peer = tokio_tungstenite::accept_async(stream).await.unwrap();

        let subscriber_url = format!("ws://127.0.0.1:{}/api/v1/chats/ws", handle.api_port);
        let (mut subscriber, _) = tokio_tungstenite::connect_async(subscriber_url).await.unwrap();

        let relay = Arc::clone(&handle.relay);
        wait_until(|| relay.inbound().listener_count() == 1 && relay.adapter().is_connected()).await;

        peer.send(Message::Text(ChatEvent::new("alice", "hello").encode()))
            .await
            .unwrap();

        let frame = timeout(WAIT, subscriber.next())
            .await
            .expect("Timeout")
            .unwrap()
            .unwrap();
        let Message::Text(text) = frame else {
            panic!("expected a text frame, got {:?}", frame);
        };
        assert_eq!(ChatEvent::decode(&text).unwrap(), ChatEvent::new("alice", "hello"));

        subscriber.close(None).await.unwrap();
        wait_until(|| relay.inbound().listener_count() == 0).await;

        timeout(WAIT, handle.shutdown()).await.expect("Timeout");
    }
}
