//! Upstream WebSocket client
//!
//! Drives the connection to the remote chat peer and reports every lifecycle
//! event to the [`ConnectionAdapter`]. Outbound payloads flow through an
//! unbounded channel into a writer task, so queuing a send never waits on the
//! socket.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::config::UpstreamConfig;
use crate::session::{Connection, ConnectionAdapter};
use crate::support::errors::TransportError;
use crate::support::shutdown::ShutdownSignal;

/// How long the writer gets to flush and send its close frame
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Closed,
    Failed,
    ShutDown,
}

pub struct UpstreamClient {
    config: UpstreamConfig,
    adapter: Arc<ConnectionAdapter>,
    shutdown_signal: Option<ShutdownSignal>,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig, adapter: Arc<ConnectionAdapter>) -> Self {
        Self {
            config,
            adapter,
            shutdown_signal: None,
        }
    }

    /// Set the shutdown signal for graceful shutdown
    pub fn with_shutdown(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown_signal = Some(signal);
        self
    }

    /// Connect and relay until the connection ends.
    ///
    /// With `reconnect` enabled, further attempts follow the configured
    /// backoff until it is exhausted or shutdown is triggered.
    pub async fn run(&self) {
        let mut backoff = self.config.backoff();

        loop {
            match self.connect_once().await {
                Ok(SessionEnd::ShutDown) => return,
                Ok(SessionEnd::Closed | SessionEnd::Failed) => backoff.reset(),
                Err(_) => {}
            }

            if !self.config.reconnect {
                info!("[{}] Reconnect disabled, upstream client stopped", self.config.url);
                return;
            }

            let Some(delay) = backoff.next_delay() else {
                error!(
                    "[{}] Max reconnection attempts ({}) reached, giving up",
                    self.config.url,
                    backoff.attempts()
                );
                return;
            };

            info!(
                "[{}] Reconnecting to upstream in {}ms (attempt {})",
                self.config.url,
                delay.as_millis(),
                backoff.attempts()
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = wait_for_shutdown(self.shutdown_signal.as_ref()) => {
                    info!("🛑 Upstream client received shutdown signal");
                    return;
                }
            }
        }
    }

    async fn connect_once(&self) -> Result<SessionEnd, TransportError> {
        let url = self.config.url.clone();
        self.adapter.begin_connecting(&url);

        let ws_stream = match connect_async(url.as_str()).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(source) => {
                let err = TransportError::ConnectFailed { url, source };
                self.adapter.on_connect_failed(&err);
                return Err(err);
            }
        };

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let connection = Connection::new(url.clone(), tx);
        let id = connection.id();
        self.adapter.on_connect(connection);

        // Outgoing message writer task; ends when the adapter releases the handle
        let writer_adapter = Arc::clone(&self.adapter);
        let writer_url = url.clone();
        let mut writer = tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                debug!("[{}] -> {}", writer_url, payload);
                if let Err(e) = ws_sender.send(Message::Text(payload)).await {
                    writer_adapter.on_connection_error(id, &TransportError::WebSocket(e));
                    return;
                }
            }
            let _ = ws_sender.close().await;
        });

        let end = loop {
            let next = tokio::select! {
                msg = ws_receiver.next() => msg,
                _ = wait_for_shutdown(self.shutdown_signal.as_ref()) => {
                    info!("[{}] Closing upstream connection due to shutdown", url);
                    self.adapter.on_connection_close(id);
                    break SessionEnd::ShutDown;
                }
            };

            match next {
                Some(Ok(Message::Text(text))) => {
                    // Decode failures are reported by the adapter and dropped.
                    let _ = self.adapter.on_inbound_message(&text);
                }
                Some(Ok(Message::Binary(data))) => {
                    warn!("[{}] Binary frame ({} bytes) ignored", url, data.len());
                }
                Some(Ok(Message::Close(frame))) => {
                    info!("[{}] Close frame received: {:?}", url, frame);
                    self.adapter.on_connection_close(id);
                    break SessionEnd::Closed;
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Err(e)) => {
                    self.adapter.on_connection_error(id, &TransportError::WebSocket(e));
                    break SessionEnd::Failed;
                }
                None => {
                    self.adapter.on_connection_close(id);
                    break SessionEnd::Closed;
                }
            }
        };

        // An unfinished writer must not outlive its session
        if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
            warn!("[{}] Writer task did not finish in time, aborting it", url);
            writer.abort();
        }

        Ok(end)
    }
}

async fn wait_for_shutdown(signal: Option<&ShutdownSignal>) {
    match signal {
        Some(signal) => signal.wait().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChatEvent;
    use crate::relay::Relay;
    use crate::session::ConnectionState;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    fn config_for(addr: std::net::SocketAddr) -> UpstreamConfig {
        UpstreamConfig {
            url: format!("ws://{}/", addr),
            initial_delay_ms: 10,
            max_delay_ms: 20,
            ..UpstreamConfig::default()
        }
    }

    async fn refused_addr() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    }

    #[tokio::test]
    async fn relays_chats_in_both_directions() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let relay = Arc::new(Relay::new());
        let mut chats = relay.stream_inbound_chats();

        let client = UpstreamClient::new(
            config_for(listener.local_addr().unwrap()),
            Arc::clone(relay.adapter()),
        );
        let client_task = tokio::spawn(async move { client.run().await });

        let (stream, _) = listener.accept().await.unwrap();
        let mut peer = tokio_tungstenite::accept_async(stream).await.unwrap();

        peer.send(Message::Text(r#"{"handle":"alice","text":"hi"}"#.to_string()))
            .await
            .unwrap();
        let got = timeout(WAIT, chats.recv()).await.expect("Timeout");
        assert_eq!(got, Some(ChatEvent::new("alice", "hi")));
        assert!(relay.adapter().is_connected());

        let returned = relay.submit_local_chat(ChatEvent::new("bob", "yo"));
        assert_eq!(returned, ChatEvent::new("bob", "yo"));
        let frame = timeout(WAIT, peer.next()).await.expect("Timeout").unwrap().unwrap();
        assert_eq!(frame, Message::Text(ChatEvent::new("bob", "yo").encode()));

        peer.send(Message::Text("garbage".to_string())).await.unwrap();
        peer.send(Message::Text(r#"{"handle":"alice","text":"again"}"#.to_string()))
            .await
            .unwrap();
        let got = timeout(WAIT, chats.recv()).await.expect("Timeout");
        assert_eq!(got, Some(ChatEvent::new("alice", "again")));

        peer.close(None).await.unwrap();
        timeout(WAIT, client_task).await.expect("Timeout").unwrap();
        assert_eq!(relay.adapter().state(), ConnectionState::Closed);

        relay.submit_local_chat(ChatEvent::new("bob", "lost"));
        assert_eq!(chats.try_recv(), None);
    }

    #[tokio::test]
    async fn connect_failure_leaves_adapter_failed() {
        let relay = Relay::new();
        let client = UpstreamClient::new(config_for(refused_addr().await), Arc::clone(relay.adapter()));

        timeout(WAIT, client.run()).await.expect("Timeout");

        let snapshot = relay.adapter().snapshot();
        assert_eq!(snapshot.state, ConnectionState::Failed);
        assert!(snapshot.last_error.is_some());
    }

    #[tokio::test]
    async fn reconnect_gives_up_after_max_attempts() {
        let relay = Relay::new();
        let config = UpstreamConfig {
            reconnect: true,
            max_attempts: 3,
            ..config_for(refused_addr().await)
        };
        let client = UpstreamClient::new(config, Arc::clone(relay.adapter()));

        timeout(WAIT, client.run()).await.expect("Timeout");
        assert_eq!(relay.adapter().state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn shutdown_closes_live_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let relay = Relay::new();
        let shutdown = ShutdownSignal::new();
        let config = UpstreamConfig {
            reconnect: true,
            ..config_for(listener.local_addr().unwrap())
        };

        let client = UpstreamClient::new(config, Arc::clone(relay.adapter()))
            .with_shutdown(shutdown.clone());
        let client_task = tokio::spawn(async move { client.run().await });

        let (stream, _) = listener.accept().await.unwrap();
        let mut peer = tokio_tungstenite::accept_async(stream).await.unwrap();

        // A ping round trip proves the client finished its handshake side.
        peer.send(Message::Ping(Vec::new())).await.unwrap();
        let pong = timeout(WAIT, peer.next()).await.expect("Timeout").unwrap().unwrap();
        assert!(matches!(pong, Message::Pong(_)));
        assert!(relay.adapter().is_connected());

        shutdown.trigger();
        timeout(WAIT, client_task).await.expect("Timeout").unwrap();
        assert_eq!(relay.adapter().state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn reconnected_session_keeps_relaying_after_old_one_ends() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let relay = Arc::new(Relay::new());
        let shutdown = ShutdownSignal::new();
        let config = UpstreamConfig {
            reconnect: true,
            ..config_for(listener.local_addr().unwrap())
        };

        let client = UpstreamClient::new(config, Arc::clone(relay.adapter()))
            .with_shutdown(shutdown.clone());
        let client_task = tokio::spawn(async move { client.run().await });

        let (stream, _) = listener.accept().await.unwrap();
        let mut first = tokio_tungstenite::accept_async(stream).await.unwrap();
        first.close(None).await.unwrap();

        let (stream, _) = timeout(WAIT, listener.accept()).await.expect("Timeout").unwrap();
        let mut second = tokio_tungstenite::accept_async(stream).await.unwrap();

        timeout(WAIT, async {
            while !relay.adapter().is_connected() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("Timeout");

        relay.submit_local_chat(ChatEvent::new("bob", "still here"));
        let frame = timeout(WAIT, second.next()).await.expect("Timeout").unwrap().unwrap();
        assert_eq!(frame, Message::Text(ChatEvent::new("bob", "still here").encode()));

        shutdown.trigger();
        timeout(WAIT, client_task).await.expect("Timeout").unwrap();
    }
}
