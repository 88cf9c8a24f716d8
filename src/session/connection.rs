//! Upstream WebSocket connection abstraction

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::support::errors::TransportError;

/// Lifecycle of the upstream connection.
///
/// `Connecting -> Connected -> Closed`, or `Connecting -> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Closed,
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closed => "closed",
            ConnectionState::Failed => "failed",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Failed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique id of one upstream session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Represents a live WebSocket connection to the remote peer
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    /// Peer URL
    pub peer: String,
    /// Channel drained into the socket by the writer task
    sender: mpsc::UnboundedSender<String>,
    /// When the connection was established
    pub connected_at: DateTime<Utc>,
}

impl Connection {
    pub fn new(peer: impl Into<String>, sender: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id: ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)),
            peer: peer.into(),
            sender,
            connected_at: Utc::now(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a payload for the peer. Never waits for the socket.
    pub fn send(&self, payload: String) -> Result<(), TransportError> {
        self.sender
            .send(payload)
            .map_err(|_| TransportError::Closed(self.peer.clone()))
    }

    /// Whether the writer side is still draining
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_queues_payload() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = Connection::new("ws://peer", tx);

        conn.send("hello".to_string()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "hello");
        assert!(conn.is_open());
    }

    #[test]
    fn send_after_writer_gone_is_closed_error() {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Connection::new("ws://peer", tx);
        drop(rx);

        assert!(!conn.is_open());
        match conn.send("late".to_string()) {
            Err(TransportError::Closed(peer)) => assert_eq!(peer, "ws://peer"),
            other => panic!("expected Closed, got {other:?}"),
        }
    }

    #[test]
    fn each_connection_gets_its_own_id() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let first = Connection::new("ws://peer", tx.clone());
        let second = Connection::new("ws://peer", tx);

        assert_ne!(first.id(), second.id());
        assert_eq!(first.clone().id(), first.id());
    }

    #[test]
    fn state_helpers() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_terminal());
        assert!(ConnectionState::Closed.is_terminal());
        assert!(ConnectionState::Failed.is_terminal());
        assert_eq!(ConnectionState::Failed.to_string(), "failed");
    }
}
