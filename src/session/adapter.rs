//! Connection adapter - the only component that touches the upstream socket
//!
//! The transport driver reports every lifecycle event here. Inbound frames are
//! decoded and published to the inbound topic; outbound chats are encoded and
//! queued on the live connection, or dropped when there is none.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::connection::{Connection, ConnectionId, ConnectionState};
use crate::domain::ChatEvent;
use crate::notifications::SharedChatTopic;
use crate::support::errors::{DecodeError, TransportError};

struct Inner {
    state: ConnectionState,
    peer: Option<String>,
    connection: Option<Connection>,
    last_error: Option<String>,
}

/// Point-in-time view of the adapter, used by the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    pub peer: Option<String>,
    pub connected_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

pub struct ConnectionAdapter {
    inbound: SharedChatTopic,
    inner: RwLock<Inner>,
}

impl ConnectionAdapter {
    pub fn new(inbound: SharedChatTopic) -> Self {
        Self {
            inbound,
            inner: RwLock::new(Inner {
                state: ConnectionState::Connecting,
                peer: None,
                connection: None,
                last_error: None,
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.read().state
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        let inner = self.read();
        ConnectionSnapshot {
            state: inner.state,
            peer: inner.peer.clone(),
            connected_at: inner.connection.as_ref().map(|c| c.connected_at),
            last_error: inner.last_error.clone(),
        }
    }

    /// A new connection attempt is starting. Any previous handle is released.
    pub fn begin_connecting(&self, peer: &str) {
        let mut inner = self.write();
        inner.state = ConnectionState::Connecting;
        inner.peer = Some(peer.to_string());
        inner.connection = None;
        debug!("[{}] Connecting to upstream", peer);
    }

    /// The transport is up; the adapter now owns the handle.
    ///
    /// Later lifecycle events must carry this connection's id to be applied.
    pub fn on_connect(&self, connection: Connection) {
        info!("[{}] Upstream connected ({})", connection.peer, connection.id());
        let mut inner = self.write();
        inner.state = ConnectionState::Connected;
        inner.peer = Some(connection.peer.clone());
        inner.connection = Some(connection);
        inner.last_error = None;
    }

    /// The initial connect attempt failed. No retry happens here.
    pub fn on_connect_failed(&self, err: &TransportError) {
        error!("Upstream connect failed: {}", err);
        let mut inner = self.write();
        inner.state = ConnectionState::Failed;
        inner.connection = None;
        inner.last_error = Some(err.to_string());
    }

    /// Decode an inbound frame and publish it. Malformed frames are dropped.
    pub fn on_inbound_message(&self, raw: &str) -> Result<ChatEvent, DecodeError> {
        match ChatEvent::decode(raw) {
            Ok(event) => {
                info!("Chat received from upstream: {}", event);
                metrics::counter!("chat_relay_inbound_total").increment(1);
                self.inbound.publish(&event);
                Ok(event)
            }
            Err(e) => {
                metrics::counter!("chat_relay_decode_errors_total").increment(1);
                warn!("Dropping malformed upstream frame {:?}: {}", raw, e);
                Err(e)
            }
        }
    }

    /// Connection `id` failed. Returns `false` when `id` is not the current
    /// connection, in which case nothing changes.
    pub fn on_connection_error(&self, id: ConnectionId, err: &TransportError) -> bool {
        let applied = self.transition(id, ConnectionState::Failed, Some(err.to_string()));
        if applied {
            error!("Upstream connection error ({}): {}", id, err);
        } else {
            debug!("Ignoring error from stale connection {}: {}", id, err);
        }
        applied
    }

    /// Connection `id` closed. Returns `false` when `id` is not the current
    /// connection, in which case nothing changes.
    pub fn on_connection_close(&self, id: ConnectionId) -> bool {
        let applied = self.transition(id, ConnectionState::Closed, None);
        if applied {
            info!("Upstream connection closed ({})", id);
        } else {
            debug!("Ignoring close from stale connection {}", id);
        }
        applied
    }

    /// Outbound topic listener.
    ///
    /// Returns `Ok(true)` when the chat was queued, `Ok(false)` when it was
    /// dropped because the upstream is not connected.
    pub fn forward_outbound(&self, event: &ChatEvent) -> Result<bool, TransportError> {
        let connection = {
            let inner = self.read();
            match (&inner.state, &inner.connection) {
                (ConnectionState::Connected, Some(connection)) => connection.clone(),
                (state, _) => {
                    metrics::counter!("chat_relay_outbound_dropped_total").increment(1);
                    debug!("Upstream {}, dropping chat: {}", state, event);
                    return Ok(false);
                }
            }
        };

        connection.send(event.encode())?;
        metrics::counter!("chat_relay_outbound_sent_total").increment(1);
        debug!("[{}] Chat queued for upstream: {}", connection.peer, event);
        Ok(true)
    }

    // Only the current connection may end the session. Once it has ended the
    // handle is gone, so a close that follows an error keeps Failed.
    fn transition(&self, id: ConnectionId, next: ConnectionState, error: Option<String>) -> bool {
        let mut inner = self.write();
        if inner.connection.as_ref().map(Connection::id) != Some(id) {
            return false;
        }
        inner.state = next;
        inner.connection = None;
        if error.is_some() {
            inner.last_error = error;
        }
        true
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
