//! Relay composition
//!
//! Wires the inbound topic, the outbound topic and the [`ConnectionAdapter`]
//! together once, and exposes the two entry points used by the request API:
//! [`Relay::submit_local_chat`] and [`Relay::stream_inbound_chats`].

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::ChatEvent;
use crate::notifications::{
    ChatStream, ChatTopic, SharedChatTopic, SubscriptionId, DEFAULT_STREAM_CAPACITY,
};
use crate::session::ConnectionAdapter;
use crate::support::errors::ListenerError;

pub struct Relay {
    inbound: SharedChatTopic,
    outbound: SharedChatTopic,
    adapter: Arc<ConnectionAdapter>,
    forwarder: SubscriptionId,
    stream_capacity: usize,
}

/// Shared relay type
pub type SharedRelay = Arc<Relay>;

impl Relay {
    pub fn new() -> Self {
        Self::with_stream_capacity(DEFAULT_STREAM_CAPACITY)
    }

    /// Build the relay with a custom per-subscriber buffer size
    pub fn with_stream_capacity(stream_capacity: usize) -> Self {
        let inbound = ChatTopic::shared("inbound");
        let outbound = ChatTopic::shared("outbound");
        let adapter = Arc::new(ConnectionAdapter::new(Arc::clone(&inbound)));

        let forward = Arc::clone(&adapter);
        let forwarder = outbound.subscribe(move |event: &ChatEvent| {
            forward
                .forward_outbound(event)
                .map(|_| ())
                .map_err(ListenerError::from)
        });

        info!("Relay wired (stream capacity {})", stream_capacity);

        Self {
            inbound,
            outbound,
            adapter,
            forwarder,
            stream_capacity,
        }
    }

    /// Hand a locally produced chat to the upstream and return it unchanged.
    ///
    /// Local inbound subscribers do not see it unless the peer echoes it back.
    pub fn submit_local_chat(&self, event: ChatEvent) -> ChatEvent {
        debug!("Local chat submitted: {}", event);
        self.outbound.publish(&event);
        event
    }

    /// Subscribe to chats arriving from the upstream from this point on.
    pub fn stream_inbound_chats(&self) -> ChatStream {
        ChatStream::subscribe(&self.inbound, self.stream_capacity)
    }

    pub fn adapter(&self) -> &Arc<ConnectionAdapter> {
        &self.adapter
    }

    pub fn inbound(&self) -> &SharedChatTopic {
        &self.inbound
    }

    pub fn outbound(&self) -> &SharedChatTopic {
        &self.outbound
    }

    /// Id of the adapter's listener on the outbound topic
    pub fn forwarder(&self) -> SubscriptionId {
        self.forwarder
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}
