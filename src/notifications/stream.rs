//! Pull-based subscription on top of a [`Topic`]
//!
//! An [`EventStream`] registers a listener that copies every published event
//! into a bounded channel. The stream never ends on its own; it stops when it
//! is cancelled or dropped, which removes the listener before returning.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use super::topic::{SharedTopic, SubscriptionId};
use crate::support::errors::ListenerError;

/// Default per-subscriber buffer
pub const DEFAULT_STREAM_CAPACITY: usize = 256;

pub struct EventStream<E: 'static> {
    topic: SharedTopic<E>,
    subscription: Option<SubscriptionId>,
    receiver: mpsc::Receiver<E>,
}

impl<E: Clone + Send + 'static> EventStream<E> {
    /// Subscribe to `topic`. Only events published after this call are seen.
    ///
    /// A subscriber that falls `capacity` events behind loses the overflow;
    /// the topic reports each loss as a listener failure.
    pub fn subscribe(topic: &SharedTopic<E>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let subscription = topic.subscribe(move |event: &E| match sender.try_send(event.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                Err(ListenerError::new("subscriber is lagging, event dropped"))
            }
            Err(TrySendError::Closed(_)) => Err(ListenerError::new("subscriber is gone")),
        });

        Self {
            topic: Arc::clone(topic),
            subscription: Some(subscription),
            receiver,
        }
    }
}

impl<E: 'static> EventStream<E> {
    /// Wait for the next event
    pub async fn recv(&mut self) -> Option<E> {
        self.receiver.recv().await
    }

    /// Take an already delivered event without waiting
    pub fn try_recv(&mut self) -> Option<E> {
        self.receiver.try_recv().ok()
    }

    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    /// Stop the subscription. The listener is gone when this returns.
    pub fn cancel(mut self) {
        self.unsubscribe();
    }

    fn unsubscribe(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.topic.unsubscribe(id);
            debug!("[{}] Stream {} cancelled", self.topic.name(), id);
        }
    }
}

impl<E: 'static> Stream for EventStream<E> {
    type Item = E;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<E>> {
        self.receiver.poll_recv(cx)
    }
}

impl<E: 'static> Drop for EventStream<E> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
