//! Single-topic publish/subscribe registry
//!
//! A [`Topic`] holds the listeners registered for one event stream and fans
//! every published event out to them in registration order. There is no
//! queue: an event published while nobody listens is dropped, and a listener
//! registered after a publish never sees that event.
//!
//! Registration and removal take the write lock. Publishing clones a snapshot
//! of the listener set under the read lock and delivers with no lock held, so
//! a listener may subscribe or unsubscribe from inside its own callback.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, info, warn};

use crate::support::errors::ListenerError;

/// Delivery callback stored in a topic.
pub type Listener<E> = Arc<dyn Fn(&E) -> Result<(), ListenerError> + Send + Sync>;

/// Handle returned by [`Topic::subscribe`]; ids grow monotonically per topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

pub struct Topic<E> {
    name: &'static str,
    listeners: RwLock<BTreeMap<SubscriptionId, Listener<E>>>,
    next_id: AtomicU64,
}

/// Shared topic type
pub type SharedTopic<E> = Arc<Topic<E>>;

impl<E: 'static> Topic<E> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a topic behind an `Arc`
    pub fn shared(name: &'static str) -> SharedTopic<E> {
        Arc::new(Self::new(name))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register a listener. Every call yields a fresh id, even for the same callback.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&E) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let count = {
            let mut listeners = self.write();
            listeners.insert(id, Arc::new(listener));
            listeners.len()
        };
        info!("[{}] Listener {} subscribed ({} total)", self.name, id, count);
        id
    }

    /// Remove a listener. Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let (removed, count) = {
            let mut listeners = self.write();
            let removed = listeners.remove(&id).is_some();
            (removed, listeners.len())
        };
        if removed {
            info!("[{}] Listener {} unsubscribed ({} remaining)", self.name, id, count);
        }
        removed
    }

    /// Deliver `event` to every listener registered right now.
    ///
    /// Returns the number of listeners the event was offered to. A listener
    /// that fails or panics is reported and skipped; the rest still run.
    pub fn publish(&self, event: &E) -> usize {
        let snapshot: Vec<(SubscriptionId, Listener<E>)> = self
            .read()
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        if snapshot.is_empty() {
            debug!("[{}] Event published (no subscribers)", self.name);
            return 0;
        }

        for (id, listener) in &snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    metrics::counter!("chat_relay_listener_failures_total", "topic" => self.name)
                        .increment(1);
                    warn!("[{}] Listener {} failed: {}", self.name, id, e);
                }
                Err(panic) => {
                    metrics::counter!("chat_relay_listener_failures_total", "topic" => self.name)
                        .increment(1);
                    error!(
                        "[{}] Listener {} panicked: {}",
                        self.name,
                        id,
                        panic_message(panic.as_ref())
                    );
                }
            }
        }

        debug!("[{}] Event published to {} listeners", self.name, snapshot.len());
        snapshot.len()
    }

    pub fn listener_count(&self) -> usize {
        self.read().len()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<SubscriptionId, Listener<E>>> {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<SubscriptionId, Listener<E>>> {
        self.listeners.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E> fmt::Debug for Topic<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
