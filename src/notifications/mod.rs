//! In-process pub/sub for chat events
//!
//! - [`Topic`]: listener registry with isolated fan-out
//! - [`EventStream`]: cancellable pull-based subscription on a topic
//!
//! # Usage
//! ```ignore
//! use chat_relay::notifications::{ChatTopic, ChatStream};
//! use chat_relay::domain::ChatEvent;
//!
//! let inbound = ChatTopic::shared("inbound");
//! let mut chats = ChatStream::subscribe(&inbound, 16);
//! inbound.publish(&ChatEvent::new("alice", "hi"));
//! ```

pub mod stream;
pub mod topic;

pub use stream::{EventStream, DEFAULT_STREAM_CAPACITY};
pub use topic::{Listener, SharedTopic, SubscriptionId, Topic};

use crate::domain::ChatEvent;

pub type ChatTopic = Topic<ChatEvent>;
pub type SharedChatTopic = SharedTopic<ChatEvent>;
pub type ChatStream = EventStream<ChatEvent>;
