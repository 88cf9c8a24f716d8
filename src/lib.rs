//! # Chat Relay
//!
//! Relays chat messages between one upstream WebSocket peer and any number
//! of local clients.
//!
//! ## Architecture
//!
//! - **domain**: the `ChatEvent` record and its wire encoding
//! - **notifications**: single-topic pub/sub used for the inbound and outbound buses
//! - **session**: the connection adapter, sole owner of the upstream socket
//! - **relay**: wiring of both buses and the adapter
//! - **interfaces**: upstream WebSocket client, REST API and chat subscription socket
//! - **server**: process lifecycle (startup, tracing, graceful shutdown)

pub mod config;
pub mod domain;
pub mod interfaces;
pub mod notifications;
pub mod relay;
pub mod server;
pub mod session;
pub mod support;

pub use config::{default_config_path, AppConfig};
pub use domain::ChatEvent;
pub use interfaces::http::create_api_router;
pub use notifications::{ChatStream, ChatTopic, SharedChatTopic, SubscriptionId};
pub use relay::{Relay, SharedRelay};
pub use session::{ConnectionAdapter, ConnectionState};
pub use support::errors::{ConfigError, DecodeError, ListenerError, RelayError, TransportError};
