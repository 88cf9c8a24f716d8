//! WebSocket interfaces
//!
//! - `upstream`: client connection to the remote chat peer
//! - `chat_socket`: inbound chat subscription for local clients

pub mod chat_socket;
pub mod upstream;

pub use chat_socket::{ws_chats_handler, ChatSocketState};
pub use upstream::UpstreamClient;
