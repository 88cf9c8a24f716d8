//! Upstream session - connection handle, lifecycle state and the adapter that owns them

pub mod adapter;
pub mod connection;

pub use adapter::{ConnectionAdapter, ConnectionSnapshot};
pub use connection::{Connection, ConnectionId, ConnectionState};
