//! Outer surfaces: the REST API and both WebSocket sides of the relay

pub mod http;
pub mod ws;
