use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Upstream connection and bus overview
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RelayStatusDto {
    /// `connecting`, `connected`, `closed` or `failed`
    pub state: String,
    pub peer: Option<String>,
    pub connected_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Local streams subscribed to inbound chats
    pub inbound_subscribers: usize,
    /// Listeners on the outbound topic (the upstream forwarder)
    pub outbound_listeners: usize,
}
