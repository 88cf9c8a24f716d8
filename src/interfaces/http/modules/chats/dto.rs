//! Chat DTOs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::domain::ChatEvent;

/// Chat to relay to the upstream peer
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SendChatRequest {
    /// Sender handle (up to 64 characters)
    #[validate(length(max = 64))]
    pub handle: Option<String>,
    /// Message body (up to 4096 characters)
    #[validate(length(max = 4096))]
    pub text: Option<String>,
}

impl From<SendChatRequest> for ChatEvent {
    fn from(req: SendChatRequest) -> Self {
        ChatEvent {
            handle: req.handle,
            text: req.text,
        }
    }
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatDto {
    pub handle: Option<String>,
    pub text: Option<String>,
}

impl From<ChatEvent> for ChatDto {
    fn from(event: ChatEvent) -> Self {
        Self {
            handle: event.handle,
            text: event.text,
        }
    }
}
