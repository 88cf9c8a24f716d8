//! Chat event and its wire codec
//!
//! The wire form is a JSON object `{"handle": ..., "text": ...}` where both
//! fields are optional strings. Absent fields are omitted when encoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::support::errors::DecodeError;

/// A single chat message exchanged between the peer and local subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    /// Sender handle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    /// Message body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ChatEvent {
    pub fn new(handle: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            handle: Some(handle.into()),
            text: Some(text.into()),
        }
    }

    /// Decode a textual wire payload.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(raw)?;
        // serde would accept a positional array for a struct; the wire form is object-only.
        let kind = match &value {
            Value::Object(_) => return Ok(serde_json::from_value(value)?),
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
        };
        Err(DecodeError::NotAnObject(kind))
    }

    /// Encode into the textual wire payload.
    pub fn encode(&self) -> String {
        // Two optional strings always serialize.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }

    pub fn handle_or_empty(&self) -> &str {
        self.handle.as_deref().unwrap_or("")
    }

    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

impl std::fmt::Display for ChatEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}> {}", self.handle_or_empty(), self.text_or_empty())
    }
}
