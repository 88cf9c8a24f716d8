use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Inbound payload could not be turned into a chat event.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed chat payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Chat payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connect to {url} failed: {source}")]
    ConnectFailed {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("Connection to {0} is closed")]
    Closed(String),
}

/// A subscriber callback refused or failed to handle an event.
#[derive(Debug, Error)]
#[error("Listener failed: {message}")]
pub struct ListenerError {
    pub message: String,
}

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<TransportError> for ListenerError {
    fn from(err: TransportError) -> Self {
        Self::new(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Process-level failures: the relay could not be configured or started.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
