use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body returned by the backend on non-success responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown realtime event: {0}")]
    UnknownEvent(String),
    #[error("invalid payload for realtime event {event}: {source}")]
    InvalidPayload {
        event: String,
        source: serde_json::Error,
    },
}
