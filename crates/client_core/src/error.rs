use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The backend answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid response payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Validation(String),
    #[error("not signed in")]
    NotAuthenticated,
    #[error("no contact selected")]
    NoContactSelected,
    #[error("realtime channel error: {0}")]
    Realtime(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        matches!(self, ClientError::NotAuthenticated) || self.status() == Some(401)
    }

    /// Text suitable for a transient notification.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Api { message, .. } | ClientError::Validation(message) => message.clone(),
            ClientError::Transport(err) if err.is_connect() || err.is_timeout() => {
                "Server unreachable; check your connection and retry.".to_string()
            }
            other => other.to_string(),
        }
    }
}
