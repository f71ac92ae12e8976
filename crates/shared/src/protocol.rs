use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{MessageId, UserId},
    error::ProtocolError,
};

pub const EVENT_ONLINE_USERS: &str = "getOnlineUsers";
pub const EVENT_NEW_MESSAGE: &str = "newMessage";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Profile image reference, treating an empty string as unset.
    pub fn avatar(&self) -> Option<&str> {
        self.profile_pic.as_deref().filter(|pic| !pic.is_empty())
    }

    pub fn member_since(&self) -> String {
        self.created_at.format("%Y-%m-%d").to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id", default)]
    pub id: MessageId,
    pub sender_id: UserId,
    #[serde(default)]
    pub receiver_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|text| !text.is_empty())
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref().filter(|image| !image.is_empty())
    }

    /// `YYYY-MM-DD HH:MM`, or an empty string when the backend sent no timestamp.
    pub fn display_time(&self) -> String {
        self.created_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default()
    }
}

/// Every successful backend response carries its payload under `data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub profile_pic: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Events pushed by the backend over the realtime channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    OnlineUsers(Vec<UserId>),
    NewMessage(Message),
}

impl ServerEvent {
    pub fn decode(event: &str, payload: Value) -> Result<Self, ProtocolError> {
        let invalid = |source| ProtocolError::InvalidPayload {
            event: event.to_string(),
            source,
        };
        match event {
            EVENT_ONLINE_USERS => serde_json::from_value(payload)
                .map(ServerEvent::OnlineUsers)
                .map_err(invalid),
            EVENT_NEW_MESSAGE => serde_json::from_value(payload)
                .map(ServerEvent::NewMessage)
                .map_err(invalid),
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::OnlineUsers(_) => EVENT_ONLINE_USERS,
            ServerEvent::NewMessage(_) => EVENT_NEW_MESSAGE,
        }
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
