//! HTTP capability: the backend's REST surface as a trait, plus the reqwest implementation.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::UserId,
    error::ApiErrorBody,
    protocol::{
        ApiEnvelope, LoginRequest, Message, SendMessageRequest, SignUpRequest,
        UpdateProfileRequest, User,
    },
};
use tracing::debug;
use url::Url;

use crate::{
    config::ClientSettings,
    error::{ClientError, Result},
};

#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn check_auth(&self) -> Result<User>;
    async fn login(&self, request: &LoginRequest) -> Result<User>;
    async fn logout(&self) -> Result<()>;
    async fn sign_up(&self, request: &SignUpRequest) -> Result<User>;
    async fn update_profile(&self, request: &UpdateProfileRequest) -> Result<User>;
    async fn list_users(&self) -> Result<Vec<User>>;
    async fn list_messages(&self, contact_id: &UserId) -> Result<Vec<Message>>;
    async fn send_message(
        &self,
        contact_id: &UserId,
        request: &SendMessageRequest,
    ) -> Result<Message>;
}

pub struct HttpChatApi {
    http: Client,
    base_url: Url,
}

impl HttpChatApi {
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        let base_url = Url::parse(&settings.api_base_url)
            .map_err(|err| ClientError::Config(format!("invalid api base url: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "api base url cannot be a base: {base_url}"
            )));
        }
        let http = Client::builder()
            .cookie_store(true)
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Unwraps `data` from a success body, or turns the error body into [`ClientError::Api`].
async fn read_data<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    let envelope: ApiEnvelope<T> = serde_json::from_slice(&bytes)?;
    Ok(envelope.data)
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let bytes = response.bytes().await.unwrap_or_default();
    let message = serde_json::from_slice::<ApiErrorBody>(&bytes)
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    debug!(status = status.as_u16(), %message, "api: request rejected");
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn check_auth(&self) -> Result<User> {
        let response = self
            .http
            .get(self.endpoint(&["auth", "check-auth"]))
            .send()
            .await?;
        read_data(response).await
    }

    async fn login(&self, request: &LoginRequest) -> Result<User> {
        let response = self
            .http
            .post(self.endpoint(&["auth", "login"]))
            .json(request)
            .send()
            .await?;
        read_data(response).await
    }

    async fn logout(&self) -> Result<()> {
        let response = self
            .http
            .post(self.endpoint(&["auth", "logout"]))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<User> {
        let response = self
            .http
            .post(self.endpoint(&["users", "user"]))
            .json(request)
            .send()
            .await?;
        read_data(response).await
    }

    async fn update_profile(&self, request: &UpdateProfileRequest) -> Result<User> {
        let response = self
            .http
            .patch(self.endpoint(&["users", "user", "update-profile"]))
            .json(request)
            .send()
            .await?;
        read_data(response).await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let response = self
            .http
            .get(self.endpoint(&["users", "all"]))
            .send()
            .await?;
        read_data(response).await
    }

    async fn list_messages(&self, contact_id: &UserId) -> Result<Vec<Message>> {
        let response = self
            .http
            .get(self.endpoint(&["messages", "all", contact_id.as_str()]))
            .send()
            .await?;
        read_data(response).await
    }

    async fn send_message(
        &self,
        contact_id: &UserId,
        request: &SendMessageRequest,
    ) -> Result<Message> {
        let response = self
            .http
            .post(self.endpoint(&["messages", "send", contact_id.as_str()]))
            .json(request)
            .send()
            .await?;
        read_data(response).await
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
