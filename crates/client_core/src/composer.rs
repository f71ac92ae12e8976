//! Message composer: draft text plus at most one image, encoded as a base64 data URL.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use shared::{domain::UserId, protocol::SendMessageRequest};

use crate::error::{ClientError, Result};

/// A message ready to hand to the conversation store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: Option<String>,
    pub image: Option<String>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        let blank_text = self.text.as_deref().map_or(true, |text| text.trim().is_empty());
        let no_image = self.image.as_deref().map_or(true, str::is_empty);
        blank_text && no_image
    }

    /// Trims the text and drops empty parts.
    pub(crate) fn into_request(self) -> Result<SendMessageRequest> {
        if self.is_empty() {
            return Err(ClientError::validation("Message needs text or an image"));
        }
        Ok(SendMessageRequest {
            text: self
                .text
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
            image: self.image.filter(|image| !image.is_empty()),
        })
    }
}

pub fn encode_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

pub fn encode_image(mime_type: &str, bytes: &[u8]) -> Result<String> {
    if !mime_type.starts_with("image/") {
        return Err(ClientError::validation("Please select an image file"));
    }
    Ok(encode_data_url(mime_type, bytes))
}

#[derive(Debug, Clone, Default)]
pub struct Composer {
    text: String,
    image_preview: Option<String>,
    contact_id: Option<UserId>,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn image_preview(&self) -> Option<&str> {
        self.image_preview.as_deref()
    }

    /// Replaces any previous preview. Non-image files are refused and leave the draft as is.
    pub fn attach_image(&mut self, mime_type: &str, bytes: &[u8]) -> Result<()> {
        self.image_preview = Some(encode_image(mime_type, bytes)?);
        Ok(())
    }

    pub fn remove_image(&mut self) {
        self.image_preview = None;
    }

    pub fn can_submit(&self) -> bool {
        !self.text.trim().is_empty() || self.image_preview.is_some()
    }

    pub fn submission(&self) -> Result<OutgoingMessage> {
        if !self.can_submit() {
            return Err(ClientError::validation("Message needs text or an image"));
        }
        Ok(OutgoingMessage {
            text: Some(self.text.trim().to_string()).filter(|text| !text.is_empty()),
            image: self.image_preview.clone(),
        })
    }

    /// Points the draft at `contact_id`. A draft written for another contact
    /// is discarded; returns `true` when that happened. A draft started with
    /// no conversation open is kept for the first one opened.
    pub fn retarget(&mut self, contact_id: Option<&UserId>) -> bool {
        if self.contact_id.as_ref() == contact_id {
            return false;
        }
        let previous = std::mem::replace(&mut self.contact_id, contact_id.cloned());
        if previous.is_none() {
            return false;
        }
        let discarded = !self.text.is_empty() || self.image_preview.is_some();
        self.clear();
        discarded
    }

    /// Call after the message was accepted by the backend.
    pub fn clear(&mut self) {
        self.text.clear();
        self.image_preview = None;
    }
}
