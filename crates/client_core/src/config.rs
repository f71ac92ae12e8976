use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use url::Url;

use crate::error::{ClientError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "chattify.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub socket_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5001/api".into(),
            socket_url: "http://localhost:5001".into(),
            request_timeout_secs: 30,
        }
    }
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Applies overrides from `lookup`, later keys winning over earlier ones.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for key in ["CHATTIFY_API_BASE_URL", "APP__API_BASE_URL"] {
            if let Some(v) = lookup(key) {
                self.api_base_url = v;
            }
        }
        for key in ["CHATTIFY_SOCKET_URL", "APP__SOCKET_URL"] {
            if let Some(v) = lookup(key) {
                self.socket_url = v;
            }
        }
        if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.request_timeout_secs = parsed;
            }
        }
    }

    pub fn validated(mut self) -> Result<Self> {
        self.api_base_url = normalize_http_url(&self.api_base_url)?;
        self.socket_url = normalize_http_url(&self.socket_url)?;
        Ok(self)
    }
}

/// Defaults, then `path` (or `chattify.toml` when present), then environment.
pub fn load_settings(path: Option<&Path>) -> Result<ClientSettings> {
    let mut settings = match path {
        Some(path) => read_settings_file(path)?,
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                read_settings_file(&default_path)?
            } else {
                ClientSettings::default()
            }
        }
    };

    settings.apply_overrides(|key| std::env::var(key).ok());
    settings.validated()
}

fn read_settings_file(path: &Path) -> Result<ClientSettings> {
    let raw = fs::read_to_string(path).map_err(|err| {
        ClientError::Config(format!("failed to read '{}': {err}", path.display()))
    })?;
    toml::from_str(&raw)
        .map_err(|err| ClientError::Config(format!("failed to parse '{}': {err}", path.display())))
}

pub(crate) fn normalize_http_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed)
        .map_err(|err| ClientError::Config(format!("invalid url '{raw}': {err}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(ClientError::Config(format!(
            "url '{raw}' must use http or https, got {other}"
        ))),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
