//! Client configuration: where the API lives and how long to wait for it.
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const BASE_URL_ENV: &str = "DECKFORGE_API_BASE_URL";
pub const TIMEOUT_ENV: &str = "DECKFORGE_API_TIMEOUT_SECS";
pub const USER_ID_ENV: &str = "DECKFORGE_USER_ID";

/// Errors raised when client configuration is unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DECKFORGE_API_BASE_URL must be an http(s) URL (got {0:?})")]
    InvalidBaseUrl(String),
    #[error("DECKFORGE_API_TIMEOUT_SECS must be a positive number of seconds (got {0:?})")]
    InvalidTimeout(String),
    #[error("client config JSON could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "ClientConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "ClientConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    /// Owner of the deck list; only needed for listing decks.
    #[serde(default)]
    pub user_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            timeout_secs: Self::default_timeout_secs(),
            user_id: None,
        }
    }
}

impl ClientConfig {
    fn default_base_url() -> String {
        "http://localhost:5000".to_string()
    }

    const fn default_timeout_secs() -> u64 {
        10
    }

    /// Read configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup; unset keys keep defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is set but unusable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(base_url) = lookup(BASE_URL_ENV) {
            config.base_url = base_url.trim().to_string();
        }
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            config.timeout_secs = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?;
        }
        config.user_id = lookup(USER_ID_ENV).filter(|id| !id.trim().is_empty());
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from JSON; missing fields keep defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or holds unusable values.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Absolute URL for an API path such as `/api/deck`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let url = self.base_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(self.timeout_secs.to_string()));
        }
        Ok(())
    }
}
