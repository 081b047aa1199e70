//! HTTP gateway to the validator and the deck endpoints.
use async_trait::async_trait;
use chrono::NaiveDateTime;
use deckforge_core::{
    CardId, DeckId, PersistReceipt, PersistRequest, UpdateDeckRequest, ValidationRequest,
    ValidationResponse,
};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::ClientConfig;

pub const VALIDATE_PATH: &str = "/api/deck/validate";
pub const DECK_PATH: &str = "/api/deck";
pub const MAX_PAGE_SIZE: u32 = 100;

/// Messages the auth layer sends for a missing, expired or malformed token.
static AUTH_MESSAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)missing authorization header|token has expired|invalid token|signature verification failed|not enough segments|token.*(expired|invalid|missing)",
    )
    .expect("valid auth pattern")
});

/// Failure of one remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,
    #[error("request could not be sent: {0}")]
    Transport(String),
    #[error("server answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("authentication rejected ({status}): {message}")]
    Auth { status: u16, message: String },
    #[error("response could not be decoded: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether the stored credential should be dropped.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Sort a non-success response into an auth failure or a plain status error.
///
/// Only a 401/403 whose message names a token problem counts as an auth
/// failure; a 403 for, say, another user's deck stays a status error.
#[must_use]
pub fn classify_status(status: u16, body: &str) -> ApiError {
    let message = error_message(body).unwrap_or_else(|| format!("HTTP {status}"));
    let token_problem = AUTH_MESSAGE.is_match(&message);
    if matches!(status, 401 | 403) && token_problem {
        ApiError::Auth { status, message }
    } else {
        ApiError::Status { status, message }
    }
}

/// Pull a human message out of an error body: `msg`, `message`, `error`,
/// then `errors`.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    for key in ["msg", "message", "error"] {
        if let Some(text) = value.get(key).and_then(Value::as_str) {
            return Some(text.to_string());
        }
    }
    let errors: Vec<&str> = value
        .get("errors")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .collect();
    (!errors.is_empty()).then(|| errors.join(", "))
}

/// A saved deck as listed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckRecord {
    pub id: DeckId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cards: Vec<CardId>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    #[must_use]
    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.pages
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckPage {
    #[serde(default)]
    pub decks: Vec<DeckRecord>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// Clamp a page request the way the server does: pages start at 1 and hold
/// at most [`MAX_PAGE_SIZE`] decks.
#[must_use]
pub fn clamp_page(page: u32, per_page: u32) -> (u32, u32) {
    (page.max(1), per_page.clamp(1, MAX_PAGE_SIZE))
}

/// Remote operations the deck builder depends on.
///
/// `token` is attached as a bearer credential when present.
#[async_trait]
pub trait DeckApi: Send + Sync {
    async fn validate(
        &self,
        token: Option<&str>,
        request: &ValidationRequest,
    ) -> Result<ValidationResponse, ApiError>;

    async fn create_deck(
        &self,
        token: Option<&str>,
        request: &PersistRequest,
    ) -> Result<PersistReceipt, ApiError>;

    async fn update_deck(
        &self,
        token: Option<&str>,
        request: &UpdateDeckRequest,
    ) -> Result<PersistReceipt, ApiError>;

    async fn list_decks(
        &self,
        token: Option<&str>,
        user_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<DeckPage, ApiError>;

    async fn delete_deck(&self, token: Option<&str>, deck_id: &DeckId) -> Result<(), ApiError>;
}

/// [`DeckApi`] over HTTP with `reqwest`.
pub struct HttpDeckApi {
    client: Client,
    config: ClientConfig,
}

impl HttpDeckApi {
    /// Build a gateway whose every call is bounded by the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialised.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        token: Option<&str>,
    ) -> Result<T, ApiError> {
        let request = match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let err = classify_status(status.as_u16(), &body);
            log::warn!("{err}");
            return Err(err);
        }
        let body = if body.trim().is_empty() { "null" } else { &body };
        serde_json::from_str(body).map_err(|err| ApiError::Decode(err.to_string()))
    }
}

#[async_trait]
impl DeckApi for HttpDeckApi {
    async fn validate(
        &self,
        token: Option<&str>,
        request: &ValidationRequest,
    ) -> Result<ValidationResponse, ApiError> {
        let builder = self
            .client
            .post(self.config.endpoint(VALIDATE_PATH))
            .json(request);
        self.send(builder, token).await
    }

    async fn create_deck(
        &self,
        token: Option<&str>,
        request: &PersistRequest,
    ) -> Result<PersistReceipt, ApiError> {
        let builder = self.client.post(self.config.endpoint(DECK_PATH)).json(request);
        self.send(builder, token).await
    }

    async fn update_deck(
        &self,
        token: Option<&str>,
        request: &UpdateDeckRequest,
    ) -> Result<PersistReceipt, ApiError> {
        let builder = self.client.put(self.config.endpoint(DECK_PATH)).json(request);
        self.send(builder, token).await
    }

    async fn list_decks(
        &self,
        token: Option<&str>,
        user_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<DeckPage, ApiError> {
        let (page, per_page) = clamp_page(page, per_page);
        let builder = self
            .client
            .get(self.config.endpoint(&format!("/api/user/{user_id}/decks")))
            .query(&[("page", page), ("per_page", per_page)]);
        self.send(builder, token).await
    }

    async fn delete_deck(&self, token: Option<&str>, deck_id: &DeckId) -> Result<(), ApiError> {
        let builder = self
            .client
            .delete(self.config.endpoint(&format!("/api/decks/{deck_id}")));
        let _: Value = self.send(builder, token).await?;
        Ok(())
    }
}
