//! Deckforge Client
//!
//! Platform side of the deck builder: the HTTP gateway to the validator and
//! deck endpoints, credential storage, and an async controller that keeps a
//! builder session in step with the remote validator.

pub mod api;
pub mod config;
pub mod controller;
pub mod credentials;
pub mod validator;

pub use api::{
    ApiError, DeckApi, DeckPage, DeckRecord, HttpDeckApi, MAX_PAGE_SIZE, Pagination,
    classify_status, clamp_page,
};
pub use config::{ClientConfig, ConfigError};
pub use controller::{BuilderController, ClientError, ControllerUpdate, ValidationReport};
pub use credentials::{FileCredentialError, FileCredentials, MemoryCredentials};
pub use validator::{MISSING_CREDENTIAL, ValidationClient, ValidationOutcome};

/// Controller wired to the HTTP gateway and an in-memory credential.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn http_controller(
    config: ClientConfig,
    session: deckforge_core::DeckBuilderSession,
    token: Option<String>,
) -> Result<BuilderController<HttpDeckApi, MemoryCredentials>, ApiError> {
    let timeout = config.timeout();
    let user_id = config.user_id.clone();
    let credentials = token.map_or_else(MemoryCredentials::new, MemoryCredentials::with_token);
    let api = HttpDeckApi::new(config)?;
    let controller = BuilderController::new(session, ValidationClient::new(api, credentials, timeout));
    Ok(match user_id {
        Some(user_id) => controller.with_user_id(user_id),
        None => controller,
    })
}
