//! Validation client: one validator round trip with failure classification.
use deckforge_core::{
    Composition, CredentialStore, SubmissionError, ValidationRequest, ValidationResult,
};
use std::future::Future;
use std::time::Duration;

use crate::api::{ApiError, DeckApi};

/// Message of the auth failure raised locally when no token is stored.
pub const MISSING_CREDENTIAL: &str = "Missing Authorization Header";

/// Three-way answer of a validation round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The validator ran; `valid` may still be false.
    Validated(ValidationResult),
    /// Transport, timeout, server or decode failure. The user may retry.
    RequestFailure(ApiError),
    /// The credential was rejected and has been cleared.
    AuthFailure(ApiError),
}

impl ValidationOutcome {
    #[must_use]
    pub const fn result(&self) -> Option<&ValidationResult> {
        match self {
            Self::Validated(result) => Some(result),
            Self::RequestFailure(_) | Self::AuthFailure(_) => None,
        }
    }

    #[must_use]
    pub fn into_result(self) -> Option<ValidationResult> {
        match self {
            Self::Validated(result) => Some(result),
            Self::RequestFailure(_) | Self::AuthFailure(_) => None,
        }
    }

    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthFailure(_))
    }
}

/// Sends validation requests and remote deck calls with the stored
/// credential, each bounded by `timeout`.
pub struct ValidationClient<A, C> {
    api: A,
    credentials: C,
    timeout: Duration,
}

impl<A, C> ValidationClient<A, C>
where
    A: DeckApi,
    C: CredentialStore,
{
    pub const fn new(api: A, credentials: C, timeout: Duration) -> Self {
        Self {
            api,
            credentials,
            timeout,
        }
    }

    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }

    #[must_use]
    pub const fn credentials(&self) -> &C {
        &self.credentials
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Validate `comp` as it is, complete or not.
    ///
    /// # Errors
    ///
    /// Returns [`SubmissionError::NameRequired`] without a network call when
    /// the deck has no name.
    pub async fn validate(
        &self,
        comp: &Composition,
    ) -> Result<ValidationOutcome, SubmissionError> {
        if !comp.has_name() {
            return Err(SubmissionError::NameRequired);
        }
        Ok(self.run(&ValidationRequest::from_composition(comp)).await)
    }

    /// Send an already-built request. Without a stored token nothing is
    /// sent and the outcome is an auth failure.
    pub async fn run(&self, request: &ValidationRequest) -> ValidationOutcome {
        let Some(token) = self.token() else {
            log::warn!("not validating '{}': no stored credential", request.deck_name);
            return ValidationOutcome::AuthFailure(missing_credential());
        };
        let call = self.api.validate(Some(&token), request);
        match self.bounded(call).await {
            Ok(response) => ValidationOutcome::Validated(response.into()),
            Err(err) if err.is_auth() => ValidationOutcome::AuthFailure(err),
            Err(err) => {
                log::warn!("validation of '{}' failed: {err}", request.deck_name);
                ValidationOutcome::RequestFailure(err)
            }
        }
    }

    /// Current token; an unreadable store counts as signed out.
    pub fn token(&self) -> Option<String> {
        self.credentials.token().unwrap_or_else(|err| {
            log::warn!("credential store unreadable: {err}");
            None
        })
    }

    /// Await a remote call under the timeout, clearing the credential when
    /// the server rejects it.
    pub async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, ApiError>>,
    ) -> Result<T, ApiError> {
        let outcome = tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(ApiError::Timeout));
        if let Err(err) = &outcome
            && err.is_auth()
        {
            self.forget_credential(err);
        }
        outcome
    }

    /// Stored token, or the auth failure a call without one would get.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Auth`] when no token is stored.
    pub fn require_token(&self) -> Result<String, ApiError> {
        self.token().ok_or_else(missing_credential)
    }

    fn forget_credential(&self, err: &ApiError) {
        log::warn!("clearing stored credential: {err}");
        if let Err(clear_err) = self.credentials.clear_token() {
            log::error!("credential could not be cleared: {clear_err}");
        }
    }
}

fn missing_credential() -> ApiError {
    ApiError::Auth {
        status: 401,
        message: MISSING_CREDENTIAL.to_string(),
    }
}
