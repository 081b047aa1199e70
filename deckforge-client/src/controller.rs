//! Async deck builder controller.
//!
//! Owns one [`DeckBuilderSession`] behind a mutex and drives the validator
//! for it. The lock is never held across a remote call: gestures arriving
//! while a validation is in flight are applied at once, and the late answer
//! is then discarded as stale. A save that finds a validation in flight for
//! the revision it wants to save waits for that answer instead of sending a
//! second request.
use deckforge_core::{
    Acceptance, CardCatalog, CardId, Composition, CredentialStore, DeckBuilderSession, DeckId,
    Gesture, PersistReceipt, PersistRequest, SessionUpdate, Signal, SubmissionError,
    TriggerState, UnknownCard, UpdateDeckRequest, ValidationResult, ValidationTicket,
};
use rand::Rng;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};

use crate::api::{ApiError, DeckApi, DeckPage};
use crate::validator::{ValidationClient, ValidationOutcome};

/// Why a save or a deck-list call did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error("validation could not be completed: {0}")]
    ValidationUnavailable(ApiError),
    #[error("sign in again: {0}")]
    Auth(ApiError),
    #[error("request failed: {0}")]
    Request(ApiError),
    #[error("sign in to save decks")]
    NotSignedIn,
    #[error("no user id configured for listing decks")]
    MissingUserId,
}

impl ClientError {
    fn from_api(err: ApiError) -> Self {
        if err.is_auth() {
            Self::Auth(err)
        } else {
            Self::Request(err)
        }
    }
}

/// One validator round trip as seen by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub ticket: ValidationTicket,
    pub outcome: ValidationOutcome,
    /// How the session took the answer; `None` when there was no answer.
    pub acceptance: Option<Acceptance>,
}

impl ValidationReport {
    /// The result, if it was stored for the current revision.
    #[must_use]
    pub fn applied_result(&self) -> Option<&ValidationResult> {
        match self.acceptance {
            Some(Acceptance::Applied) => self.outcome.result(),
            _ => None,
        }
    }
}

/// Outcome of a gesture routed through the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerUpdate {
    pub signals: Vec<Signal>,
    pub cleared: bool,
    /// Present when the gesture completed the deck and a validation ran.
    pub validation: Option<ValidationReport>,
}

pub struct BuilderController<A, C> {
    session: Mutex<DeckBuilderSession>,
    client: ValidationClient<A, C>,
    user_id: Option<String>,
    /// Woken whenever a validator round trip settles.
    settled: Notify,
}

impl<A, C> BuilderController<A, C>
where
    A: DeckApi,
    C: CredentialStore + Send + Sync,
{
    pub fn new(session: DeckBuilderSession, client: ValidationClient<A, C>) -> Self {
        Self {
            session: Mutex::new(session),
            client,
            user_id: None,
            settled: Notify::new(),
        }
    }

    /// Owner id used for listing decks.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub const fn client(&self) -> &ValidationClient<A, C> {
        &self.client
    }

    /// Copy of the composition as it is now.
    pub async fn snapshot(&self) -> Composition {
        self.session.lock().await.composition().clone()
    }

    pub async fn last_result(&self) -> Option<ValidationResult> {
        self.session.lock().await.last_result().cloned()
    }

    /// Apply a gesture, then run the validation it triggered, if any.
    pub async fn apply(&self, gesture: Gesture) -> ControllerUpdate {
        let update = self.session.lock().await.apply(&gesture);
        self.follow_up(update).await
    }

    pub async fn toggle_character(&self, id: impl Into<CardId>) -> ControllerUpdate {
        self.apply(Gesture::ToggleCharacter(id.into())).await
    }

    pub async fn toggle_action(&self, id: impl Into<CardId>) -> ControllerUpdate {
        self.apply(Gesture::ToggleAction(id.into())).await
    }

    /// Click on a catalog card; the catalog decides its kind.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownCard`] when the catalog does not hold `id`.
    pub async fn pick(
        &self,
        catalog: &(impl CardCatalog + Sync),
        id: impl Into<CardId>,
    ) -> Result<ControllerUpdate, UnknownCard> {
        let id = id.into();
        let update = self.session.lock().await.pick(catalog, &id)?;
        Ok(self.follow_up(update).await)
    }

    /// Draw up to `count` random characters, then validate if the draw
    /// completed the deck.
    pub async fn random_characters<R>(
        &self,
        catalog: &(impl CardCatalog + Sync),
        count: usize,
        rng: &mut R,
    ) -> ControllerUpdate
    where
        R: Rng + Send + ?Sized,
    {
        let update = self
            .session
            .lock()
            .await
            .random_characters(catalog, count, rng);
        self.follow_up(update).await
    }

    /// Draw up to `count` random action cards, then validate if the draw
    /// completed the deck.
    pub async fn random_actions<R>(
        &self,
        catalog: &(impl CardCatalog + Sync),
        count: usize,
        rng: &mut R,
    ) -> ControllerUpdate
    where
        R: Rng + Send + ?Sized,
    {
        let update = self
            .session
            .lock()
            .await
            .random_actions(catalog, count, rng);
        self.follow_up(update).await
    }

    pub async fn set_name(&self, name: impl Into<String>) -> ControllerUpdate {
        let update = self.session.lock().await.set_name(name);
        self.follow_up(update).await
    }

    pub async fn set_description(&self, description: Option<String>) {
        self.session.lock().await.set_description(description);
    }

    pub async fn reset(&self) -> ControllerUpdate {
        let update = self.session.lock().await.reset();
        self.follow_up(update).await
    }

    /// Validate the deck as it is now, on explicit request.
    ///
    /// # Errors
    ///
    /// Returns [`SubmissionError::NameRequired`] for an unnamed deck.
    pub async fn validate_now(&self) -> Result<ValidationReport, ClientError> {
        let ticket = self.session.lock().await.validate_now()?;
        Ok(self.run_ticket(ticket).await)
    }

    /// Save the deck as a new server-side deck.
    ///
    /// A missing or stale validation is refreshed first; the save only goes
    /// out with a passing result for the exact revision being saved.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] naming the unmet precondition or the failed
    /// remote call.
    pub async fn save(&self) -> Result<PersistReceipt, ClientError> {
        let token = self.client.token().ok_or(ClientError::NotSignedIn)?;
        let request = self.fresh_persist_request().await?;
        let receipt = self
            .client
            .bounded(self.client.api().create_deck(Some(&token), &request))
            .await
            .map_err(ClientError::from_api)?;
        log::info!(
            "saved deck '{}' as {}",
            request.name,
            receipt
                .deck_id
                .as_ref()
                .map_or_else(|| "?".to_string(), ToString::to_string)
        );
        Ok(receipt)
    }

    /// Overwrite an existing server-side deck with the current composition.
    ///
    /// # Errors
    ///
    /// Same preconditions as [`Self::save`].
    pub async fn update(&self, deck_id: DeckId) -> Result<PersistReceipt, ClientError> {
        let token = self.client.token().ok_or(ClientError::NotSignedIn)?;
        let request = UpdateDeckRequest::from_persist(deck_id, self.fresh_persist_request().await?);
        self.client
            .bounded(self.client.api().update_deck(Some(&token), &request))
            .await
            .map_err(ClientError::from_api)
    }

    /// One page of the configured user's decks.
    ///
    /// # Errors
    ///
    /// Returns an error without a user id or credential, or when the call fails.
    pub async fn list_decks(&self, page: u32, per_page: u32) -> Result<DeckPage, ClientError> {
        let user_id = self.user_id.as_deref().ok_or(ClientError::MissingUserId)?;
        let token = self.client.token().ok_or(ClientError::NotSignedIn)?;
        self.client
            .bounded(
                self.client
                    .api()
                    .list_decks(Some(&token), user_id, page, per_page),
            )
            .await
            .map_err(ClientError::from_api)
    }

    /// # Errors
    ///
    /// Returns an error without a credential, or when the call fails.
    pub async fn delete_deck(&self, deck_id: &DeckId) -> Result<(), ClientError> {
        let token = self.client.token().ok_or(ClientError::NotSignedIn)?;
        self.client
            .bounded(self.client.api().delete_deck(Some(&token), deck_id))
            .await
            .map_err(ClientError::from_api)
    }

    async fn fresh_persist_request(&self) -> Result<PersistRequest, ClientError> {
        let ticket = loop {
            // Registered before the state check so a round trip settling in
            // between still wakes us.
            let settled = self.settled.notified();
            let mut session = self.session.lock().await;
            match session.persist_request() {
                Ok(request) => return Ok(request),
                Err(err) if err.needs_revalidation() => {
                    let current = session.composition().revision();
                    if session.trigger_state() == (TriggerState::Pending { revision: current }) {
                        drop(session);
                        log::debug!("save waits for the validation of revision {current}");
                        settled.await;
                        continue;
                    }
                    break session.validate_now()?;
                }
                Err(err) => return Err(err.into()),
            }
        };
        log::debug!("revalidating revision {} before save", ticket.revision);

        let report = self.run_ticket(ticket).await;
        match report.outcome {
            ValidationOutcome::Validated(_) => {}
            ValidationOutcome::AuthFailure(err) => return Err(ClientError::Auth(err)),
            ValidationOutcome::RequestFailure(err) => {
                return Err(ClientError::ValidationUnavailable(err));
            }
        }
        Ok(self.session.lock().await.persist_request()?)
    }

    async fn follow_up(&self, update: SessionUpdate) -> ControllerUpdate {
        let validation = match update.ticket {
            Some(ticket) => Some(self.run_ticket(ticket).await),
            None => None,
        };
        ControllerUpdate {
            signals: update.signals,
            cleared: update.cleared,
            validation,
        }
    }

    async fn run_ticket(&self, ticket: ValidationTicket) -> ValidationReport {
        let outcome = self.client.run(&ticket.request).await;
        let mut session = self.session.lock().await;
        let acceptance = match &outcome {
            ValidationOutcome::Validated(result) => {
                Some(session.complete_validation(&ticket, result.clone()))
            }
            ValidationOutcome::RequestFailure(_) | ValidationOutcome::AuthFailure(_) => {
                session.abandon_validation(&ticket);
                None
            }
        };
        drop(session);
        self.settled.notify_waiters();
        ValidationReport {
            ticket,
            outcome,
            acceptance,
        }
    }
}
