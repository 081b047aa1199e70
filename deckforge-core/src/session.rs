use rand::Rng;

use crate::card::{CardCatalog, CardId, UnknownCard};
use crate::composition::{Composition, DeckListing};
use crate::constants::debug_log_enabled;
use crate::persist::{PersistRequest, SubmissionError, prepare_submission};
use crate::random_fill;
use crate::selection::{self, CapacityExceeded, Gesture, Signal};
use crate::trigger::{
    Acceptance, AutoValidateTrigger, StampedResult, TriggerState, ValidationTicket,
};
use crate::validation::ValidationResult;

/// What a session call produced for the caller to act on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUpdate {
    pub signals: Vec<Signal>,
    /// Validation the caller should now send.
    pub ticket: Option<ValidationTicket>,
    /// The previous validation result (or in-flight request) no longer applies.
    pub cleared: bool,
}

impl SessionUpdate {
    #[must_use]
    pub fn changed(&self) -> bool {
        self.signals
            .iter()
            .any(|signal| matches!(signal, Signal::CountChanged { .. }))
    }

    #[must_use]
    pub fn capacity_exceeded(&self) -> Option<&CapacityExceeded> {
        self.signals.iter().find_map(|signal| match signal {
            Signal::CapacityExceeded(err) => Some(err),
            Signal::CountChanged { .. } | Signal::KindMismatch { .. } => None,
        })
    }
}

/// Deck builder session: one composition plus its auto-validate trigger.
///
/// Every mutating call re-evaluates the trigger, so a caller that forwards
/// each returned ticket to the validator gets exactly one request per
/// transition into a complete, named deck.
#[derive(Debug, Clone, Default)]
pub struct DeckBuilderSession {
    composition: Composition,
    trigger: AutoValidateTrigger,
}

impl DeckBuilderSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an empty deck carrying `name`.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            composition: Composition::named(name),
            trigger: AutoValidateTrigger::new(),
        }
    }

    #[must_use]
    pub const fn composition(&self) -> &Composition {
        &self.composition
    }

    #[must_use]
    pub const fn trigger_state(&self) -> TriggerState {
        self.trigger.state()
    }

    /// Result for the current revision, if one has been accepted.
    #[must_use]
    pub fn last_result(&self) -> Option<&ValidationResult> {
        self.trigger.result().map(|stamped| &stamped.result)
    }

    #[must_use]
    pub fn stamped_result(&self) -> Option<&StampedResult> {
        self.trigger.result()
    }

    /// Apply one gesture and re-evaluate the trigger.
    pub fn apply(&mut self, gesture: &Gesture) -> SessionUpdate {
        let signals = selection::apply(&mut self.composition, gesture);
        self.observe(signals)
    }

    /// Click on a catalog card: the catalog decides whether it toggles as a
    /// character or as an action card.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownCard`] when the catalog does not hold `id`.
    pub fn pick(
        &mut self,
        catalog: &impl CardCatalog,
        id: &CardId,
    ) -> Result<SessionUpdate, UnknownCard> {
        let kind = catalog
            .kind_of(id)
            .ok_or_else(|| UnknownCard(id.clone()))?;
        Ok(self.apply(&Gesture::toggle(kind, id.clone())))
    }

    /// Draw up to `count` random characters from the catalog. The trigger is
    /// evaluated once, after the whole draw.
    pub fn random_characters<R>(
        &mut self,
        catalog: &impl CardCatalog,
        count: usize,
        rng: &mut R,
    ) -> SessionUpdate
    where
        R: Rng + ?Sized,
    {
        let signals = random_fill::random_characters(&mut self.composition, catalog, count, rng);
        self.observe(signals)
    }

    /// Draw up to `count` random action cards from the catalog, one copy
    /// each. The trigger is evaluated once, after the whole draw.
    pub fn random_actions<R>(
        &mut self,
        catalog: &impl CardCatalog,
        count: usize,
        rng: &mut R,
    ) -> SessionUpdate
    where
        R: Rng + ?Sized,
    {
        let signals = random_fill::random_actions(&mut self.composition, catalog, count, rng);
        self.observe(signals)
    }

    pub fn toggle_character(&mut self, id: impl Into<CardId>) -> SessionUpdate {
        self.apply(&Gesture::ToggleCharacter(id.into()))
    }

    pub fn toggle_action(&mut self, id: impl Into<CardId>) -> SessionUpdate {
        self.apply(&Gesture::ToggleAction(id.into()))
    }

    pub fn add_action(&mut self, id: impl Into<CardId>) -> SessionUpdate {
        self.apply(&Gesture::AddAction(id.into()))
    }

    pub fn remove_action(&mut self, id: impl Into<CardId>) -> SessionUpdate {
        self.apply(&Gesture::RemoveAction(id.into()))
    }

    pub fn remove_character(&mut self, id: impl Into<CardId>) -> SessionUpdate {
        self.apply(&Gesture::RemoveCharacter(id.into()))
    }

    /// Rename the deck. A change of the trimmed name is a new revision, so a complete deck is
    /// validated again under its new name.
    pub fn set_name(&mut self, name: impl Into<String>) -> SessionUpdate {
        self.composition.set_name_inner(name.into());
        self.observe(Vec::new())
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.composition
            .set_description_inner(description.filter(|text| !text.trim().is_empty()));
    }

    /// Clear every selected card; the name and description stay.
    pub fn reset(&mut self) -> SessionUpdate {
        if self.composition.clear_cards() && debug_log_enabled() {
            println!("Session | reset to revision {}", self.composition.revision());
        }
        self.observe(Vec::new())
    }

    /// Ask for a validation of the deck as it is now, complete or not.
    ///
    /// # Errors
    ///
    /// Returns [`SubmissionError::NameRequired`] when the deck has no name.
    pub fn validate_now(&mut self) -> Result<ValidationTicket, SubmissionError> {
        if !self.composition.has_name() {
            return Err(SubmissionError::NameRequired);
        }
        Ok(self.trigger.request_manual(&self.composition))
    }

    /// Hand back the validator's answer for `ticket`.
    pub fn complete_validation(
        &mut self,
        ticket: &ValidationTicket,
        result: ValidationResult,
    ) -> Acceptance {
        self.trigger
            .accept(ticket, self.composition.revision(), result)
    }

    /// The round trip for `ticket` failed.
    pub fn abandon_validation(&mut self, ticket: &ValidationTicket) {
        self.trigger.abandon(ticket);
    }

    /// Payload for saving the deck.
    ///
    /// # Errors
    ///
    /// Returns a [`SubmissionError`] unless the deck is named, complete and
    /// validated as valid at its current revision.
    pub fn persist_request(&self) -> Result<PersistRequest, SubmissionError> {
        prepare_submission(&self.composition, self.trigger.result())
    }

    /// Whether saving now would first need a fresh validation.
    #[must_use]
    pub fn needs_revalidation(&self) -> bool {
        self.persist_request()
            .err()
            .is_some_and(|err| err.needs_revalidation())
    }

    #[must_use]
    pub fn listing(&self, catalog: &impl CardCatalog) -> DeckListing {
        self.composition.listing(catalog)
    }

    /// Consume the session, returning the composition.
    #[must_use]
    pub fn into_composition(self) -> Composition {
        self.composition
    }

    fn observe(&mut self, signals: Vec<Signal>) -> SessionUpdate {
        let observation = self.trigger.observe(&self.composition);
        SessionUpdate {
            signals,
            ticket: observation.ticket,
            cleared: observation.cleared,
        }
    }
}
