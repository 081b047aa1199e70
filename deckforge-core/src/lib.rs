//! Deckforge Core
//!
//! Platform-agnostic deck building logic for the card game companion client.
//! This crate holds the composition rules, the selection engine, and the
//! validation bookkeeping without any network or UI dependencies.

pub mod card;
pub mod composition;
pub mod constants;
pub mod persist;
pub mod random_fill;
pub mod selection;
pub mod session;
pub mod trigger;
pub mod validation;

// Re-export commonly used types
pub use card::{
    ActionCard, CardCatalog, CardCost, CardId, CardKind, CatalogCard, CatalogError,
    CharacterCard, InMemoryCatalog, UnknownCard,
};
pub use composition::{Composition, DeckListing, ListingLine};
pub use constants::{DECK_SIZE, MAX_ACTION_CARDS, MAX_CHARACTERS, MAX_COPIES_PER_ACTION};
pub use persist::{
    DeckId, PersistReceipt, PersistRequest, SubmissionError, UpdateDeckRequest,
    prepare_submission,
};
pub use selection::{
    CapacityExceeded, CapacityKind, Gesture, Signal, Transition, apply, toggle_action,
    toggle_character, transition,
};
pub use session::{DeckBuilderSession, SessionUpdate};
pub use trigger::{
    Acceptance, AutoValidateTrigger, Observation, StampedResult, TicketOrigin, TriggerState,
    ValidationTicket,
};
pub use validation::{
    RuleName, RuleResult, ValidationDetails, ValidationRequest, ValidationResponse,
    ValidationResult,
};

/// Trait for abstracting where the bearer credential lives
/// Platform-specific implementations should provide this
pub trait CredentialStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Current bearer token, if one is stored
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn token(&self) -> Result<Option<String>, Self::Error>;

    /// Store a bearer token
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be written.
    fn store_token(&self, token: &str) -> Result<(), Self::Error>;

    /// Forget the stored token, as after an authentication failure
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be removed.
    fn clear_token(&self) -> Result<(), Self::Error>;
}
