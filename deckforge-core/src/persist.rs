//! Preconditions and payloads for saving a deck.
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

use crate::card::CardId;
use crate::composition::Composition;
use crate::trigger::StampedResult;

/// A save was attempted without a fresh passing validation.
///
/// These are caught before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("deck name is required")]
    NameRequired,
    #[error("deck is incomplete: {characters}/3 characters, {actions}/30 action cards")]
    Incomplete { characters: usize, actions: u32 },
    #[error("deck has not been validated")]
    NotValidated,
    #[error("validation is for revision {validated}, deck is at revision {current}")]
    StaleValidation { validated: u64, current: u64 },
    #[error("validator rejected the deck")]
    Rejected,
}

impl SubmissionError {
    /// Whether validating the current deck again could clear the error.
    #[must_use]
    pub const fn needs_revalidation(&self) -> bool {
        matches!(self, Self::NotValidated | Self::StaleValidation { .. })
    }
}

/// Body of a create-deck call.
///
/// `cards` holds the three characters followed by the flattened action
/// cards; the split lists are sent alongside for endpoints that take them
/// separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub cards: Vec<CardId>,
    pub character_card_ids: Vec<CardId>,
    pub card_ids: Vec<CardId>,
}

/// Server-side deck identifier. Older endpoints send a number, newer ones a
/// string; both decode to the same id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DeckId(String);

impl DeckId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeckId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for DeckId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(i64),
            Text(String),
        }
        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(n) => Self(n.to_string()),
            RawId::Text(text) => Self(text),
        })
    }
}

/// Body of an update-deck call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDeckRequest {
    pub deck_id: DeckId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub card_ids: Vec<CardId>,
}

impl UpdateDeckRequest {
    #[must_use]
    pub fn from_persist(deck_id: DeckId, request: PersistRequest) -> Self {
        Self {
            deck_id,
            name: Some(request.name),
            description: request.description,
            card_ids: request.cards,
        }
    }
}

/// Server acknowledgement of a save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistReceipt {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub deck_id: Option<DeckId>,
    #[serde(default)]
    pub deck_name: Option<String>,
}

/// Build the save payload, refusing unless `validation` is a passing result
/// for exactly this revision of `comp`.
///
/// # Errors
///
/// Returns a [`SubmissionError`] naming the missing precondition.
pub fn prepare_submission(
    comp: &Composition,
    validation: Option<&StampedResult>,
) -> Result<PersistRequest, SubmissionError> {
    if !comp.has_name() {
        return Err(SubmissionError::NameRequired);
    }
    if !comp.is_complete() {
        return Err(SubmissionError::Incomplete {
            characters: comp.character_count(),
            actions: comp.action_count(),
        });
    }
    let stamped = validation.ok_or(SubmissionError::NotValidated)?;
    if stamped.revision != comp.revision() {
        return Err(SubmissionError::StaleValidation {
            validated: stamped.revision,
            current: comp.revision(),
        });
    }
    if !stamped.result.valid {
        return Err(SubmissionError::Rejected);
    }

    let character_card_ids = comp.characters().to_vec();
    let card_ids = comp.flattened_actions();
    let cards = character_card_ids
        .iter()
        .chain(card_ids.iter())
        .cloned()
        .collect();
    Ok(PersistRequest {
        name: comp.name().trim().to_string(),
        description: comp.description().map(str::to_string),
        cards,
        character_card_ids,
        card_ids,
    })
}
