//! Composition state: the candidate deck under construction.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::card::{CardCatalog, CardId, CatalogCard};
use crate::constants::{
    MAX_ACTION_CARDS, MAX_CHARACTERS, NOTICE_EMPTY_DECK, NOTICE_NO_TITLE,
};

/// Cards currently chosen for a deck.
///
/// Fields are private: every change goes through the selection engine so
/// the caps (3 characters, 30 action cards, 2 copies) hold at all times.
/// Each successful mutation bumps `revision`, which identifies the snapshot
/// a validation response or persist request belongs to.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Composition {
    name: String,
    description: Option<String>,
    /// Selection order is kept; membership is unique.
    characters: Vec<CardId>,
    /// Counts are always 1 or 2; zero-count entries are removed.
    action_counts: BTreeMap<CardId, u8>,
    revision: u64,
}

/// Equality compares deck content; `revision` is bookkeeping.
impl PartialEq for Composition {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.characters == other.characters
            && self.action_counts == other.action_counts
    }
}

impl Eq for Composition {}

impl Composition {
    /// Create a new empty composition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty composition carrying a deck name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the deck has a usable (non-blank) name.
    #[must_use]
    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Character ids in selection order.
    #[must_use]
    pub fn characters(&self) -> &[CardId] {
        &self.characters
    }

    /// Action entries as `(id, count)` in id order.
    pub fn action_counts(&self) -> impl Iterator<Item = (&CardId, u8)> {
        self.action_counts.iter().map(|(id, count)| (id, *count))
    }

    #[must_use]
    pub fn contains_character(&self, id: &CardId) -> bool {
        self.characters.contains(id)
    }

    #[must_use]
    pub fn character_count(&self) -> usize {
        self.characters.len()
    }

    /// Number of action cards counting copies.
    #[must_use]
    pub fn action_count(&self) -> u32 {
        self.action_counts.values().map(|count| u32::from(*count)).sum()
    }

    /// Selected copies of `id`: 0 or 1 for characters, 0 to 2 for actions.
    #[must_use]
    pub fn count_of(&self, id: &CardId) -> u8 {
        if self.contains_character(id) {
            return 1;
        }
        self.action_copies(id)
    }

    /// Copies of `id` among the action cards.
    #[must_use]
    pub fn action_copies(&self, id: &CardId) -> u8 {
        self.action_counts.get(id).copied().unwrap_or(0)
    }

    /// Characters plus action cards.
    #[must_use]
    pub fn total_cards(&self) -> u32 {
        u32::try_from(self.characters.len()).unwrap_or(u32::MAX) + self.action_count()
    }

    /// Exactly 3 characters and 30 action cards.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.characters.len() == MAX_CHARACTERS && self.action_count() == MAX_ACTION_CARDS
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.characters.is_empty() && self.action_counts.is_empty()
    }

    /// Action ids expanded so that a card with two copies appears twice.
    /// Copies are adjacent and ids come in stable order.
    #[must_use]
    pub fn flattened_actions(&self) -> Vec<CardId> {
        self.action_counts
            .iter()
            .flat_map(|(id, count)| std::iter::repeat_n(id.clone(), usize::from(*count)))
            .collect()
    }

    /// Sum of display costs over every copy in the deck.
    #[must_use]
    pub fn total_cost(&self, catalog: &impl CardCatalog) -> u32 {
        self.action_counts
            .iter()
            .filter_map(|(id, count)| {
                catalog
                    .card(id)
                    .map(|card| card.display_cost() * u32::from(*count))
            })
            .sum()
    }

    /// Grouped listing for the deck panel.
    #[must_use]
    pub fn listing(&self, catalog: &impl CardCatalog) -> DeckListing {
        let characters = self
            .characters
            .iter()
            .map(|id| {
                let label = match catalog.card(id) {
                    Some(CatalogCard::Character(card)) => format!(
                        "{} ({})",
                        card.name,
                        card.title.as_deref().unwrap_or(NOTICE_NO_TITLE)
                    ),
                    Some(other) => other.name().to_string(),
                    None => id.to_string(),
                };
                ListingLine {
                    id: id.clone(),
                    label,
                    count: 1,
                }
            })
            .collect();
        let actions = self
            .action_counts
            .iter()
            .map(|(id, count)| ListingLine {
                id: id.clone(),
                label: catalog
                    .card(id)
                    .map_or_else(|| id.to_string(), |card| card.name().to_string()),
                count: *count,
            })
            .collect();

        DeckListing {
            characters,
            actions,
            character_counter: format!("{}/{MAX_CHARACTERS}", self.character_count()),
            action_counter: format!("{}/{MAX_ACTION_CARDS}", self.action_count()),
            complete: self.is_complete(),
        }
    }

    // Mutation is crate-private; see `selection`.

    /// Store `name`. Only a change to the trimmed name, which is what the
    /// validator and the deck endpoints receive, starts a new revision.
    pub(crate) fn set_name_inner(&mut self, name: String) -> bool {
        let renamed = self.name.trim() != name.trim();
        self.name = name;
        if renamed {
            self.bump();
        }
        renamed
    }

    /// The description is not checked by the validator, so it does not
    /// start a new revision.
    pub(crate) fn set_description_inner(&mut self, description: Option<String>) {
        self.description = description;
    }

    pub(crate) fn insert_character(&mut self, id: CardId) {
        debug_assert!(self.characters.len() < MAX_CHARACTERS);
        debug_assert!(!self.contains_character(&id));
        self.characters.push(id);
        self.bump();
    }

    pub(crate) fn remove_character_inner(&mut self, id: &CardId) -> bool {
        let before = self.characters.len();
        self.characters.retain(|existing| existing != id);
        let removed = self.characters.len() != before;
        if removed {
            self.bump();
        }
        removed
    }

    /// Store a count, dropping the entry when it reaches zero.
    pub(crate) fn set_action_count(&mut self, id: &CardId, count: u8) {
        if count == 0 {
            self.action_counts.remove(id);
        } else {
            self.action_counts.insert(id.clone(), count);
        }
        self.bump();
    }

    pub(crate) fn clear_cards(&mut self) -> bool {
        if self.is_empty() {
            return false;
        }
        self.characters.clear();
        self.action_counts.clear();
        self.bump();
        true
    }

    const fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

/// One grouped row of the deck panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingLine {
    pub id: CardId,
    pub label: String,
    pub count: u8,
}

impl ListingLine {
    #[must_use]
    pub fn display(&self) -> String {
        format!("{} x{}", self.label, self.count)
    }
}

/// Deck panel contents: characters first, then action cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckListing {
    pub characters: Vec<ListingLine>,
    pub actions: Vec<ListingLine>,
    /// e.g. `"2/3"`.
    pub character_counter: String,
    /// e.g. `"28/30"`.
    pub action_counter: String,
    pub complete: bool,
}

impl DeckListing {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.characters.is_empty() && self.actions.is_empty()
    }

    /// Text lines for a plain rendering of the panel.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        if self.is_empty() {
            return vec![NOTICE_EMPTY_DECK.to_string()];
        }
        self.characters
            .iter()
            .chain(self.actions.iter())
            .map(ListingLine::display)
            .collect()
    }
}
