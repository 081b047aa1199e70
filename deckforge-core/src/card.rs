//! Card identity and the read-only card reference store.
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::constants::CHARACTER_CARD_TYPE;

/// Opaque card identifier, a foreign key into the card catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CardId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CardId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for CardId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Deck-building kind of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    Character,
    Action,
}

impl CardKind {
    /// Classify a catalog type tag. Anything that is not a character card
    /// (equipment, support, event, ...) builds as an action card.
    #[must_use]
    pub fn from_catalog_type(card_type: &str) -> Self {
        let trimmed = card_type.trim();
        if trimmed == CHARACTER_CARD_TYPE
            || trimmed.eq_ignore_ascii_case("character")
            || trimmed.eq_ignore_ascii_case("character_card")
        {
            Self::Character
        } else {
            Self::Action
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Action => "action",
        }
    }
}

impl fmt::Display for CardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One element of a card's dice cost, e.g. `{"type": "火", "value": 1}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardCost {
    #[serde(rename = "type", default)]
    pub cost_type: String,
    #[serde(default)]
    pub value: u32,
}

/// A character card as resolved from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterCard {
    pub id: CardId,
    pub name: String,
    pub title: Option<String>,
    pub element: Option<String>,
    pub country: Option<String>,
    pub weapon_type: Option<String>,
    pub health: Option<u32>,
    pub energy: Option<u32>,
}

/// Any non-character card (equipment, support, event).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCard {
    pub id: CardId,
    pub name: String,
    pub card_type: String,
    pub cost: Vec<CardCost>,
    pub tags: Vec<String>,
}

/// Catalog entry, tagged once at lookup time by its deck-building kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogCard {
    Character(CharacterCard),
    Action(ActionCard),
}

impl CatalogCard {
    #[must_use]
    pub const fn id(&self) -> &CardId {
        match self {
            Self::Character(card) => &card.id,
            Self::Action(card) => &card.id,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Character(card) => &card.name,
            Self::Action(card) => &card.name,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> CardKind {
        match self {
            Self::Character(_) => CardKind::Character,
            Self::Action(_) => CardKind::Action,
        }
    }

    /// Display cost: the summed dice value. Characters carry no cost.
    #[must_use]
    pub fn display_cost(&self) -> u32 {
        match self {
            Self::Character(_) => 0,
            Self::Action(card) => card.cost.iter().map(|c| c.value).sum(),
        }
    }
}

/// Card record as the catalog service serves it.
#[derive(Debug, Clone, Deserialize)]
struct RawCard {
    id: CardId,
    name: String,
    #[serde(rename = "type")]
    card_type: String,
    #[serde(default)]
    cost: Vec<CardCost>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    element: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    weapon_type: Option<String>,
    #[serde(default)]
    health: Option<u32>,
    #[serde(default)]
    energy: Option<u32>,
    #[serde(default)]
    tags: Vec<String>,
}

impl From<RawCard> for CatalogCard {
    fn from(raw: RawCard) -> Self {
        match CardKind::from_catalog_type(&raw.card_type) {
            CardKind::Character => Self::Character(CharacterCard {
                id: raw.id,
                name: raw.name,
                title: raw.title,
                element: raw.element,
                country: raw.country,
                weapon_type: raw.weapon_type,
                health: raw.health,
                energy: raw.energy,
            }),
            CardKind::Action => Self::Action(ActionCard {
                id: raw.id,
                name: raw.name,
                card_type: raw.card_type,
                cost: raw.cost,
                tags: raw.tags,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(default)]
    cards: Vec<RawCard>,
}

/// Errors raised while loading a catalog snapshot.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog JSON could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("catalog lists card {0} more than once")]
    DuplicateId(CardId),
}

/// A pick named a card the catalog does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("card {0} is not in the catalog")]
pub struct UnknownCard(pub CardId);

/// Read-only card lookup. The composition engine never mutates the catalog.
pub trait CardCatalog {
    /// Look up a card by id.
    fn card(&self, id: &CardId) -> Option<&CatalogCard>;

    /// Ids of every card of `kind`, in a stable order.
    fn ids_of_kind(&self, kind: CardKind) -> Vec<&CardId>;

    /// Kind of a card, if the catalog knows it.
    fn kind_of(&self, id: &CardId) -> Option<CardKind> {
        self.card(id).map(CatalogCard::kind)
    }
}

/// Catalog snapshot held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    cards: BTreeMap<CardId, CatalogCard>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog page in the card service's `{"cards": [...]}` shape.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or lists an id twice.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_json::from_str(json)?;
        Self::from_cards(raw.cards.into_iter().map(CatalogCard::from))
    }

    /// Build a catalog from already-resolved cards.
    ///
    /// # Errors
    ///
    /// Returns an error if two cards share an id.
    pub fn from_cards(cards: impl IntoIterator<Item = CatalogCard>) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for card in cards {
            let id = card.id().clone();
            if catalog.cards.insert(id.clone(), card).is_some() {
                return Err(CatalogError::DuplicateId(id));
            }
        }
        Ok(catalog)
    }

    /// Insert or replace a card.
    pub fn insert(&mut self, card: CatalogCard) {
        self.cards.insert(card.id().clone(), card);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Character cards in id order.
    pub fn characters(&self) -> impl Iterator<Item = &CharacterCard> {
        self.cards.values().filter_map(|card| match card {
            CatalogCard::Character(character) => Some(character),
            CatalogCard::Action(_) => None,
        })
    }

    /// Action cards in id order.
    pub fn actions(&self) -> impl Iterator<Item = &ActionCard> {
        self.cards.values().filter_map(|card| match card {
            CatalogCard::Action(action) => Some(action),
            CatalogCard::Character(_) => None,
        })
    }
}

impl CardCatalog for InMemoryCatalog {
    fn card(&self, id: &CardId) -> Option<&CatalogCard> {
        self.cards.get(id)
    }

    fn ids_of_kind(&self, kind: CardKind) -> Vec<&CardId> {
        self.cards
            .iter()
            .filter(|(_, card)| card.kind() == kind)
            .map(|(id, _)| id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "cards": [
            {"id": "c1", "name": "胡桃", "type": "角色牌", "title": "雪霁梅香", "element": "火"},
            {"id": "w1", "name": "狼的末路", "type": "武器", "cost": [{"type": "相同", "value": 3}]},
            {"id": "e1", "name": "交给我吧！", "type": "事件", "cost": [], "tags": ["速切"]},
            {"id": "s1", "name": "派蒙", "type": "支援", "cost": [{"type": "相同", "value": 1}, {"type": "任意", "value": 2}]}
        ]
    }"#;

    #[test]
    fn catalog_type_classification() {
        assert_eq!(CardKind::from_catalog_type("角色牌"), CardKind::Character);
        assert_eq!(CardKind::from_catalog_type(" Character "), CardKind::Character);
        assert_eq!(CardKind::from_catalog_type("武器"), CardKind::Action);
        assert_eq!(CardKind::from_catalog_type("支援"), CardKind::Action);
        assert_eq!(CardKind::from_catalog_type("事件"), CardKind::Action);
        assert_eq!(CardKind::from_catalog_type(""), CardKind::Action);
    }

    #[test]
    fn loads_catalog_and_resolves_kinds() {
        let catalog = InMemoryCatalog::from_json(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.kind_of(&"c1".into()), Some(CardKind::Character));
        assert_eq!(catalog.kind_of(&"w1".into()), Some(CardKind::Action));
        assert_eq!(catalog.kind_of(&"missing".into()), None);
        assert_eq!(catalog.characters().count(), 1);
        assert_eq!(catalog.actions().count(), 3);
        assert_eq!(catalog.ids_of_kind(CardKind::Character), [&CardId::from("c1")]);
        assert_eq!(catalog.ids_of_kind(CardKind::Action).len(), 3);

        let Some(CatalogCard::Character(hu_tao)) = catalog.card(&"c1".into()) else {
            panic!("c1 should be a character");
        };
        assert_eq!(hu_tao.title.as_deref(), Some("雪霁梅香"));
    }

    #[test]
    fn display_cost_sums_dice() {
        let catalog = InMemoryCatalog::from_json(SAMPLE).unwrap();
        let cost = |id: &str| catalog.card(&id.into()).map(CatalogCard::display_cost);
        assert_eq!(cost("c1"), Some(0));
        assert_eq!(cost("w1"), Some(3));
        assert_eq!(cost("e1"), Some(0));
        assert_eq!(cost("s1"), Some(3));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let json = r#"{"cards": [
            {"id": "x", "name": "A", "type": "事件"},
            {"id": "x", "name": "B", "type": "事件"}
        ]}"#;
        let err = InMemoryCatalog::from_json(json).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateId(id) if id.as_str() == "x"));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            InMemoryCatalog::from_json("{not json"),
            Err(CatalogError::Parse(_))
        ));
    }
}
