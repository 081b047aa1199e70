//! Selection toggle engine.
//!
//! Every user pick is a [`Gesture`]. Applying a gesture either changes the
//! composition and reports the new per-card count, or leaves it untouched
//! and reports why. Capacity signals are advisory: the caller shows the
//! notice and carries on.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::card::{CardId, CardKind};
use crate::composition::Composition;
use crate::constants::{
    MAX_ACTION_CARDS, MAX_CHARACTERS, MAX_COPIES_PER_ACTION, NOTICE_ACTION_COPY_CAP,
    NOTICE_ACTION_TOTAL_CAP, NOTICE_CHARACTER_CAP, debug_log_enabled,
};

/// Which structural cap blocked a pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityKind {
    /// A fourth distinct character.
    Character,
    /// A 31st action card.
    ActionTotal,
    /// A third copy of one action card.
    Copies,
}

impl CapacityKind {
    /// User-facing notice for this cap.
    #[must_use]
    pub const fn notice(self) -> &'static str {
        match self {
            Self::Character => NOTICE_CHARACTER_CAP,
            Self::ActionTotal => NOTICE_ACTION_TOTAL_CAP,
            Self::Copies => NOTICE_ACTION_COPY_CAP,
        }
    }
}

/// A pick was refused because it would break a deck cap.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{} ({card})", .kind.notice())]
pub struct CapacityExceeded {
    pub kind: CapacityKind,
    pub card: CardId,
}

/// A discrete user pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "gesture", content = "card", rename_all = "snake_case")]
pub enum Gesture {
    /// Select or unselect a character.
    ToggleCharacter(CardId),
    /// Walk an action card through 0 → 1 → 2 → 0.
    ToggleAction(CardId),
    /// Stepper `+` on an action card.
    AddAction(CardId),
    /// Stepper `−` on an action card.
    RemoveAction(CardId),
    /// Explicitly drop a character.
    RemoveCharacter(CardId),
}

impl Gesture {
    /// The toggle a click on a card of `kind` performs.
    #[must_use]
    pub const fn toggle(kind: CardKind, id: CardId) -> Self {
        match kind {
            CardKind::Character => Self::ToggleCharacter(id),
            CardKind::Action => Self::ToggleAction(id),
        }
    }

    #[must_use]
    pub const fn card(&self) -> &CardId {
        match self {
            Self::ToggleCharacter(id)
            | Self::ToggleAction(id)
            | Self::AddAction(id)
            | Self::RemoveAction(id)
            | Self::RemoveCharacter(id) => id,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> CardKind {
        match self {
            Self::ToggleCharacter(_) | Self::RemoveCharacter(_) => CardKind::Character,
            Self::ToggleAction(_) | Self::AddAction(_) | Self::RemoveAction(_) => CardKind::Action,
        }
    }
}

/// Event emitted by a gesture for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum Signal {
    /// The selected count of `id` changed; refresh its counter.
    CountChanged { id: CardId, kind: CardKind, count: u8 },
    /// The pick was refused; nothing changed.
    CapacityExceeded(CapacityExceeded),
    /// The id is already in the deck as the other kind; nothing changed.
    KindMismatch { id: CardId, selected_as: CardKind },
}

/// Result of a pure transition: the next composition plus its signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub composition: Composition,
    pub signals: Vec<Signal>,
}

impl Transition {
    /// Whether the gesture changed the deck.
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

/// Select `id` if absent and a slot is free, unselect it if present.
#[must_use]
pub fn toggle_character(comp: &Composition, id: &CardId) -> Transition {
    transition(comp, &Gesture::ToggleCharacter(id.clone()))
}

/// Cycle the copies of `id` through 0 → 1 → 2 → 0.
#[must_use]
pub fn toggle_action(comp: &Composition, id: &CardId) -> Transition {
    transition(comp, &Gesture::ToggleAction(id.clone()))
}

/// Pure form of [`apply`]: the input composition is left as it was.
#[must_use]
pub fn transition(comp: &Composition, gesture: &Gesture) -> Transition {
    let mut composition = comp.clone();
    let signals = apply(&mut composition, gesture);
    Transition {
        composition,
        signals,
    }
}

/// Apply a gesture in place. A refused gesture leaves `comp` untouched.
pub fn apply(comp: &mut Composition, gesture: &Gesture) -> Vec<Signal> {
    let id = gesture.card();
    let kind = gesture.kind();
    if let Some(selected_as) = selected_as_other_kind(comp, gesture) {
        log::debug!("selection refused: {id} is already a {selected_as} card");
        return vec![Signal::KindMismatch {
            id: id.clone(),
            selected_as,
        }];
    }
    let outcome = match gesture {
        Gesture::ToggleCharacter(id) => step_toggle_character(comp, id),
        Gesture::ToggleAction(id) => step_toggle_action(comp, id),
        Gesture::AddAction(id) => step_add_action(comp, id),
        Gesture::RemoveAction(id) => Ok(step_remove_action(comp, id)),
        Gesture::RemoveCharacter(id) => Ok(comp.remove_character_inner(id).then_some(0)),
    };

    match outcome {
        Ok(Some(count)) => {
            if debug_log_enabled() {
                println!(
                    "Selection | {gesture:?} -> {id} x{count} (total {}, rev {})",
                    comp.total_cards(),
                    comp.revision()
                );
            }
            vec![Signal::CountChanged {
                id: id.clone(),
                kind,
                count,
            }]
        }
        Ok(None) => Vec::new(),
        Err(err) => {
            log::debug!("selection refused: {err}");
            vec![Signal::CapacityExceeded(err)]
        }
    }
}

/// An id lives on one side of the deck only. Adding gestures for the other
/// side are refused; removals of an absent id stay no-ops.
fn selected_as_other_kind(comp: &Composition, gesture: &Gesture) -> Option<CardKind> {
    match gesture {
        Gesture::ToggleCharacter(id) if comp.action_copies(id) > 0 => Some(CardKind::Action),
        Gesture::ToggleAction(id) | Gesture::AddAction(id) if comp.contains_character(id) => {
            Some(CardKind::Character)
        }
        _ => None,
    }
}

fn step_toggle_character(
    comp: &mut Composition,
    id: &CardId,
) -> Result<Option<u8>, CapacityExceeded> {
    if comp.remove_character_inner(id) {
        return Ok(Some(0));
    }
    if comp.character_count() >= MAX_CHARACTERS {
        return Err(CapacityExceeded {
            kind: CapacityKind::Character,
            card: id.clone(),
        });
    }
    comp.insert_character(id.clone());
    Ok(Some(1))
}

fn step_toggle_action(
    comp: &mut Composition,
    id: &CardId,
) -> Result<Option<u8>, CapacityExceeded> {
    let current = comp.action_copies(id);
    if current >= MAX_COPIES_PER_ACTION {
        // Third click clears the card; removal is never capacity-blocked.
        comp.set_action_count(id, 0);
        return Ok(Some(0));
    }
    ensure_action_room(comp, id)?;
    comp.set_action_count(id, current + 1);
    Ok(Some(current + 1))
}

fn step_add_action(
    comp: &mut Composition,
    id: &CardId,
) -> Result<Option<u8>, CapacityExceeded> {
    let current = comp.action_copies(id);
    if current >= MAX_COPIES_PER_ACTION {
        return Err(CapacityExceeded {
            kind: CapacityKind::Copies,
            card: id.clone(),
        });
    }
    ensure_action_room(comp, id)?;
    comp.set_action_count(id, current + 1);
    Ok(Some(current + 1))
}

fn step_remove_action(comp: &mut Composition, id: &CardId) -> Option<u8> {
    let current = comp.action_copies(id);
    if current == 0 {
        return None;
    }
    comp.set_action_count(id, current - 1);
    Some(current - 1)
}

fn ensure_action_room(comp: &Composition, id: &CardId) -> Result<(), CapacityExceeded> {
    if comp.action_count() >= MAX_ACTION_CARDS {
        return Err(CapacityExceeded {
            kind: CapacityKind::ActionTotal,
            card: id.clone(),
        });
    }
    Ok(())
}
