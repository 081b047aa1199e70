//! Random character and action-card picks.
//!
//! A draw takes up to `count` distinct cards of one kind from the catalog and
//! feeds each one through the selection engine, so every deck cap still
//! holds. Free slots are filled first. Once a side is full, a randomly chosen
//! selected entry is swapped out for the drawn card; for action cards every
//! copy of the swapped-out id goes.
use rand::Rng;
use rand::seq::SliceRandom;

use crate::card::{CardCatalog, CardId, CardKind};
use crate::composition::Composition;
use crate::constants::{MAX_ACTION_CARDS, MAX_CHARACTERS, MAX_COPIES_PER_ACTION};
use crate::selection::{Gesture, Signal, apply};

/// Up to `count` distinct catalog ids of `kind`, in random order.
pub fn draw_ids<R>(
    catalog: &impl CardCatalog,
    kind: CardKind,
    count: usize,
    rng: &mut R,
) -> Vec<CardId>
where
    R: Rng + ?Sized,
{
    let mut ids: Vec<CardId> = catalog.ids_of_kind(kind).into_iter().cloned().collect();
    ids.shuffle(rng);
    ids.truncate(count);
    ids
}

/// Draw `count` characters into `comp`. Drawn ids already in the deck are
/// skipped.
pub fn random_characters<R>(
    comp: &mut Composition,
    catalog: &impl CardCatalog,
    count: usize,
    rng: &mut R,
) -> Vec<Signal>
where
    R: Rng + ?Sized,
{
    let mut signals = Vec::new();
    for id in draw_ids(catalog, CardKind::Character, count, rng) {
        if comp.contains_character(&id) || comp.action_copies(&id) > 0 {
            continue;
        }
        if comp.character_count() >= MAX_CHARACTERS {
            let Some(out) = comp.characters().choose(rng).cloned() else {
                continue;
            };
            log::debug!("random pick swaps character {out} for {id}");
            signals.extend(apply(comp, &Gesture::RemoveCharacter(out)));
        }
        signals.extend(apply(comp, &Gesture::ToggleCharacter(id)));
    }
    signals
}

/// Draw `count` action cards into `comp`, one copy each. A drawn card
/// already at two copies is left alone while the pool has room.
pub fn random_actions<R>(
    comp: &mut Composition,
    catalog: &impl CardCatalog,
    count: usize,
    rng: &mut R,
) -> Vec<Signal>
where
    R: Rng + ?Sized,
{
    let mut signals = Vec::new();
    for id in draw_ids(catalog, CardKind::Action, count, rng) {
        if comp.contains_character(&id) {
            continue;
        }
        if comp.action_count() < MAX_ACTION_CARDS {
            if comp.action_copies(&id) < MAX_COPIES_PER_ACTION {
                signals.extend(apply(comp, &Gesture::AddAction(id)));
            }
            continue;
        }

        let selected: Vec<CardId> = comp.action_counts().map(|(id, _)| id.clone()).collect();
        let Some(out) = selected.choose(rng).cloned() else {
            continue;
        };
        log::debug!("random pick swaps action {out} for {id}");
        for _ in 0..comp.action_copies(&out) {
            signals.extend(apply(comp, &Gesture::RemoveAction(out.clone())));
        }
        if comp.action_copies(&id) < MAX_COPIES_PER_ACTION {
            signals.extend(apply(comp, &Gesture::AddAction(id)));
        }
    }
    signals
}
