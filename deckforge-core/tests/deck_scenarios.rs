use std::collections::BTreeMap;

use deckforge_core::constants::{NOTICE_CHARACTER_CAP, NOTICE_EMPTY_DECK};
use deckforge_core::{
    Acceptance, ActionCard, CapacityKind, CardCatalog, CardId, CardKind, CatalogCard,
    CharacterCard, DeckBuilderSession, InMemoryCatalog, RuleName, SessionUpdate, Signal,
    SubmissionError, TicketOrigin, TriggerState, UnknownCard, ValidationResponse,
    ValidationResult,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::from_json(include_str!("../data/catalog.json")).unwrap()
}

fn tickets(updates: &[SessionUpdate]) -> usize {
    updates.iter().filter(|u| u.ticket.is_some()).count()
}

/// Three characters and fifteen action ids taken twice each.
fn scenario_a() -> (DeckBuilderSession, Vec<SessionUpdate>) {
    let mut session = DeckBuilderSession::named("scenario");
    let mut updates = Vec::new();
    for c in ["charA", "charB", "charC"] {
        updates.push(session.toggle_character(c));
    }
    for i in 0..15 {
        let id = format!("act{i:02}");
        updates.push(session.toggle_action(id.as_str()));
        updates.push(session.toggle_action(id.as_str()));
    }
    (session, updates)
}

#[test]
fn scenario_a_complete_deck_validates_once() {
    let (session, updates) = scenario_a();
    let comp = session.composition();
    assert!(comp.is_complete());
    assert_eq!(comp.total_cards(), 33);
    assert_eq!(tickets(&updates), 1);

    let ticket = updates.iter().find_map(|u| u.ticket.clone()).unwrap();
    let characters: Vec<&str> = ticket.request.characters.iter().map(CardId::as_str).collect();
    assert_eq!(characters, ["charA", "charB", "charC"]);

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for id in &ticket.request.cards {
        *counts.entry(id.as_str()).or_default() += 1;
    }
    assert_eq!(counts.len(), 15);
    assert!(counts.values().all(|count| *count == 2));
    for pair in ticket.request.cards.chunks(2) {
        assert_eq!(pair[0], pair[1]);
    }
    assert_eq!(
        session.trigger_state(),
        TriggerState::Pending {
            revision: comp.revision()
        }
    );
}

#[test]
fn scenario_b_losing_completeness_clears_result() {
    let (mut session, updates) = scenario_a();
    let ticket = updates.into_iter().find_map(|u| u.ticket).unwrap();
    let result = ValidationResult {
        valid: true,
        ..ValidationResult::default()
    };
    assert_eq!(
        session.complete_validation(&ticket, result),
        Acceptance::Applied
    );
    assert!(session.last_result().is_some());

    let update = session.toggle_action("act03");
    assert_eq!(
        update.signals,
        vec![Signal::CountChanged {
            id: "act03".into(),
            kind: CardKind::Action,
            count: 0
        }]
    );
    assert!(update.cleared);
    assert!(update.ticket.is_none());
    assert!(!session.composition().is_complete());
    assert_eq!(session.composition().total_cards(), 31);
    assert_eq!(session.composition().action_count(), 28);
    assert!(session.last_result().is_none());

    // One copy back is still short; the second copy fires again.
    assert!(session.toggle_action("act03").ticket.is_none());
    assert!(session.toggle_action("act03").ticket.is_some());
}

#[test]
fn scenario_b_single_copy_drop_reports_twenty_nine() {
    let (mut session, _) = scenario_a();
    session.remove_action("act00");
    assert_eq!(session.composition().action_count(), 29);
    assert!(!session.composition().is_complete());
}

#[test]
fn scenario_c_fourth_character_is_refused() {
    let (mut session, _) = scenario_a();
    let before = session.composition().clone();
    let revision = before.revision();

    let update = session.toggle_character("charD");
    assert!(!update.changed());
    assert!(update.ticket.is_none());
    assert!(!update.cleared);
    let err = update.capacity_exceeded().unwrap();
    assert_eq!(err.kind, CapacityKind::Character);
    assert_eq!(err.kind.notice(), NOTICE_CHARACTER_CAP);
    assert_eq!(session.composition(), &before);
    assert_eq!(session.composition().revision(), revision);
}

#[test]
fn scenario_d_rule_failure_is_surfaced_untouched() {
    let (mut session, updates) = scenario_a();
    let ticket = updates.into_iter().find_map(|u| u.ticket).unwrap();
    let before = session.composition().clone();

    let response: ValidationResponse = serde_json::from_str(
        r#"{
            "valid": false,
            "rules": {
                "character_count": {"passed": true, "msg": "角色数量正确"},
                "card_limit": {"passed": false, "msg": "act00 超过上限"}
            },
            "errors": ["act00 超过上限"]
        }"#,
    )
    .unwrap();
    session.complete_validation(&ticket, response.into());

    let result = session.last_result().unwrap();
    assert!(!result.valid);
    let failing: Vec<_> = result.failing_rules().collect();
    assert_eq!(failing.len(), 1);
    assert_eq!(failing[0].0, RuleName::CardLimit);
    assert_eq!(failing[0].1.message, "act00 超过上限");
    assert!(result.rule(RuleName::CharacterCount).unwrap().passed);
    assert_eq!(result.errors, ["act00 超过上限"]);

    assert_eq!(session.composition(), &before);
    assert_eq!(session.persist_request(), Err(SubmissionError::Rejected));
    assert!(!session.needs_revalidation());
}

#[test]
fn stale_response_after_edit_is_discarded() {
    let (mut session, updates) = scenario_a();
    let ticket = updates.into_iter().find_map(|u| u.ticket).unwrap();
    session.toggle_character("charA");
    let outcome = session.complete_validation(
        &ticket,
        ValidationResult {
            valid: true,
            ..ValidationResult::default()
        },
    );
    assert!(matches!(outcome, Acceptance::Stale { .. }));
    assert!(session.last_result().is_none());
}

#[test]
fn rename_of_complete_deck_revalidates() {
    let (mut session, updates) = scenario_a();
    let first = updates.into_iter().find_map(|u| u.ticket).unwrap();
    let rename = session.set_name("新名字");
    let second = rename.ticket.unwrap();
    assert_eq!(second.origin, TicketOrigin::Auto);
    assert_ne!(second.revision, first.revision);
    assert_eq!(second.request.deck_name, "新名字");

    // Same name again is not a change.
    assert!(session.set_name("新名字").ticket.is_none());
}

#[test]
fn catalog_fixture_builds_a_listed_deck() {
    let catalog = catalog();
    let characters: Vec<CardId> = catalog.characters().take(3).map(|c| c.id.clone()).collect();
    let actions: Vec<CardId> = catalog.actions().take(15).map(|a| a.id.clone()).collect();
    assert_eq!(actions.len(), 15);

    let mut session = DeckBuilderSession::named("璃月");
    assert_eq!(session.listing(&catalog).lines(), [NOTICE_EMPTY_DECK]);
    for id in &characters {
        assert_eq!(catalog.kind_of(id), Some(CardKind::Character));
        session.toggle_character(id.clone());
    }
    for id in &actions {
        session.add_action(id.clone());
        session.add_action(id.clone());
    }
    assert!(session.composition().is_complete());

    let listing = session.listing(&catalog);
    assert!(listing.complete);
    assert_eq!(listing.character_counter, "3/3");
    assert_eq!(listing.action_counter, "30/30");
    assert_eq!(listing.characters.len(), 3);
    assert_eq!(listing.actions.len(), 15);
    assert!(listing.actions.iter().all(|line| line.count == 2));
    assert!(session.composition().total_cost(&catalog) > 0);
}

#[test]
fn whitespace_rename_keeps_the_accepted_result() {
    let (mut session, updates) = scenario_a();
    let ticket = updates.into_iter().find_map(|u| u.ticket).unwrap();
    let applied = session.complete_validation(
        &ticket,
        ValidationResult {
            valid: true,
            ..ValidationResult::default()
        },
    );
    assert_eq!(applied, Acceptance::Applied);

    let update = session.set_name("scenario  ");
    assert!(update.ticket.is_none());
    assert!(!update.cleared);
    assert_eq!(session.composition().revision(), ticket.revision);
    assert!(session.persist_request().is_ok());
}

#[test]
fn catalog_pick_follows_the_card_kind() {
    let catalog = catalog();
    let mut session = DeckBuilderSession::named("蒙德");
    let hu_tao = CardId::from("char-hutao");
    let paimon = CardId::from("act-paimon");

    let picked = session.pick(&catalog, &hu_tao).unwrap();
    assert_eq!(
        picked.signals,
        vec![Signal::CountChanged {
            id: hu_tao.clone(),
            kind: CardKind::Character,
            count: 1
        }]
    );
    session.pick(&catalog, &paimon).unwrap();
    session.pick(&catalog, &paimon).unwrap();
    assert_eq!(session.composition().count_of(&paimon), 2);
    assert_eq!(session.pick(&catalog, &paimon).unwrap().signals.len(), 1);
    assert_eq!(session.composition().count_of(&paimon), 0);

    assert_eq!(
        session.pick(&catalog, &CardId::from("missing")),
        Err(UnknownCard(CardId::from("missing")))
    );

    // The same id cannot also be taken as an action card.
    for _ in 0..2 {
        let refused = session.toggle_action(hu_tao.clone());
        assert_eq!(
            refused.signals,
            vec![Signal::KindMismatch {
                id: hu_tao.clone(),
                selected_as: CardKind::Character
            }]
        );
    }
    let comp = session.composition();
    assert_eq!(comp.count_of(&hu_tao), 1);
    assert_eq!(comp.total_cards(), 1);
    assert!(comp.flattened_actions().is_empty());
}

fn wide_catalog() -> InMemoryCatalog {
    let characters = (0..5).map(|i| {
        CatalogCard::Character(CharacterCard {
            id: CardId::from(format!("char{i}")),
            name: format!("角色{i}"),
            title: None,
            element: None,
            country: None,
            weapon_type: None,
            health: Some(10),
            energy: Some(3),
        })
    });
    let actions = (0..36).map(|i| {
        CatalogCard::Action(ActionCard {
            id: CardId::from(format!("act{i:02}")),
            name: format!("行动{i}"),
            card_type: "支援".into(),
            cost: Vec::new(),
            tags: Vec::new(),
        })
    });
    InMemoryCatalog::from_cards(characters.chain(actions)).unwrap()
}

#[test]
fn random_fill_completing_a_deck_validates_once() {
    let catalog = wide_catalog();
    for seed in 0..12 {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut session = DeckBuilderSession::named("随机");
        let updates = [
            session.random_characters(&catalog, 3, &mut rng),
            session.random_actions(&catalog, 30, &mut rng),
        ];
        let comp = session.composition();
        assert!(comp.is_complete(), "seed {seed}");
        assert_eq!(tickets(&updates), 1, "seed {seed}");
        let ticket = updates[1].ticket.as_ref().unwrap();
        assert_eq!(ticket.origin, TicketOrigin::Auto);
        assert_eq!(ticket.request.cards.len(), 30);
        assert!(updates.iter().all(|u| u.capacity_exceeded().is_none()));
    }
}

#[test]
fn random_swaps_on_a_full_deck_respect_every_cap() {
    let catalog = wide_catalog();
    let mut rng = ChaCha20Rng::seed_from_u64(2024);
    let (mut session, _) = scenario_a();
    for round in 0..40 {
        let update = if round % 3 == 0 {
            session.random_characters(&catalog, 3, &mut rng)
        } else {
            session.random_actions(&catalog, 4, &mut rng)
        };
        let comp = session.composition();
        assert!(comp.character_count() <= 3);
        assert!(comp.action_count() <= 30);
        assert!(comp.action_counts().all(|(_, count)| count <= 2));
        assert!(update.ticket.is_none() || comp.is_complete());
    }
}
