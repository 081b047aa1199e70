use deckforge_core::{
    Composition, DECK_SIZE, DeckBuilderSession, Gesture, MAX_ACTION_CARDS, MAX_CHARACTERS,
    ValidationResult, apply, toggle_action, toggle_character,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

const CHARACTER_POOL: usize = 6;
const ACTION_POOL: usize = 22;

fn random_gesture(rng: &mut ChaCha20Rng) -> Gesture {
    let character = format!("char{}", rng.gen_range(0..CHARACTER_POOL));
    let action = format!("act{}", rng.gen_range(0..ACTION_POOL));
    match rng.gen_range(0..10) {
        0 | 1 => Gesture::ToggleCharacter(character.into()),
        2 => Gesture::RemoveCharacter(character.into()),
        3..=6 => Gesture::ToggleAction(action.into()),
        7 | 8 => Gesture::AddAction(action.into()),
        _ => Gesture::RemoveAction(action.into()),
    }
}

fn assert_shape(comp: &Composition) {
    assert!(comp.character_count() <= MAX_CHARACTERS);
    assert!(comp.action_count() <= MAX_ACTION_CARDS);
    assert!(comp.action_counts().all(|(_, count)| count == 1 || count == 2));
    let by_counts =
        comp.character_count() == MAX_CHARACTERS && comp.action_count() == MAX_ACTION_CARDS;
    assert_eq!(comp.is_complete(), by_counts);
    assert_eq!(comp.is_complete(), comp.total_cards() == DECK_SIZE);
}

#[test]
fn random_gestures_keep_caps_and_fire_once_per_completion() {
    for seed in 0..24_u64 {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut session = DeckBuilderSession::named(format!("sweep-{seed}"));
        let mut was_complete = false;
        let mut completions = 0;
        let mut fired = 0;

        for step in 0..2_000 {
            let update = if step % 500 == 499 {
                session.reset()
            } else {
                session.apply(&random_gesture(&mut rng))
            };
            let comp = session.composition();
            assert_shape(comp);

            if comp.is_complete() && !was_complete {
                completions += 1;
            }
            was_complete = comp.is_complete();

            if let Some(ticket) = update.ticket {
                fired += 1;
                assert!(comp.is_complete());
                // Answer immediately so the stored result tracks completeness.
                session.complete_validation(
                    &ticket,
                    ValidationResult {
                        valid: true,
                        ..ValidationResult::default()
                    },
                );
            }
            assert_eq!(
                session.last_result().is_some(),
                session.composition().is_complete(),
                "seed {seed} step {step}"
            );
        }
        assert_eq!(fired, completions, "seed {seed}");
    }
}

#[test]
fn deselect_after_select_is_identity() {
    let mut rng = ChaCha20Rng::seed_from_u64(0xDEC0);
    let mut comp = Composition::named("deck");
    for _ in 0..500 {
        apply(&mut comp, &random_gesture(&mut rng));
        let id = format!("char{}", rng.gen_range(0..CHARACTER_POOL + 2)).into();
        let selected = toggle_character(&comp, &id);
        if selected.changed() && selected.composition.contains_character(&id) {
            let back = toggle_character(&selected.composition, &id);
            assert_eq!(back.composition, comp);
        }
    }
}

#[test]
fn action_cycle_law_holds_below_cap() {
    let mut rng = ChaCha20Rng::seed_from_u64(0xC1C1E);
    let mut comp = Composition::named("deck");
    for _ in 0..500 {
        apply(&mut comp, &random_gesture(&mut rng));
        let id = format!("fresh{}", rng.gen_range(0..4)).into();
        if comp.count_of(&id) != 0 || comp.action_count() + 2 > MAX_ACTION_CARDS {
            continue;
        }
        let one = toggle_action(&comp, &id);
        let two = toggle_action(&one.composition, &id);
        let zero = toggle_action(&two.composition, &id);
        assert_eq!(zero.composition, comp);
        assert!(one.changed() && two.changed() && zero.changed());
    }
}

#[test]
fn full_action_pool_refuses_new_ids_but_allows_removal() {
    let mut rng = ChaCha20Rng::seed_from_u64(30);
    for _ in 0..50 {
        let mut comp = Composition::new();
        while comp.action_count() < MAX_ACTION_CARDS {
            let id = format!("act{}", rng.gen_range(0..ACTION_POOL));
            apply(&mut comp, &Gesture::AddAction(id.into()));
        }
        let fresh = toggle_action(&comp, &"unseen".into());
        assert!(fresh.capacity_exceeded().is_some());
        assert_eq!(fresh.composition, comp);

        if let Some((doubled, _)) = comp.action_counts().find(|(_, count)| *count == 2) {
            let cleared = toggle_action(&comp, doubled);
            assert!(cleared.changed());
            assert_eq!(cleared.composition.action_count(), MAX_ACTION_CARDS - 2);
        }
    }
}
