//! Randomized gesture sweeps over the controller.
use anyhow::{Result, ensure};
use async_trait::async_trait;
use deckforge_core::{
    CapacityKind, CardId, Composition, DECK_SIZE, Gesture, MAX_ACTION_CARDS, MAX_CHARACTERS,
    Signal,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use super::{Scenario, ScenarioCtx, ScriptedValidator, controller};

const CHARACTER_POOL: usize = 6;
const ACTION_POOL: usize = 20;
const SWEEP_STEPS: usize = 600;
const RESET_EVERY: usize = 150;

fn random_gesture(rng: &mut ChaCha20Rng) -> Gesture {
    let character = format!("char{}", rng.gen_range(0..CHARACTER_POOL));
    let action = format!("act{:02}", rng.gen_range(0..ACTION_POOL));
    match rng.gen_range(0..10) {
        0 | 1 => Gesture::ToggleCharacter(character.into()),
        2 => Gesture::RemoveCharacter(character.into()),
        3..=6 => Gesture::ToggleAction(action.into()),
        7 | 8 => Gesture::AddAction(action.into()),
        _ => Gesture::RemoveAction(action.into()),
    }
}

fn check_shape(comp: &Composition) -> Result<()> {
    ensure!(
        comp.character_count() <= MAX_CHARACTERS,
        "{} characters",
        comp.character_count()
    );
    ensure!(
        comp.action_count() <= MAX_ACTION_CARDS,
        "{} action cards",
        comp.action_count()
    );
    ensure!(
        comp.action_counts().all(|(_, count)| count == 1 || count == 2),
        "copy count outside 1..=2"
    );
    let by_counts =
        comp.character_count() == MAX_CHARACTERS && comp.action_count() == MAX_ACTION_CARDS;
    ensure!(
        comp.is_complete() == by_counts && by_counts == (comp.total_cards() == DECK_SIZE),
        "completeness disagrees with the counts at {} cards",
        comp.total_cards()
    );
    Ok(())
}

pub struct InvariantSweep;

#[async_trait]
impl Scenario for InvariantSweep {
    fn name(&self) -> &'static str {
        "Randomized Gesture Sweep"
    }

    async fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        let mut rng = ChaCha20Rng::seed_from_u64(ctx.seed);
        let ctl = controller(&format!("sweep-{}", ctx.seed), ScriptedValidator::new());
        let mut was_complete = false;
        let mut completions = 0;

        for step in 0..SWEEP_STEPS {
            let update = if step % RESET_EVERY == RESET_EVERY - 1 {
                ctl.reset().await
            } else {
                ctl.apply(random_gesture(&mut rng)).await
            };
            let comp = ctl.snapshot().await;
            check_shape(&comp)?;

            let entered = comp.is_complete() && !was_complete;
            if entered {
                completions += 1;
            }
            ensure!(
                update.validation.is_some() == entered,
                "step {step}: validation {} on a {} transition",
                if update.validation.is_some() { "fired" } else { "missing" },
                if entered { "completing" } else { "non-completing" }
            );
            ensure!(
                ctl.last_result().await.is_some() == comp.is_complete(),
                "step {step}: stored result does not track completeness"
            );
            was_complete = comp.is_complete();
        }

        let calls = ctl.client().api().validation_calls();
        ensure!(
            calls == completions,
            "{calls} validations for {completions} completions"
        );
        if ctx.verbose {
            println!("    seed {}: {completions} completions", ctx.seed);
        }
        Ok(())
    }
}

pub struct ToggleLaws;

#[async_trait]
impl Scenario for ToggleLaws {
    fn name(&self) -> &'static str {
        "Toggle Laws"
    }

    async fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        let mut rng = ChaCha20Rng::seed_from_u64(ctx.seed);
        let ctl = controller("laws", ScriptedValidator::new());

        // A random partial deck far from every cap.
        for _ in 0..rng.gen_range(0..3) {
            let id = format!("char{}", rng.gen_range(0..CHARACTER_POOL));
            ctl.toggle_character(id.as_str()).await;
        }
        for _ in 0..rng.gen_range(0..20) {
            let id = format!("act{:02}", rng.gen_range(0..ACTION_POOL));
            ctl.apply(Gesture::AddAction(id.into())).await;
        }
        let base = ctl.snapshot().await;
        check_shape(&base)?;

        let fresh_character = (0..CHARACTER_POOL)
            .map(|i| CardId::new(format!("char{i}")))
            .find(|id| !base.contains_character(id));
        if base.character_count() < MAX_CHARACTERS
            && let Some(id) = fresh_character
        {
            ctl.toggle_character(id.clone()).await;
            ctl.toggle_character(id.clone()).await;
            ensure!(ctl.snapshot().await == base, "deselecting {id} did not restore the deck");
        }

        if base.action_count() + 2 <= MAX_ACTION_CARDS {
            let id = CardId::new("act-cycle");
            for _ in 0..3 {
                ctl.toggle_action(id.clone()).await;
            }
            ensure!(ctl.snapshot().await == base, "0-1-2-0 cycle did not restore the deck");
        }

        // Fill the action pool, then check both sides of the 30-card cap.
        ctl.reset().await;
        for i in 0..15 {
            let id = format!("full{i:02}");
            ctl.apply(Gesture::AddAction(id.as_str().into())).await;
            ctl.apply(Gesture::AddAction(id.as_str().into())).await;
        }
        let full = ctl.snapshot().await;
        ensure!(full.action_count() == MAX_ACTION_CARDS, "pool not full");

        let refused = ctl.toggle_action("overflow").await;
        ensure!(
            matches!(
                refused.signals.as_slice(),
                [Signal::CapacityExceeded(exceeded)] if exceeded.kind == CapacityKind::ActionTotal
            ),
            "31st card not refused: {:?}",
            refused.signals
        );
        ensure!(ctl.snapshot().await == full, "refused pick changed the deck");

        ctl.toggle_action("full00").await;
        let after = ctl.snapshot().await;
        ensure!(
            after.action_count() == MAX_ACTION_CARDS - 2,
            "removal left {} action cards",
            after.action_count()
        );
        Ok(())
    }
}
