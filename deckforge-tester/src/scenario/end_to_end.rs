//! End-to-end deck building flows driven through the async controller.
use anyhow::{Context, Result, bail, ensure};
use async_trait::async_trait;
use colored::Colorize;
use deckforge_client::{ApiError, ClientError, ControllerUpdate, ValidationOutcome};
use deckforge_core::{
    ActionCard, CapacityExceeded, CapacityKind, CardId, CatalogCard, CharacterCard,
    CredentialStore, InMemoryCatalog, MAX_ACTION_CARDS, MAX_CHARACTERS, RuleName, Signal,
    SubmissionError, ValidationResponse,
};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha20Rng;
use std::collections::BTreeMap;

use super::{QaController, Reply, SCENARIO_TIMEOUT, Scenario, ScenarioCtx, ScriptedValidator, controller};

const CHARACTERS: [&str; 3] = ["charA", "charB", "charC"];

/// Select the three characters, then fifteen action ids twice each, in a
/// seed-dependent order.
async fn build_complete(ctl: &QaController, seed: u64) -> Vec<ControllerUpdate> {
    let mut updates = Vec::new();
    for id in CHARACTERS {
        updates.push(ctl.toggle_character(id).await);
    }
    let mut actions: Vec<String> = (0..15).map(|i| format!("act{i:02}")).collect();
    actions.shuffle(&mut ChaCha20Rng::seed_from_u64(seed));
    for id in &actions {
        updates.push(ctl.toggle_action(id.as_str()).await);
        updates.push(ctl.toggle_action(id.as_str()).await);
    }
    updates
}

fn validations(updates: &[ControllerUpdate]) -> usize {
    updates.iter().filter(|u| u.validation.is_some()).count()
}

fn trace(ctx: &ScenarioCtx, line: &str) {
    if ctx.verbose {
        println!("    {} {line}", "↳".dimmed());
    }
}

pub struct CompleteDeck;

#[async_trait]
impl Scenario for CompleteDeck {
    fn name(&self) -> &'static str {
        "Complete Deck Validates Once"
    }

    async fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        let ctl = controller("qa-complete", ScriptedValidator::new());
        let updates = build_complete(&ctl, ctx.seed).await;

        let comp = ctl.snapshot().await;
        ensure!(comp.is_complete(), "deck not complete: {} cards", comp.total_cards());
        ensure!(
            validations(&updates) == 1,
            "expected one validation, saw {}",
            validations(&updates)
        );

        let calls = ctl.client().api().validations();
        let request = calls.first().context("validator never called")?;
        ensure!(
            request.characters == CHARACTERS.map(CardId::from),
            "characters sent as {:?}",
            request.characters
        );
        let mut counts: BTreeMap<&CardId, usize> = BTreeMap::new();
        for id in &request.cards {
            *counts.entry(id).or_default() += 1;
        }
        ensure!(counts.len() == 15, "{} distinct action ids sent", counts.len());
        ensure!(
            counts.values().all(|count| *count == 2),
            "uneven copies: {counts:?}"
        );

        let result = ctl.last_result().await.context("no result stored")?;
        ensure!(result.valid, "complete deck rejected: {:?}", result.errors);
        trace(ctx, &result.summary_lines().join(" | "));
        Ok(())
    }
}

pub struct LoseCompleteness;

#[async_trait]
impl Scenario for LoseCompleteness {
    fn name(&self) -> &'static str {
        "Losing Completeness Clears The Result"
    }

    async fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        let ctl = controller("qa-lose", ScriptedValidator::new());
        build_complete(&ctl, ctx.seed).await;
        ensure!(ctl.last_result().await.is_some(), "no result after completion");

        // A third toggle takes act03 from two copies back to none.
        let update = ctl.toggle_action("act03").await;
        let comp = ctl.snapshot().await;
        ensure!(!comp.is_complete(), "deck still complete");
        ensure!(comp.count_of(&CardId::from("act03")) == 0, "act03 not removed");
        ensure!(comp.total_cards() == 31, "total is {}", comp.total_cards());
        ensure!(update.validation.is_none(), "validation fired on an incomplete deck");
        ensure!(ctl.last_result().await.is_none(), "stale result kept");

        let update = ctl.toggle_action("act03").await;
        ensure!(update.validation.is_none(), "validation fired at 32 cards");
        let update = ctl.toggle_action("act03").await;
        ensure!(
            update.validation.is_some(),
            "regaining completeness did not validate"
        );
        let calls = ctl.client().api().validation_calls();
        ensure!(calls == 2, "expected two validations overall, saw {calls}");
        trace(ctx, "completeness lost and regained");
        Ok(())
    }
}

pub struct CharacterCap;

#[async_trait]
impl Scenario for CharacterCap {
    fn name(&self) -> &'static str {
        "Fourth Character Is Refused"
    }

    async fn run(&self, _ctx: &ScenarioCtx) -> Result<()> {
        let ctl = controller("qa-cap", ScriptedValidator::new());
        for id in CHARACTERS {
            ctl.toggle_character(id).await;
        }
        let before = ctl.snapshot().await;

        let update = ctl.toggle_character("charD").await;
        let expected = Signal::CapacityExceeded(CapacityExceeded {
            kind: CapacityKind::Character,
            card: CardId::from("charD"),
        });
        ensure!(
            update.signals == [expected],
            "unexpected signals {:?}",
            update.signals
        );
        let after = ctl.snapshot().await;
        ensure!(after == before, "composition changed");
        ensure!(after.revision() == before.revision(), "revision bumped");
        ensure!(
            ctl.client().api().validation_calls() == 0,
            "validator called for a partial deck"
        );
        Ok(())
    }
}

/// Validator verdict with a passing character count and a failing card limit.
const CARD_LIMIT_FAILURE: &str = r#"{
    "valid": false,
    "rules": {
        "character_count": {"passed": true, "msg": "角色数量正确"},
        "card_limit": {"passed": false, "msg": "卡牌 act07 超出数量限制"}
    },
    "errors": ["卡牌 act07 超出数量限制"],
    "suggestions": ["减少 act07 的数量"]
}"#;

pub struct RuleFailure;

#[async_trait]
impl Scenario for RuleFailure {
    fn name(&self) -> &'static str {
        "Failing Rule Is Surfaced"
    }

    async fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        let response: ValidationResponse =
            serde_json::from_str(CARD_LIMIT_FAILURE).context("fixture does not parse")?;
        let ctl = controller(
            "qa-rules",
            ScriptedValidator::with_replies([Reply::Fixed(response)]),
        );
        let updates = build_complete(&ctl, ctx.seed).await;
        let report = updates
            .iter()
            .find_map(|u| u.validation.as_ref())
            .context("completion did not validate")?;
        let Some(result) = report.applied_result() else {
            bail!("verdict was not applied: {:?}", report.outcome);
        };
        ensure!(!result.valid, "rejected deck reported as valid");
        let failing: Vec<(RuleName, &str)> = result
            .failing_rules()
            .map(|(name, rule)| (name, rule.message.as_str()))
            .collect();
        ensure!(
            failing == [(RuleName::CardLimit, "卡牌 act07 超出数量限制")],
            "failing rules {failing:?}"
        );
        ensure!(
            result
                .rule(RuleName::CharacterCount)
                .is_some_and(|rule| rule.passed),
            "character count not reported as passing"
        );

        let comp = ctl.snapshot().await;
        ensure!(comp.is_complete(), "verdict altered the composition");
        ensure!(comp.count_of(&CardId::from("act07")) == 2, "act07 copies changed");

        match ctl.save().await {
            Err(ClientError::Submission(SubmissionError::Rejected)) => {}
            other => bail!("save of a rejected deck returned {other:?}"),
        }
        ensure!(ctl.client().api().saved_decks() == 0, "rejected deck was saved");
        ensure!(
            ctl.client().api().validation_calls() == 1,
            "rejected deck was revalidated"
        );
        trace(ctx, &result.summary_lines().join(" | "));
        Ok(())
    }
}

pub struct ExpiredCredential;

#[async_trait]
impl Scenario for ExpiredCredential {
    fn name(&self) -> &'static str {
        "Expired Credential Is Cleared"
    }

    async fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        let ctl = controller(
            "qa-auth",
            ScriptedValidator::with_replies([Reply::Expired]),
        );
        let updates = build_complete(&ctl, ctx.seed).await;
        let report = updates
            .iter()
            .find_map(|u| u.validation.as_ref())
            .context("completion did not validate")?;
        ensure!(
            report.outcome.is_auth_failure(),
            "expected an auth failure, got {:?}",
            report.outcome
        );
        ensure!(report.acceptance.is_none(), "auth failure was stored as a verdict");
        ensure!(ctl.last_result().await.is_none(), "auth failure left a result");
        ensure!(
            ctl.client().credentials().token()?.is_none(),
            "credential survived the auth failure"
        );

        let calls = ctl.client().api().validation_calls();
        match ctl.save().await {
            Err(ClientError::NotSignedIn) => {}
            other => bail!("save without a credential returned {other:?}"),
        }
        ensure!(
            ctl.client().api().validation_calls() == calls,
            "save without a credential reached the validator"
        );

        ctl.client().credentials().store_token(super::QA_TOKEN)?;
        let receipt = ctl.save().await.context("save after signing in again")?;
        ensure!(receipt.deck_id.is_some(), "receipt without a deck id");
        Ok(())
    }
}

pub struct SlowValidator;

#[async_trait]
impl Scenario for SlowValidator {
    fn name(&self) -> &'static str {
        "Validator Timeout Is A Request Failure"
    }

    async fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        let ctl = controller(
            "qa-slow",
            ScriptedValidator::with_replies([Reply::Delayed(SCENARIO_TIMEOUT * 4)]),
        );
        let updates = build_complete(&ctl, ctx.seed).await;
        let report = updates
            .iter()
            .find_map(|u| u.validation.as_ref())
            .context("completion did not validate")?;
        ensure!(
            report.outcome == ValidationOutcome::RequestFailure(ApiError::Timeout),
            "expected a timeout, got {:?}",
            report.outcome
        );
        ensure!(ctl.last_result().await.is_none(), "timeout left a result");
        ensure!(
            ctl.client().credentials().token()?.is_some(),
            "timeout cleared the credential"
        );

        let retry = ctl.validate_now().await?;
        ensure!(
            retry.applied_result().is_some_and(|result| result.valid),
            "manual retry failed: {:?}",
            retry.outcome
        );
        Ok(())
    }
}

pub struct ServerFailure;

#[async_trait]
impl Scenario for ServerFailure {
    fn name(&self) -> &'static str {
        "Server Error Then Save"
    }

    async fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        let ctl = controller(
            "qa-server",
            ScriptedValidator::with_replies([Reply::ServerError]),
        );
        let updates = build_complete(&ctl, ctx.seed).await;
        let report = updates
            .iter()
            .find_map(|u| u.validation.as_ref())
            .context("completion did not validate")?;
        ensure!(
            matches!(
                report.outcome,
                ValidationOutcome::RequestFailure(ApiError::Status { status: 500, .. })
            ),
            "expected a server error, got {:?}",
            report.outcome
        );
        ensure!(ctl.last_result().await.is_none(), "server error left a result");

        let receipt = ctl.save().await.context("save after a server error")?;
        ensure!(receipt.deck_id.is_some(), "receipt without a deck id");
        ensure!(
            ctl.client().api().validation_calls() == 2,
            "save did not revalidate exactly once"
        );
        Ok(())
    }
}

pub struct SaveFlow;

#[async_trait]
impl Scenario for SaveFlow {
    fn name(&self) -> &'static str {
        "Save Update List Delete"
    }

    async fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        let ctl = controller("qa-save", ScriptedValidator::new());
        build_complete(&ctl, ctx.seed).await;
        let receipt = ctl.save().await.context("first save")?;
        let deck_id = receipt.deck_id.context("receipt without a deck id")?;

        ctl.set_description(Some("qa notes".to_string())).await;
        ctl.update(deck_id.clone()).await.context("update after description change")?;
        ensure!(
            ctl.client().api().validation_calls() == 1,
            "description change forced a revalidation"
        );

        let update = ctl.set_name("qa-save renamed").await;
        ensure!(update.validation.is_some(), "rename did not revalidate");
        ctl.update(deck_id.clone()).await.context("update after rename")?;

        let page = ctl.list_decks(1, 10).await?;
        let listed = page.decks.first().context("saved deck not listed")?;
        ensure!(listed.name == "qa-save renamed", "listed as '{}'", listed.name);
        ensure!(
            listed.cards.len() == 33,
            "listed with {} cards",
            listed.cards.len()
        );
        ensure!(!page.pagination.has_next(), "unexpected second page");

        ctl.delete_deck(&deck_id).await?;
        ensure!(ctl.list_decks(1, 10).await?.decks.is_empty(), "deck not deleted");
        match ctl.delete_deck(&deck_id).await {
            Err(ClientError::Request(ApiError::Status { status: 404, .. })) => {}
            other => bail!("second delete returned {other:?}"),
        }
        trace(ctx, &format!("deck {deck_id} saved, updated and deleted"));
        Ok(())
    }
}

/// Five characters and thirty-six action cards.
fn draw_catalog() -> Result<InMemoryCatalog> {
    let characters = ["charA", "charB", "charC", "charD", "charE"].map(|id| {
        CatalogCard::Character(CharacterCard {
            id: CardId::from(id),
            name: id.to_string(),
            title: None,
            element: None,
            country: None,
            weapon_type: None,
            health: Some(10),
            energy: Some(2),
        })
    });
    let actions = (0..36).map(|i| {
        CatalogCard::Action(ActionCard {
            id: CardId::from(format!("act{i:02}")),
            name: format!("行动牌{i}"),
            card_type: "事件".to_string(),
            cost: Vec::new(),
            tags: Vec::new(),
        })
    });
    Ok(InMemoryCatalog::from_cards(characters.into_iter().chain(actions))?)
}

pub struct RandomFill;

#[async_trait]
impl Scenario for RandomFill {
    fn name(&self) -> &'static str {
        "Random Fill Validates Once"
    }

    async fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        let catalog = draw_catalog()?;
        let mut rng = ChaCha20Rng::seed_from_u64(ctx.seed);
        let ctl = controller("qa-random", ScriptedValidator::new());

        let first = ctl
            .random_characters(&catalog, MAX_CHARACTERS, &mut rng)
            .await;
        ensure!(first.validation.is_none(), "characters alone validated");
        let fill = ctl.random_actions(&catalog, 30, &mut rng).await;
        let report = fill.validation.context("random fill did not validate")?;
        ensure!(
            report.applied_result().is_some_and(|result| result.valid),
            "random deck rejected: {:?}",
            report.outcome
        );
        ensure!(
            ctl.client().api().validation_calls() == 1,
            "expected one validation, saw {}",
            ctl.client().api().validation_calls()
        );

        let mut validations = 1;
        for round in 0..8 {
            let update = if round % 2 == 0 {
                ctl.random_actions(&catalog, 3, &mut rng).await
            } else {
                ctl.random_characters(&catalog, 1, &mut rng).await
            };
            validations += usize::from(update.validation.is_some());
            ensure!(
                update
                    .signals
                    .iter()
                    .all(|signal| matches!(signal, Signal::CountChanged { .. })),
                "swap was refused: {:?}",
                update.signals
            );
            let comp = ctl.snapshot().await;
            ensure!(comp.character_count() <= MAX_CHARACTERS, "too many characters");
            ensure!(comp.action_count() <= MAX_ACTION_CARDS, "too many action cards");
        }
        ensure!(
            ctl.client().api().validation_calls() == validations,
            "validator calls and completions disagree"
        );
        trace(ctx, &format!("{validations} validations over the random swaps"));
        Ok(())
    }
}
