use anyhow::Result;
use deckforge_client::{BuilderController, MemoryCredentials, ValidationClient};
use deckforge_core::DeckBuilderSession;
use std::time::Duration;

pub mod end_to_end;
pub mod scripted;
pub mod sweep;

pub use scripted::{QA_TOKEN, QA_USER, Reply, ScriptedValidator};

/// Client timeout used by every scenario controller.
pub const SCENARIO_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy)]
pub struct ScenarioCtx {
    pub seed: u64,
    pub verbose: bool,
}

pub type QaController = BuilderController<ScriptedValidator, MemoryCredentials>;

/// Controller over `validator` for a named, signed-in session.
#[must_use]
pub fn controller(name: &str, validator: ScriptedValidator) -> QaController {
    let client = ValidationClient::new(
        validator,
        MemoryCredentials::with_token(QA_TOKEN),
        SCENARIO_TIMEOUT,
    );
    BuilderController::new(DeckBuilderSession::named(name), client).with_user_id(QA_USER)
}

#[async_trait::async_trait]
pub trait Scenario {
    fn name(&self) -> &'static str;
    async fn run(&self, ctx: &ScenarioCtx) -> Result<()>;
}

pub fn get_scenario(name: &str) -> Option<Box<dyn Scenario + Send + Sync>> {
    match name.to_lowercase().as_str() {
        "complete-deck" | "scenario-a" => Some(Box::new(end_to_end::CompleteDeck)),
        "lose-completeness" | "scenario-b" => Some(Box::new(end_to_end::LoseCompleteness)),
        "character-cap" | "scenario-c" => Some(Box::new(end_to_end::CharacterCap)),
        "rule-failure" | "scenario-d" => Some(Box::new(end_to_end::RuleFailure)),
        "expired-credential" | "auth" => Some(Box::new(end_to_end::ExpiredCredential)),
        "slow-validator" | "timeout" => Some(Box::new(end_to_end::SlowValidator)),
        "server-error" | "retry" => Some(Box::new(end_to_end::ServerFailure)),
        "save-flow" | "save" => Some(Box::new(end_to_end::SaveFlow)),
        "random-fill" | "random" => Some(Box::new(end_to_end::RandomFill)),
        "invariant-sweep" | "sweep" => Some(Box::new(sweep::InvariantSweep)),
        "toggle-laws" | "laws" => Some(Box::new(sweep::ToggleLaws)),
        _ => None,
    }
}

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    vec![
        ("complete-deck", "Scenario A: complete deck validates once"),
        ("lose-completeness", "Scenario B: losing completeness clears the result"),
        ("character-cap", "Scenario C: fourth character is refused"),
        ("rule-failure", "Scenario D: failing rule is surfaced verbatim"),
        ("expired-credential", "Expired token clears the stored credential"),
        ("slow-validator", "Validator timeout is a request failure"),
        ("server-error", "Server error, then save revalidates"),
        ("save-flow", "Save, update, list and delete a validated deck"),
        ("random-fill", "Random picks fill the deck and validate once"),
        ("invariant-sweep", "Randomized gestures keep every deck cap"),
        ("toggle-laws", "Deselect identity and the 0-1-2-0 cycle"),
    ]
}
