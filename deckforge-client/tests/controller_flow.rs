use async_trait::async_trait;
use deckforge_core::{
    Acceptance, CardId, CredentialStore, DeckBuilderSession, DeckId, InMemoryCatalog,
    PersistReceipt, PersistRequest, SubmissionError, UnknownCard, UpdateDeckRequest,
    ValidationRequest, ValidationResponse,
};
use deckforge_client::{
    ApiError, BuilderController, ClientError, DeckApi, DeckPage, DeckRecord, MISSING_CREDENTIAL,
    MemoryCredentials, Pagination, ValidationClient, ValidationOutcome, clamp_page,
    classify_status,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Reply {
    Pass,
    RuleFailure,
    Expired,
    ServerError,
    Slow(Duration),
}

#[derive(Default)]
struct FakeApi {
    replies: Mutex<VecDeque<Reply>>,
    validations: Mutex<Vec<(Option<String>, ValidationRequest)>>,
    created: Mutex<Vec<(Option<String>, PersistRequest)>>,
    updated: Mutex<Vec<UpdateDeckRequest>>,
    deleted: Mutex<Vec<DeckId>>,
}

impl FakeApi {
    fn replying(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    fn validation_count(&self) -> usize {
        self.validations.lock().unwrap().len()
    }
}

fn passing_response() -> ValidationResponse {
    serde_json::from_str(
        r#"{"valid": true, "rules": {"deck_size": true, "deck_size_msg": "33张"}, "errors": [], "suggestions": []}"#,
    )
    .unwrap()
}

#[async_trait]
impl DeckApi for FakeApi {
    async fn validate(
        &self,
        token: Option<&str>,
        request: &ValidationRequest,
    ) -> Result<ValidationResponse, ApiError> {
        self.validations
            .lock()
            .unwrap()
            .push((token.map(str::to_string), request.clone()));
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Pass);
        match reply {
            Reply::Pass => Ok(passing_response()),
            Reply::RuleFailure => Ok(serde_json::from_str(
                r#"{"valid": false, "rules": {"card_limit": false, "card_limit_msg": "超过2张"}, "errors": ["超过2张"], "suggestions": []}"#,
            )
            .unwrap()),
            Reply::Expired => Err(classify_status(401, r#"{"msg": "Token has expired"}"#)),
            Reply::ServerError => Err(classify_status(500, r#"{"message": "boom"}"#)),
            Reply::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(passing_response())
            }
        }
    }

    async fn create_deck(
        &self,
        token: Option<&str>,
        request: &PersistRequest,
    ) -> Result<PersistReceipt, ApiError> {
        self.created
            .lock()
            .unwrap()
            .push((token.map(str::to_string), request.clone()));
        Ok(PersistReceipt {
            message: "卡组创建成功".into(),
            deck_id: Some(DeckId::from("41")),
            deck_name: Some(request.name.clone()),
        })
    }

    async fn update_deck(
        &self,
        _token: Option<&str>,
        request: &UpdateDeckRequest,
    ) -> Result<PersistReceipt, ApiError> {
        self.updated.lock().unwrap().push(request.clone());
        Ok(PersistReceipt {
            message: "卡组更新成功".into(),
            ..PersistReceipt::default()
        })
    }

    async fn list_decks(
        &self,
        _token: Option<&str>,
        user_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<DeckPage, ApiError> {
        let (page, per_page) = clamp_page(page, per_page);
        Ok(DeckPage {
            decks: vec![DeckRecord {
                id: DeckId::from("41"),
                name: format!("{user_id}'s deck"),
                description: None,
                cards: Vec::new(),
                created_at: None,
                updated_at: None,
            }],
            pagination: Pagination {
                page,
                per_page,
                total: 1,
                pages: 1,
            },
        })
    }

    async fn delete_deck(&self, _token: Option<&str>, deck_id: &DeckId) -> Result<(), ApiError> {
        self.deleted.lock().unwrap().push(deck_id.clone());
        Ok(())
    }
}

type Controller = BuilderController<FakeApi, MemoryCredentials>;

fn controller(name: &str, replies: impl IntoIterator<Item = Reply>) -> Controller {
    let client = ValidationClient::new(
        FakeApi::replying(replies),
        MemoryCredentials::with_token("jwt"),
        Duration::from_millis(200),
    );
    BuilderController::new(DeckBuilderSession::named(name), client)
}

/// Bring the deck to 29 action cards; `act14` still needs its second copy.
async fn nearly_complete(controller: &Controller) {
    for c in ["c1", "c2", "c3"] {
        controller.toggle_character(c).await;
    }
    for i in 0..15 {
        let id = format!("act{i:02}");
        controller.toggle_action(id.as_str()).await;
        if i < 14 {
            controller.toggle_action(id.as_str()).await;
        }
    }
}

#[tokio::test]
async fn completing_deck_validates_once_and_saves() {
    let controller = controller("冰队", [Reply::Pass]);
    nearly_complete(&controller).await;
    assert_eq!(controller.client().api().validation_count(), 0);

    let update = controller.toggle_action("act14").await;
    let report = update.validation.expect("auto validation");
    assert_eq!(report.acceptance, Some(Acceptance::Applied));
    assert!(report.applied_result().unwrap().valid);
    assert_eq!(controller.client().api().validation_count(), 1);

    let (token, request) = controller.client().api().validations.lock().unwrap()[0].clone();
    assert_eq!(token.as_deref(), Some("jwt"));
    assert_eq!(request.cards.len(), 30);

    let receipt = controller.save().await.unwrap();
    assert_eq!(receipt.deck_id, Some(DeckId::from("41")));
    assert_eq!(controller.client().api().validation_count(), 1);
    let created = controller.client().api().created.lock().unwrap().clone();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].1.cards.len(), 33);
    assert_eq!(created[0].0.as_deref(), Some("jwt"));
}

#[tokio::test]
async fn auth_failure_clears_credential() {
    let controller = controller("deck", [Reply::Expired, Reply::Expired]);
    nearly_complete(&controller).await;
    let report = controller.toggle_action("act14").await.validation.unwrap();
    assert!(report.outcome.is_auth_failure());
    assert_eq!(report.acceptance, None);
    assert_eq!(controller.client().credentials().token().unwrap(), None);
    assert!(controller.last_result().await.is_none());

    assert_eq!(controller.save().await, Err(ClientError::NotSignedIn));
    assert_eq!(controller.client().api().validation_count(), 1);
    assert!(controller.client().api().created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_credential_is_an_auth_failure_without_a_call() {
    let client = ValidationClient::new(
        FakeApi::replying([]),
        MemoryCredentials::new(),
        Duration::from_millis(200),
    );
    let controller = BuilderController::new(DeckBuilderSession::named("deck"), client);
    nearly_complete(&controller).await;

    let report = controller.toggle_action("act14").await.validation.unwrap();
    assert!(report.outcome.is_auth_failure());
    assert_eq!(
        report.outcome,
        ValidationOutcome::AuthFailure(ApiError::Auth {
            status: 401,
            message: MISSING_CREDENTIAL.to_string()
        })
    );
    assert_eq!(report.acceptance, None);
    assert!(controller.last_result().await.is_none());

    let manual = controller.validate_now().await.unwrap();
    assert!(manual.outcome.is_auth_failure());
    assert_eq!(controller.save().await, Err(ClientError::NotSignedIn));
    assert_eq!(
        controller.update(DeckId::from("41")).await,
        Err(ClientError::NotSignedIn)
    );
    assert_eq!(controller.client().api().validation_count(), 0);
    assert!(controller.client().api().created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn save_waits_for_the_validation_in_flight() {
    let controller = controller("deck", [Reply::Slow(Duration::from_millis(60))]);
    nearly_complete(&controller).await;

    let (completing, saved) = tokio::join!(controller.toggle_action("act14"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        controller.save().await
    });

    let report = completing.validation.unwrap();
    assert_eq!(report.acceptance, Some(Acceptance::Applied));
    assert_eq!(saved.unwrap().deck_id, Some(DeckId::from("41")));
    assert_eq!(controller.client().api().validation_count(), 1);
    assert_eq!(controller.client().api().created.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn save_revalidates_when_the_validation_in_flight_fails() {
    let controller = controller(
        "deck",
        [Reply::Slow(Duration::from_secs(5)), Reply::Pass],
    );
    nearly_complete(&controller).await;

    let (completing, saved) = tokio::join!(controller.toggle_action("act14"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        controller.save().await
    });

    assert_eq!(
        completing.validation.unwrap().outcome,
        ValidationOutcome::RequestFailure(ApiError::Timeout)
    );
    assert!(saved.is_ok());
    assert_eq!(controller.client().api().validation_count(), 2);
}

#[tokio::test]
async fn timeout_is_a_request_failure() {
    let controller = controller("deck", [Reply::Slow(Duration::from_secs(5))]);
    nearly_complete(&controller).await;
    let report = controller.toggle_action("act14").await.validation.unwrap();
    assert_eq!(
        report.outcome,
        ValidationOutcome::RequestFailure(ApiError::Timeout)
    );
    let snapshot = controller.snapshot().await;
    assert!(snapshot.is_complete());
    assert_eq!(controller.client().credentials().token().unwrap().as_deref(), Some("jwt"));
}

#[tokio::test]
async fn save_revalidates_after_failed_auto_validation() {
    let controller = controller("deck", [Reply::ServerError, Reply::Pass]);
    nearly_complete(&controller).await;
    let report = controller.toggle_action("act14").await.validation.unwrap();
    assert!(matches!(report.outcome, ValidationOutcome::RequestFailure(_)));

    controller.save().await.unwrap();
    assert_eq!(controller.client().api().validation_count(), 2);
    assert_eq!(controller.client().api().created.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn rejected_deck_is_never_sent() {
    let controller = controller("deck", [Reply::RuleFailure]);
    nearly_complete(&controller).await;
    controller.toggle_action("act14").await;
    let result = controller.last_result().await.unwrap();
    assert!(!result.valid);

    assert_eq!(
        controller.save().await,
        Err(ClientError::Submission(SubmissionError::Rejected))
    );
    assert_eq!(controller.client().api().validation_count(), 1);
    assert!(controller.client().api().created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unnamed_or_incomplete_deck_fails_before_any_call() {
    let unnamed = controller("", []);
    assert_eq!(
        unnamed.save().await,
        Err(ClientError::Submission(SubmissionError::NameRequired))
    );
    assert_eq!(
        unnamed.validate_now().await.unwrap_err(),
        ClientError::Submission(SubmissionError::NameRequired)
    );

    let partial = controller("deck", []);
    partial.toggle_character("c1").await;
    assert!(matches!(
        partial.save().await,
        Err(ClientError::Submission(SubmissionError::Incomplete { .. }))
    ));
    assert_eq!(unnamed.client().api().validation_count(), 0);
    assert_eq!(partial.client().api().validation_count(), 0);
}

#[tokio::test]
async fn response_for_superseded_snapshot_is_discarded() {
    let controller = controller("deck", [Reply::Slow(Duration::from_millis(100))]);
    nearly_complete(&controller).await;

    let (completing, _) = tokio::join!(controller.toggle_action("act14"), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        controller.toggle_character("c1").await
    });

    let report = completing.validation.unwrap();
    assert!(matches!(report.acceptance, Some(Acceptance::Stale { .. })));
    assert!(report.applied_result().is_none());
    assert!(controller.last_result().await.is_none());
    assert!(!controller.snapshot().await.is_complete());
}

#[tokio::test]
async fn manual_validation_of_partial_deck() {
    let controller = controller("deck", [Reply::RuleFailure]);
    controller.toggle_character("c1").await;
    let report = controller.validate_now().await.unwrap();
    assert_eq!(report.acceptance, Some(Acceptance::Applied));
    assert_eq!(report.ticket.request.characters.len(), 1);
    assert!(!controller.last_result().await.unwrap().valid);
}

#[tokio::test]
async fn rename_and_reset_flow() {
    let controller = controller("", []);
    nearly_complete(&controller).await;
    assert!(controller.toggle_action("act14").await.validation.is_none());

    let renamed = controller.set_name("雷国").await;
    assert!(renamed.validation.is_some());
    controller.set_description(Some("国家队".into())).await;
    assert!(controller.last_result().await.is_some());

    let reset = controller.reset().await;
    assert!(reset.cleared);
    assert!(controller.snapshot().await.is_empty());
    assert!(controller.last_result().await.is_none());
}

#[tokio::test]
async fn update_list_and_delete_use_stored_credential() {
    let controller = controller("deck", []).with_user_id("u-1");
    nearly_complete(&controller).await;
    controller.toggle_action("act14").await;

    controller.update(DeckId::from("41")).await.unwrap();
    let updated = controller.client().api().updated.lock().unwrap().clone();
    assert_eq!(updated[0].deck_id.as_str(), "41");
    assert_eq!(updated[0].card_ids.len(), 33);

    let page = controller.list_decks(0, 500).await.unwrap();
    assert_eq!(page.pagination.page, 1);
    assert_eq!(page.pagination.per_page, 100);
    assert_eq!(page.decks[0].name, "u-1's deck");

    controller.delete_deck(&DeckId::from("41")).await.unwrap();
    assert_eq!(controller.client().api().deleted.lock().unwrap().len(), 1);

    controller.client().credentials().clear_token().unwrap();
    assert_eq!(
        controller.delete_deck(&DeckId::from("41")).await,
        Err(ClientError::NotSignedIn)
    );
}

#[tokio::test]
async fn listing_requires_a_user_id() {
    let controller = controller("deck", []);
    assert_eq!(
        controller.list_decks(1, 10).await,
        Err(ClientError::MissingUserId)
    );
}

#[tokio::test]
async fn manual_retry_after_server_error() {
    let controller = controller("deck", [Reply::ServerError, Reply::Pass]);
    nearly_complete(&controller).await;
    let failed = controller.toggle_action("act14").await.validation.unwrap();
    assert!(matches!(failed.outcome, ValidationOutcome::RequestFailure(_)));
    assert!(controller.last_result().await.is_none());

    let retry = controller.validate_now().await.unwrap();
    assert_eq!(retry.acceptance, Some(Acceptance::Applied));
    assert_eq!(retry.ticket.revision, failed.ticket.revision);
    assert!(controller.last_result().await.unwrap().valid);
}

fn fill_catalog() -> InMemoryCatalog {
    let characters = (0..4).map(|i| {
        format!(r#"{{"id": "c{i}", "name": "角色{i}", "type": "角色牌"}}"#)
    });
    let actions = (0..32).map(|i| {
        format!(r#"{{"id": "act{i:02}", "name": "行动{i}", "type": "事件"}}"#)
    });
    let cards: Vec<String> = characters.chain(actions).collect();
    InMemoryCatalog::from_json(&format!(r#"{{"cards": [{}]}}"#, cards.join(","))).unwrap()
}

#[tokio::test]
async fn random_fill_validates_once_when_it_completes_the_deck() {
    let catalog = fill_catalog();
    let mut rng = ChaCha20Rng::seed_from_u64(17);
    let controller = controller("随机", [Reply::Pass]);

    let characters = controller.random_characters(&catalog, 3, &mut rng).await;
    assert!(characters.validation.is_none());
    let actions = controller.random_actions(&catalog, 30, &mut rng).await;
    let report = actions.validation.expect("completion validates");
    assert_eq!(report.acceptance, Some(Acceptance::Applied));
    assert_eq!(report.ticket.request.cards.len(), 30);
    assert_eq!(controller.client().api().validation_count(), 1);
    assert!(controller.snapshot().await.is_complete());
}

#[tokio::test]
async fn catalog_pick_routes_by_kind() {
    let catalog = fill_catalog();
    let controller = controller("deck", []);
    controller.pick(&catalog, "c0").await.unwrap();
    controller.pick(&catalog, "act00").await.unwrap();
    controller.pick(&catalog, "act00").await.unwrap();

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.characters(), [CardId::from("c0")]);
    assert_eq!(snapshot.action_copies(&CardId::from("act00")), 2);
    assert_eq!(
        controller.pick(&catalog, "ghost").await,
        Err(UnknownCard(CardId::from("ghost")))
    );
}
