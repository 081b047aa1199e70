//! In-process validator and deck store used by the scenarios.
//!
//! By default every validation is judged against the structural deck rules;
//! queued [`Reply`] values override that for the next calls in order.
use async_trait::async_trait;
use deckforge_client::{ApiError, DeckApi, DeckPage, DeckRecord, Pagination, clamp_page, classify_status};
use deckforge_core::{
    CardId, DeckId, MAX_CHARACTERS, MAX_COPIES_PER_ACTION, PersistReceipt, PersistRequest,
    RuleName, UpdateDeckRequest, ValidationRequest, ValidationResponse,
};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const QA_TOKEN: &str = "qa-token";
pub const QA_USER: &str = "qa-user";

/// Scripted answer for one validation call.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Judge the deck by the structural rules.
    Judge,
    /// Answer with a fixed response body.
    Fixed(ValidationResponse),
    /// 401 with an expired-token message.
    Expired,
    /// 500 from the validator.
    ServerError,
    /// Judge, but only after sleeping.
    Delayed(Duration),
}

#[derive(Debug, Default)]
struct Ledger {
    replies: VecDeque<Reply>,
    validations: Vec<ValidationRequest>,
    decks: BTreeMap<u64, PersistRequest>,
    next_id: u64,
}

#[derive(Debug, Default)]
pub struct ScriptedValidator {
    ledger: Mutex<Ledger>,
}

impl ScriptedValidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_replies(replies: impl IntoIterator<Item = Reply>) -> Self {
        let validator = Self::new();
        validator.ledger().replies.extend(replies);
        validator
    }

    /// Requests received so far, in arrival order.
    #[must_use]
    pub fn validations(&self) -> Vec<ValidationRequest> {
        self.ledger().validations.clone()
    }

    #[must_use]
    pub fn validation_calls(&self) -> usize {
        self.ledger().validations.len()
    }

    #[must_use]
    pub fn saved_decks(&self) -> usize {
        self.ledger().decks.len()
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn require_token(token: Option<&str>) -> Result<(), ApiError> {
    match token {
        Some(QA_TOKEN) => Ok(()),
        Some(_) => Err(classify_status(401, r#"{"msg": "Invalid token"}"#)),
        None => Err(classify_status(
            401,
            r#"{"msg": "Missing Authorization Header"}"#,
        )),
    }
}

fn rule(rules: &mut Map<String, Value>, name: RuleName, passed: bool, message: String) {
    rules.insert(name.as_str().to_string(), Value::Bool(passed));
    rules.insert(name.message_key(), Value::String(message));
}

/// Judge a request by the deck-shape rules the real validator enforces.
#[must_use]
pub fn judge(request: &ValidationRequest) -> ValidationResponse {
    let mut rules = Map::new();
    let characters = request.characters.len();
    rule(
        &mut rules,
        RuleName::CharacterCount,
        characters == MAX_CHARACTERS,
        format!("角色数量: {characters}/{MAX_CHARACTERS}"),
    );
    let actions = request.cards.len();
    rule(
        &mut rules,
        RuleName::DeckSize,
        actions == 30,
        format!("行动牌数量: {actions}/30"),
    );
    let distinct: BTreeSet<&CardId> = request.characters.iter().collect();
    rule(
        &mut rules,
        RuleName::CharacterLimit,
        distinct.len() == characters,
        "角色不能重复".to_string(),
    );
    let mut copies: BTreeMap<&CardId, u8> = BTreeMap::new();
    for id in &request.cards {
        *copies.entry(id).or_default() += 1;
    }
    let over: Vec<&str> = copies
        .iter()
        .filter(|(_, count)| **count > MAX_COPIES_PER_ACTION)
        .map(|(id, _)| id.as_str())
        .collect();
    rule(
        &mut rules,
        RuleName::CardLimit,
        over.is_empty(),
        if over.is_empty() {
            "卡牌数量符合要求".to_string()
        } else {
            format!("超出数量限制: {}", over.join(", "))
        },
    );
    rule(
        &mut rules,
        RuleName::ElementalSynergy,
        true,
        "元素搭配合理".to_string(),
    );

    let errors: Vec<String> = RuleName::ALL
        .into_iter()
        .filter(|name| rules.get(name.as_str()) == Some(&Value::Bool(false)))
        .filter_map(|name| rules.get(&name.message_key()).and_then(Value::as_str))
        .map(str::to_string)
        .collect();
    ValidationResponse {
        valid: Some(errors.is_empty()),
        rules,
        errors,
        ..ValidationResponse::default()
    }
}

#[async_trait]
impl DeckApi for ScriptedValidator {
    async fn validate(
        &self,
        token: Option<&str>,
        request: &ValidationRequest,
    ) -> Result<ValidationResponse, ApiError> {
        let reply = {
            let mut ledger = self.ledger();
            ledger.validations.push(request.clone());
            ledger.replies.pop_front().unwrap_or(Reply::Judge)
        };
        require_token(token)?;
        match reply {
            Reply::Judge => Ok(judge(request)),
            Reply::Fixed(response) => Ok(response),
            Reply::Expired => Err(classify_status(401, r#"{"msg": "Token has expired"}"#)),
            Reply::ServerError => Err(classify_status(500, r#"{"error": "验证过程中出现错误"}"#)),
            Reply::Delayed(delay) => {
                tokio::time::sleep(delay).await;
                Ok(judge(request))
            }
        }
    }

    async fn create_deck(
        &self,
        token: Option<&str>,
        request: &PersistRequest,
    ) -> Result<PersistReceipt, ApiError> {
        require_token(token)?;
        let mut ledger = self.ledger();
        ledger.next_id += 1;
        let id = ledger.next_id;
        ledger.decks.insert(id, request.clone());
        Ok(PersistReceipt {
            message: "卡组创建成功".to_string(),
            deck_id: Some(DeckId::new(id.to_string())),
            deck_name: Some(request.name.clone()),
        })
    }

    async fn update_deck(
        &self,
        token: Option<&str>,
        request: &UpdateDeckRequest,
    ) -> Result<PersistReceipt, ApiError> {
        require_token(token)?;
        let mut ledger = self.ledger();
        let id = known_id(&ledger, &request.deck_id)?;
        let Some(deck) = ledger.decks.get_mut(&id) else {
            return Err(not_found());
        };
        if let Some(name) = &request.name {
            deck.name.clone_from(name);
        }
        deck.description.clone_from(&request.description);
        deck.cards.clone_from(&request.card_ids);
        Ok(PersistReceipt {
            message: "卡组更新成功".to_string(),
            deck_id: Some(request.deck_id.clone()),
            deck_name: request.name.clone(),
        })
    }

    async fn list_decks(
        &self,
        token: Option<&str>,
        _user_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<DeckPage, ApiError> {
        require_token(token)?;
        let (page, per_page) = clamp_page(page, per_page);
        let ledger = self.ledger();
        let total = ledger.decks.len() as u64;
        let skip = usize::try_from((page - 1) * per_page).unwrap_or(usize::MAX);
        let decks = ledger
            .decks
            .iter()
            .skip(skip)
            .take(per_page as usize)
            .map(|(id, deck)| DeckRecord {
                id: DeckId::new(id.to_string()),
                name: deck.name.clone(),
                description: deck.description.clone(),
                cards: deck.cards.clone(),
                created_at: None,
                updated_at: None,
            })
            .collect();
        Ok(DeckPage {
            decks,
            pagination: Pagination {
                page,
                per_page,
                total,
                pages: total.div_ceil(u64::from(per_page)),
            },
        })
    }

    async fn delete_deck(&self, token: Option<&str>, deck_id: &DeckId) -> Result<(), ApiError> {
        require_token(token)?;
        let mut ledger = self.ledger();
        let id = known_id(&ledger, deck_id)?;
        ledger.decks.remove(&id);
        Ok(())
    }
}

fn not_found() -> ApiError {
    classify_status(404, r#"{"message": "卡组不存在"}"#)
}

fn known_id(ledger: &Ledger, deck_id: &DeckId) -> Result<u64, ApiError> {
    deck_id
        .as_str()
        .parse()
        .ok()
        .filter(|id| ledger.decks.contains_key(id))
        .ok_or_else(not_found)
}
