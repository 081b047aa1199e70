//! Validator wire shapes and the reconciled validation result.
//!
//! The remote validator answers with a flat rule map
//! (`{"card_limit": false, "card_limit_msg": "..."}`); this module turns it
//! into per-rule results keyed by [`RuleName`].
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::card::CardId;
use crate::composition::Composition;

/// The five rules the validator reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleName {
    CharacterCount,
    DeckSize,
    CharacterLimit,
    CardLimit,
    ElementalSynergy,
}

impl RuleName {
    pub const ALL: [Self; 5] = [
        Self::CharacterCount,
        Self::DeckSize,
        Self::CharacterLimit,
        Self::CardLimit,
        Self::ElementalSynergy,
    ];

    /// Wire key of the rule.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CharacterCount => "character_count",
            Self::DeckSize => "deck_size",
            Self::CharacterLimit => "character_limit",
            Self::CardLimit => "card_limit",
            Self::ElementalSynergy => "elemental_synergy",
        }
    }

    /// Wire key of the rule's message.
    #[must_use]
    pub fn message_key(self) -> String {
        format!("{}_msg", self.as_str())
    }

    /// Label shown next to the rule in the result panel.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CharacterCount => "角色数量",
            Self::DeckSize => "卡牌总数",
            Self::CharacterLimit => "角色限制",
            Self::CardLimit => "卡牌限制",
            Self::ElementalSynergy => "元素反应",
        }
    }
}

impl fmt::Display for RuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleResult {
    pub passed: bool,
    pub message: String,
}

/// Body of a validation request.
///
/// `cards` is the flat multiset the validator checks: an action card with two
/// copies appears twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub deck_name: String,
    pub characters: Vec<CardId>,
    pub cards: Vec<CardId>,
}

impl ValidationRequest {
    #[must_use]
    pub fn from_composition(comp: &Composition) -> Self {
        Self {
            deck_name: comp.name().trim().to_string(),
            characters: comp.characters().to_vec(),
            cards: comp.flattened_actions(),
        }
    }
}

/// Extra figures some validator versions attach.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationDetails {
    #[serde(default)]
    pub character_count: Option<u32>,
    #[serde(default)]
    pub total_cards: Option<u32>,
    #[serde(default)]
    pub element_composition: Vec<String>,
}

/// Validation response as the validator sends it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
    /// Older endpoints answer with `is_valid` instead of `valid`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
    #[serde(default)]
    pub rules: Map<String, Value>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ValidationDetails>,
}

impl ValidationResponse {
    /// Overall verdict; a response without one counts as invalid.
    #[must_use]
    pub fn verdict(&self) -> bool {
        self.valid.or(self.is_valid).unwrap_or(false)
    }

    /// Read one rule from the flat map. Nested `{passed|valid, message|msg}`
    /// objects are accepted as well.
    #[must_use]
    pub fn rule(&self, name: RuleName) -> Option<RuleResult> {
        let flat_message = self
            .rules
            .get(&name.message_key())
            .and_then(Value::as_str)
            .map(str::to_string);
        match self.rules.get(name.as_str())? {
            Value::Bool(passed) => Some(RuleResult {
                passed: *passed,
                message: flat_message.unwrap_or_default(),
            }),
            Value::Object(nested) => {
                let passed = nested
                    .get("passed")
                    .or_else(|| nested.get("valid"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let message = nested
                    .get("message")
                    .or_else(|| nested.get("msg"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or(flat_message)
                    .unwrap_or_default();
                Some(RuleResult { passed, message })
            }
            _ => None,
        }
    }
}

impl From<&ValidationResult> for ValidationResponse {
    fn from(result: &ValidationResult) -> Self {
        let mut rules = Map::new();
        for (name, rule) in &result.rule_results {
            rules.insert(name.as_str().to_string(), Value::Bool(rule.passed));
            rules.insert(name.message_key(), Value::String(rule.message.clone()));
        }
        Self {
            valid: Some(result.valid),
            is_valid: None,
            rules,
            errors: result.errors.clone(),
            warnings: result.warnings.clone(),
            suggestions: result.suggestions.clone(),
            details: result.details.clone(),
        }
    }
}

/// Reconciled outcome of one validator round trip.
///
/// Only built from a validator response; the client never declares a deck
/// valid on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub rule_results: BTreeMap<RuleName, RuleResult>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
    pub details: Option<ValidationDetails>,
}

impl From<ValidationResponse> for ValidationResult {
    fn from(response: ValidationResponse) -> Self {
        let rule_results = RuleName::ALL
            .into_iter()
            .filter_map(|name| response.rule(name).map(|rule| (name, rule)))
            .collect();
        Self {
            valid: response.verdict(),
            rule_results,
            errors: response.errors,
            warnings: response.warnings,
            suggestions: response.suggestions,
            details: response.details,
        }
    }
}

impl ValidationResult {
    #[must_use]
    pub fn rule(&self, name: RuleName) -> Option<&RuleResult> {
        self.rule_results.get(&name)
    }

    /// Rules the validator reported as failed, in rule order.
    pub fn failing_rules(&self) -> impl Iterator<Item = (RuleName, &RuleResult)> {
        self.rule_results
            .iter()
            .filter(|(_, rule)| !rule.passed)
            .map(|(name, rule)| (*name, rule))
    }

    /// Text lines for the result panel.
    #[must_use]
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![if self.valid {
            "✓ 卡组验证通过！".to_string()
        } else {
            "✗ 卡组验证失败！".to_string()
        }];
        for name in RuleName::ALL {
            if let Some(rule) = self.rule(name) {
                let mark = if rule.passed { '✓' } else { '✗' };
                lines.push(format!("{}: {mark} {}", name.label(), rule.message));
            }
        }
        if !self.valid && !self.errors.is_empty() {
            lines.push(format!("错误信息: {}", self.errors.join(", ")));
        }
        let suggestions = if self.suggestions.is_empty() {
            "无".to_string()
        } else {
            self.suggestions.join(", ")
        };
        lines.push(format!("建议: {suggestions}"));
        lines
    }
}
