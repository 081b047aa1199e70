//! Auto-validate trigger.
//!
//! Watches composition revisions and asks for a validator round trip the
//! moment a named deck reaches its complete shape. The trigger also owns the
//! last accepted result, which only ever describes the current revision:
//! any newer revision drops it, and responses stamped with an older revision
//! are discarded.
use serde::{Deserialize, Serialize};

use crate::composition::Composition;
use crate::validation::{ValidationRequest, ValidationResult};

/// Trigger state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TriggerState {
    #[default]
    Idle,
    /// A validation request for `revision` is in flight.
    Pending { revision: u64 },
}

/// Who asked for a validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketOrigin {
    Auto,
    Manual,
}

/// Permission to run one validator round trip for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationTicket {
    pub revision: u64,
    pub origin: TicketOrigin,
    pub request: ValidationRequest,
}

/// A validation result together with the revision it was computed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampedResult {
    pub revision: u64,
    pub result: ValidationResult,
}

/// What an observation changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Set when the trigger fired for this revision.
    pub ticket: Option<ValidationTicket>,
    /// Set when a stored result or an in-flight request was dropped.
    pub cleared: bool,
}

/// How a validator response was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// The response matched the current revision and is now stored.
    Applied,
    /// The composition moved on; the response was dropped.
    Stale { ticket: u64, current: u64 },
}

#[derive(Debug, Clone, Default)]
pub struct AutoValidateTrigger {
    state: TriggerState,
    /// Revision seen by the last observation.
    observed: Option<u64>,
    /// Revision the last request (auto or manual) was issued for.
    last_issued: Option<u64>,
    result: Option<StampedResult>,
}

impl AutoValidateTrigger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn state(&self) -> TriggerState {
        self.state
    }

    /// Last accepted result, if it still describes the observed revision.
    #[must_use]
    pub fn result(&self) -> Option<&StampedResult> {
        self.result.as_ref()
    }

    /// Re-evaluate after a composition change. Observing the same revision
    /// twice is a no-op, so redundant calls never fire a second request.
    pub fn observe(&mut self, comp: &Composition) -> Observation {
        let revision = comp.revision();
        if self.observed == Some(revision) {
            return Observation {
                ticket: None,
                cleared: false,
            };
        }
        self.observed = Some(revision);

        let cleared = self.result.take().is_some()
            || matches!(self.state, TriggerState::Pending { revision: pending } if pending != revision);
        self.state = TriggerState::Idle;

        let ready = comp.is_complete() && comp.has_name();
        let ticket = if ready && self.last_issued != Some(revision) {
            log::info!(
                "deck '{}' complete at revision {revision}; requesting validation",
                comp.name()
            );
            Some(self.issue(comp, TicketOrigin::Auto))
        } else {
            None
        };

        if cleared {
            log::debug!("validation state cleared at revision {revision}");
        }
        Observation { ticket, cleared }
    }

    /// Start a validation the user asked for explicitly.
    pub fn request_manual(&mut self, comp: &Composition) -> ValidationTicket {
        self.observed = Some(comp.revision());
        self.result = None;
        self.issue(comp, TicketOrigin::Manual)
    }

    /// Store a validator response if it belongs to the current revision.
    pub fn accept(
        &mut self,
        ticket: &ValidationTicket,
        current_revision: u64,
        result: ValidationResult,
    ) -> Acceptance {
        if ticket.revision != current_revision {
            log::debug!(
                "discarding validation for revision {} (current {current_revision})",
                ticket.revision
            );
            return Acceptance::Stale {
                ticket: ticket.revision,
                current: current_revision,
            };
        }
        self.state = TriggerState::Idle;
        self.result = Some(StampedResult {
            revision: ticket.revision,
            result,
        });
        Acceptance::Applied
    }

    /// The round trip for `ticket` failed; leave `Pending` if it was ours.
    /// No automatic retry is scheduled.
    pub fn abandon(&mut self, ticket: &ValidationTicket) {
        if self.state == (TriggerState::Pending { revision: ticket.revision }) {
            self.state = TriggerState::Idle;
        }
    }

    /// Forget everything, as when the builder view is left.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn issue(&mut self, comp: &Composition, origin: TicketOrigin) -> ValidationTicket {
        let revision = comp.revision();
        self.state = TriggerState::Pending { revision };
        self.last_issued = Some(revision);
        ValidationTicket {
            revision,
            origin,
            request: ValidationRequest::from_composition(comp),
        }
    }
}
