//! Allow/deny decisions.

use serde::{Deserialize, Serialize};

/// Outcome of an authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionOutcome {
    /// The operation was permitted.
    Allow,
    /// The operation was refused.
    Deny,
}

/// An explained allow/deny decision, carried on `INTENT_RESPONSE`
/// envelopes and forwarded to the audit pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Allow or deny.
    pub outcome: DecisionOutcome,
    /// Why the decision was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Decision {
    /// An allow decision without a reason.
    #[must_use]
    pub fn allow() -> Self {
        Self {
            outcome: DecisionOutcome::Allow,
            reason: None,
        }
    }

    /// A deny decision with a reason.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            outcome: DecisionOutcome::Deny,
            reason: Some(reason.into()),
        }
    }

    /// Whether the decision permits the operation.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.outcome == DecisionOutcome::Allow
    }
}
