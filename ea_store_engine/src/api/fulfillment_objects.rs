use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::db_types::{Entitlement, Order};

/// What happened to the order's status when a verdict was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionStatus {
    /// This call moved the order from `pending` to `completed`.
    Completed,
    /// The order was already `completed`. Side effects were still checked.
    AlreadyCompleted,
    /// This call moved the order from `pending` to `failed`.
    Failed,
    /// A failure verdict for an order that had already failed.
    AlreadyFailed,
    /// A failure verdict arrived for a `completed` order and was rejected.
    StaleFailureIgnored,
    /// A success verdict arrived for a `failed` order and was rejected.
    SuccessOnFailedOrder,
}

impl CompletionStatus {
    /// True for verdicts that contradicted the order's terminal state.
    pub fn is_rejected(&self) -> bool {
        matches!(self, CompletionStatus::StaleFailureIgnored | CompletionStatus::SuccessOnFailedOrder)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SideEffectOutcome {
    Performed,
    AlreadyDone,
    Failed(String),
    NotAttempted,
}

impl SideEffectOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, SideEffectOutcome::Failed(_))
    }
}

impl Display for SideEffectOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SideEffectOutcome::Performed => write!(f, "performed"),
            SideEffectOutcome::AlreadyDone => write!(f, "already done"),
            SideEffectOutcome::Failed(msg) => write!(f, "failed ({msg})"),
            SideEffectOutcome::NotAttempted => write!(f, "not attempted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentReport {
    pub order: Order,
    pub status: CompletionStatus,
    pub entitlement: SideEffectOutcome,
    pub email: SideEffectOutcome,
}

impl FulfillmentReport {
    pub fn without_side_effects(order: Order, status: CompletionStatus) -> Self {
        Self { order, status, entitlement: SideEffectOutcome::NotAttempted, email: SideEffectOutcome::NotAttempted }
    }

    /// A human-readable description of anything that did not go to plan. `None` means there is nothing to report.
    pub fn warning(&self) -> Option<String> {
        let mut warnings = Vec::new();
        match self.status {
            CompletionStatus::StaleFailureIgnored => {
                warnings.push("Order is already completed; the failure notification was ignored".to_string())
            },
            CompletionStatus::SuccessOnFailedOrder => {
                warnings.push("Order has already failed; the payment needs manual review".to_string())
            },
            _ => {},
        }
        if let SideEffectOutcome::Failed(msg) = &self.entitlement {
            warnings.push(format!("Entitlement was not granted: {msg}"));
        }
        if let SideEffectOutcome::Failed(msg) = &self.email {
            warnings.push(format!("Confirmation email was not sent: {msg}"));
        }
        if warnings.is_empty() {
            None
        } else {
            Some(warnings.join("; "))
        }
    }
}

/// A read-only view of an order for the admin retry endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDiagnostics {
    pub order: Order,
    pub entitlement: Option<Entitlement>,
}
