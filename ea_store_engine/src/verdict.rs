use std::fmt::Display;

use eas_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::OrderId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Pesapal,
    Mpesa,
    Paypal,
    /// A provider-neutral notification, such as a manual completion or a simple `{orderId, status}` callback.
    Generic,
}

impl Display for PaymentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentProvider::Pesapal => write!(f, "Pesapal"),
            PaymentProvider::Mpesa => write!(f, "M-Pesa"),
            PaymentProvider::Paypal => write!(f, "PayPal"),
            PaymentProvider::Generic => write!(f, "generic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictOutcome {
    Success,
    Failure { reason: String },
}

/// The provider-neutral judgement on a payment. Every inbound notification is reduced to one of these before the
/// fulfillment engine sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentVerdict {
    pub order_id: OrderId,
    pub outcome: VerdictOutcome,
    pub transaction_id: Option<String>,
    pub amount: Option<Money>,
    pub provider: PaymentProvider,
}

impl PaymentVerdict {
    pub fn success(order_id: OrderId, provider: PaymentProvider) -> Self {
        Self { order_id, outcome: VerdictOutcome::Success, transaction_id: None, amount: None, provider }
    }

    pub fn failure<S: Into<String>>(order_id: OrderId, provider: PaymentProvider, reason: S) -> Self {
        let outcome = VerdictOutcome::Failure { reason: reason.into() };
        Self { order_id, outcome, transaction_id: None, amount: None, provider }
    }

    pub fn with_transaction_id<S: Into<String>>(mut self, transaction_id: S) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, VerdictOutcome::Success)
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            VerdictOutcome::Success => None,
            VerdictOutcome::Failure { reason } => Some(reason.as_str()),
        }
    }
}
