use std::collections::HashMap;

use eas_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{Entitlement, OrderId, PaymentMethod};

/// HTTP headers of an inbound webhook, keyed by lower-case header name.
pub type WebhookHeaders = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantResult {
    Granted(Entitlement),
    AlreadyGranted(Entitlement),
}

impl GrantResult {
    pub fn entitlement(&self) -> &Entitlement {
        match self {
            GrantResult::Granted(e) | GrantResult::AlreadyGranted(e) => e,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, GrantResult::Granted(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseConfirmation {
    pub order_id: OrderId,
    pub email: String,
    pub artifact_name: String,
    pub version: Option<String>,
    pub amount: Money,
    pub currency: String,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub amount: Money,
    pub currency: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInitiation {
    /// The provider's reference for this payment: Pesapal's order tracking id, M-Pesa's `CheckoutRequestID` or the
    /// PayPal order id.
    pub transaction_id: String,
    /// Where to send the buyer, for providers with a hosted payment page.
    pub redirect_url: Option<String>,
    pub message: String,
}

/// The result of asking a provider directly for the status of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderVerdict {
    pub success: bool,
    pub status: String,
    pub transaction_id: Option<String>,
    pub merchant_reference: Option<String>,
    pub amount: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaypalCapture {
    pub paypal_order_id: String,
    pub completed: bool,
    pub status: String,
    pub custom_id: Option<String>,
    pub capture_id: Option<String>,
    pub amount: Option<Money>,
}
