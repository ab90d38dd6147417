use serde_json::Value;
use thiserror::Error;

use crate::traits::data_objects::{PaymentInitiation, PaymentRequest, PaypalCapture, ProviderVerdict, WebhookHeaders};

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("{0} is not configured")]
    NotConfigured(String),
    #[error("The payment provider could not be reached: {0}")]
    Unavailable(String),
    #[error("The payment provider refused the request: {0}")]
    Rejected(String),
    #[error("The payment provider sent a response we could not understand: {0}")]
    InvalidResponse(String),
}

/// The three payment providers, viewed from the fulfillment engine.
///
/// Protocol details (authentication, endpoints, payload shapes) belong to the implementation. The engine only cares
/// about the result of initiating a payment and the result of asking a provider what really happened.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// Starts a payment with the provider named in the request.
    async fn initiate_payment(&self, request: &PaymentRequest) -> Result<PaymentInitiation, GatewayError>;

    /// Queries Pesapal for the authoritative status of a transaction.
    async fn verify_pesapal_transaction(&self, order_tracking_id: &str) -> Result<ProviderVerdict, GatewayError>;

    /// Asks PayPal whether the webhook delivery carrying `event` and `headers` is authentic.
    async fn verify_paypal_webhook(&self, headers: &WebhookHeaders, event: &Value) -> Result<bool, GatewayError>;

    /// Captures an approved PayPal order, identified by the `token` PayPal returns the buyer with.
    async fn capture_paypal_order(&self, token: &str) -> Result<PaypalCapture, GatewayError>;
}
