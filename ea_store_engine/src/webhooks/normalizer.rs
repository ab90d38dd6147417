use std::collections::HashMap;

use eas_common::Money;
use log::*;
use serde_json::Value;

use crate::{
    db_types::OrderId,
    traits::{OrderManagement, PaymentGateway, WebhookHeaders},
    verdict::{PaymentProvider, PaymentVerdict},
    webhooks::WebhookError,
};

/// Query-string parameters on the webhook URL.
pub type WebhookQuery = HashMap<String, String>;

const PESAPAL_TRACKING_ID: [&str; 2] = ["order_tracking_id", "OrderTrackingId"];
const PESAPAL_MERCHANT_REF: [&str; 3] = ["order_merchant_reference", "OrderMerchantReference", "orderId"];
const PAYPAL_SUCCESS_EVENTS: [&str; 2] = ["CHECKOUT.ORDER.APPROVED", "PAYMENT.CAPTURE.COMPLETED"];
const PAYPAL_SIGNATURE_HEADERS: [&str; 5] = [
    "paypal-transmission-id",
    "paypal-transmission-time",
    "paypal-transmission-sig",
    "paypal-cert-url",
    "paypal-auth-algo",
];
const GENERIC_SUCCESS_STATUSES: [&str; 4] = ["completed", "success", "successful", "paid"];

/// Works out which provider sent `body`. Returns `None` if the body is not a JSON object at all.
///
/// Pesapal IPNs may carry their identifiers on the query string instead of the body, so `query` is consulted too.
pub fn detect_provider(body: &Value, query: &WebhookQuery) -> Option<PaymentProvider> {
    if PESAPAL_TRACKING_ID.iter().any(|k| body.get(k).is_some() || query.contains_key(*k)) {
        return Some(PaymentProvider::Pesapal);
    }
    if !body.is_object() {
        return None;
    }
    if body.pointer("/Body/stkCallback").is_some() {
        return Some(PaymentProvider::Mpesa);
    }
    if body.get("event_type").is_some() && body.get("resource").is_some() {
        return Some(PaymentProvider::Paypal);
    }
    Some(PaymentProvider::Generic)
}

/// Turns raw provider notifications into [`PaymentVerdict`]s.
///
/// Provider payloads are never trusted at face value where the provider offers something better: Pesapal
/// notifications are re-queried against Pesapal's status API, and PayPal deliveries must pass PayPal's signature
/// verification. M-Pesa callbacks carry no signature, so the webhook scope is expected to sit behind an IP whitelist.
/// Generic notifications carry no proof at all. Callers must authenticate them before asking for a verdict.
pub struct WebhookNormalizer<G, B> {
    gateway: G,
    db: B,
}

impl<G, B> WebhookNormalizer<G, B> {
    pub fn new(gateway: G, db: B) -> Self {
        Self { gateway, db }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }
}

impl<G, B> WebhookNormalizer<G, B>
where
    G: PaymentGateway,
    B: OrderManagement,
{
    pub async fn normalize(
        &self,
        headers: &WebhookHeaders,
        query: &WebhookQuery,
        body: &Value,
    ) -> Result<PaymentVerdict, WebhookError> {
        let provider = detect_provider(body, query)
            .ok_or_else(|| WebhookError::UnrecognizedPayload("Expected a JSON object".to_string()))?;
        trace!("🪝️ Webhook payload looks like it came from {provider}");
        let verdict = match provider {
            PaymentProvider::Pesapal => self.normalize_pesapal(query, body).await?,
            PaymentProvider::Mpesa => self.normalize_mpesa(query, body).await?,
            PaymentProvider::Paypal => self.normalize_paypal(headers, body).await?,
            PaymentProvider::Generic => normalize_generic(query, body)?,
        };
        debug!(
            "🪝️ {provider} notification for order [{}] normalized to {}",
            verdict.order_id,
            if verdict.is_success() { "success" } else { "failure" }
        );
        Ok(verdict)
    }

    /// The order is taken from Pesapal's own answer, never from the notification. If Pesapal does not report a
    /// merchant reference, the order that checkout linked to the tracking id is used. A reference in the payload that
    /// disagrees with the resolved order is refused.
    async fn normalize_pesapal(&self, query: &WebhookQuery, body: &Value) -> Result<PaymentVerdict, WebhookError> {
        let tracking_id = first_field(body, query, &PESAPAL_TRACKING_ID).ok_or(WebhookError::MissingOrderReference)?;
        let reported = self
            .gateway
            .verify_pesapal_transaction(&tracking_id)
            .await
            .map_err(|e| WebhookError::VerificationFailed(e.to_string()))?;
        let order_id = match reported.merchant_reference.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(reference) => OrderId::from(reference),
            None => self.order_for_transaction(&tracking_id).await?,
        };
        if let Some(claimed) = first_field(body, query, &PESAPAL_MERCHANT_REF) {
            if claimed != order_id.as_str() {
                warn!(
                    "🪝️ Pesapal notification for tracking id {tracking_id} claims order [{claimed}], but Pesapal says \
                     it belongs to [{order_id}]"
                );
                return Err(WebhookError::ReferenceMismatch(format!(
                    "tracking id {tracking_id} does not belong to order {claimed}"
                )));
            }
        }
        let mut verdict = if reported.success {
            PaymentVerdict::success(order_id, PaymentProvider::Pesapal)
        } else {
            let reason = format!("Pesapal reported the payment as {}", reported.status);
            PaymentVerdict::failure(order_id, PaymentProvider::Pesapal, reason)
        };
        verdict = verdict.with_transaction_id(reported.transaction_id.unwrap_or(tracking_id));
        if let Some(amount) = reported.amount {
            verdict = verdict.with_amount(amount);
        }
        Ok(verdict)
    }

    async fn normalize_mpesa(&self, query: &WebhookQuery, body: &Value) -> Result<PaymentVerdict, WebhookError> {
        let callback = body
            .pointer("/Body/stkCallback")
            .ok_or_else(|| WebhookError::UnrecognizedPayload("Missing Body.stkCallback".to_string()))?;
        let checkout_request_id = string_value(callback.get("CheckoutRequestID"));
        let result_code = callback.get("ResultCode").and_then(as_i64).ok_or_else(|| {
            WebhookError::UnrecognizedPayload("The STK callback does not carry a ResultCode".to_string())
        })?;
        let items = callback.pointer("/CallbackMetadata/Item").and_then(Value::as_array).cloned().unwrap_or_default();
        let metadata = |name: &str| items.iter().find(|i| i.get("Name").and_then(Value::as_str) == Some(name));
        let amount = metadata("Amount").and_then(|i| i.get("Value")).and_then(as_money);
        let receipt = metadata("MpesaReceiptNumber").and_then(|i| string_value(i.get("Value")));

        let order_id = match query.get("orderId").filter(|s| !s.is_empty()) {
            Some(id) => OrderId::from(id.as_str()),
            None => {
                let checkout_request_id =
                    checkout_request_id.as_deref().ok_or(WebhookError::MissingOrderReference)?;
                self.order_for_transaction(checkout_request_id).await?
            },
        };
        let mut verdict = if result_code == 0 {
            PaymentVerdict::success(order_id, PaymentProvider::Mpesa)
        } else {
            let desc = string_value(callback.get("ResultDesc")).unwrap_or_else(|| "no description".to_string());
            let reason = format!("M-Pesa result code {result_code}: {desc}");
            PaymentVerdict::failure(order_id, PaymentProvider::Mpesa, reason)
        };
        if let Some(tx_id) = receipt.or(checkout_request_id) {
            verdict = verdict.with_transaction_id(tx_id);
        }
        if let Some(amount) = amount {
            verdict = verdict.with_amount(amount);
        }
        Ok(verdict)
    }

    /// The order that checkout linked to a provider reference (Pesapal tracking id or M-Pesa `CheckoutRequestID`).
    async fn order_for_transaction(&self, transaction_id: &str) -> Result<OrderId, WebhookError> {
        let order = self
            .db
            .fetch_order_by_transaction_id(transaction_id)
            .await
            .map_err(|e| WebhookError::StoreUnavailable(e.to_string()))?
            .ok_or(WebhookError::MissingOrderReference)?;
        debug!("🪝️ Provider reference {transaction_id} belongs to order [{}]", order.order_id);
        Ok(order.order_id)
    }

    async fn normalize_paypal(&self, headers: &WebhookHeaders, body: &Value) -> Result<PaymentVerdict, WebhookError> {
        if let Some(missing) = PAYPAL_SIGNATURE_HEADERS.iter().find(|h| !headers.contains_key(**h)) {
            warn!("🪝️ PayPal webhook rejected. Header {missing} is missing.");
            return Err(WebhookError::InvalidSignature(format!("Missing {missing} header")));
        }
        let verified = self
            .gateway
            .verify_paypal_webhook(headers, body)
            .await
            .map_err(|e| WebhookError::VerificationFailed(e.to_string()))?;
        if !verified {
            warn!("🪝️ PayPal webhook rejected. PayPal did not confirm the signature.");
            return Err(WebhookError::InvalidSignature("PayPal did not confirm the signature".to_string()));
        }
        let event_type = body.get("event_type").and_then(Value::as_str).unwrap_or_default();
        let resource = body.get("resource").cloned().unwrap_or(Value::Null);
        let order_id = string_value(resource.get("custom_id"))
            .or_else(|| string_value(resource.pointer("/purchase_units/0/custom_id")))
            .ok_or(WebhookError::MissingOrderReference)?;
        let order_id = OrderId::from(order_id);
        let mut verdict = if PAYPAL_SUCCESS_EVENTS.contains(&event_type) {
            PaymentVerdict::success(order_id, PaymentProvider::Paypal)
        } else {
            PaymentVerdict::failure(order_id, PaymentProvider::Paypal, format!("PayPal event {event_type}"))
        };
        if let Some(id) = string_value(resource.get("id")) {
            verdict = verdict.with_transaction_id(id);
        }
        let amount = resource
            .pointer("/amount/value")
            .or_else(|| resource.pointer("/purchase_units/0/amount/value"))
            .and_then(as_money);
        if let Some(amount) = amount {
            verdict = verdict.with_amount(amount);
        }
        Ok(verdict)
    }
}

fn normalize_generic(query: &WebhookQuery, body: &Value) -> Result<PaymentVerdict, WebhookError> {
    let order_id = string_value(body.get("orderId"))
        .or_else(|| query.get("orderId").cloned())
        .filter(|s| !s.is_empty())
        .ok_or(WebhookError::MissingOrderReference)?;
    let order_id = OrderId::from(order_id);
    let status = string_value(body.get("status")).unwrap_or_default();
    let success = GENERIC_SUCCESS_STATUSES.iter().any(|s| s.eq_ignore_ascii_case(status.trim()));
    let mut verdict = if success {
        PaymentVerdict::success(order_id, PaymentProvider::Generic)
    } else {
        let reason = if status.is_empty() { "No payment status given".to_string() } else { format!("Status {status}") };
        PaymentVerdict::failure(order_id, PaymentProvider::Generic, reason)
    };
    if let Some(tx_id) = string_value(body.get("transactionId")) {
        verdict = verdict.with_transaction_id(tx_id);
    }
    Ok(verdict)
}

/// The first non-empty value for any of `keys`, looking in the body before the query string.
fn first_field(body: &Value, query: &WebhookQuery, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| string_value(body.get(*k)))
        .or_else(|| keys.iter().find_map(|k| query.get(*k).filter(|v| !v.is_empty()).cloned()))
}

/// Providers are inconsistent about quoting numbers, so both strings and numbers are accepted.
fn string_value(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_money(v: &Value) -> Option<Money> {
    match v {
        Value::Number(n) => n.as_f64().and_then(|f| Money::from_major_f64(f).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
