use std::{collections::HashMap, sync::Arc};

use eas_common::Money;
use log::*;
use reqwest::{header::HeaderValue, Client};
use serde_json::{json, Value};

use crate::{
    config::PaypalConfig,
    data_objects::{PaypalOrder, PaypalTokenResponse, VerifyWebhookSignatureRequest, VerifyWebhookSignatureResponse},
    helpers::{parse_response, paypal_amount},
    token::{AccessToken, TokenCache},
    IntegrationError,
};

/// The transmission headers PayPal signs every webhook delivery with. All of them are needed to verify a signature.
pub const PAYPAL_SIGNATURE_HEADERS: [&str; 5] = [
    "paypal-auth-algo",
    "paypal-cert-url",
    "paypal-transmission-id",
    "paypal-transmission-sig",
    "paypal-transmission-time",
];

#[derive(Clone)]
pub struct PaypalApi {
    config: PaypalConfig,
    client: Arc<Client>,
    token: TokenCache,
}

/// What we need to create a PayPal order.
#[derive(Debug, Clone)]
pub struct NewPaypalOrder {
    /// Stored as `custom_id`, so that captures and webhooks can be traced back to our order.
    pub order_id: String,
    pub amount: Money,
    pub currency: String,
    pub description: String,
    pub return_url: String,
    pub cancel_url: String,
}

impl PaypalApi {
    pub fn new(config: PaypalConfig) -> Result<Self, IntegrationError> {
        let client = Client::builder().build().map_err(|e| IntegrationError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), token: TokenCache::default() })
    }

    pub fn config(&self) -> &PaypalConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn access_token(&self) -> Result<String, IntegrationError> {
        if !self.config.is_configured() {
            return Err(IntegrationError::NotConfigured("PayPal".into()));
        }
        if let Some(token) = self.token.current().await {
            return Ok(token);
        }
        trace!("🅿️ Requesting a new PayPal access token");
        let response = self
            .client
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(self.config.client_id.reveal(), Some(self.config.client_secret.reveal()))
            .header("Content-Type", HeaderValue::from_static("application/x-www-form-urlencoded"))
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|e| IntegrationError::RestRequestError(e.to_string()))?;
        let result = parse_response::<PaypalTokenResponse>(response).await?;
        Ok(self.token.store(AccessToken::new(result.access_token, result.expires_in)).await)
    }

    pub fn create_order_body(order: &NewPaypalOrder) -> Value {
        json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": order.order_id,
                "custom_id": order.order_id,
                "description": order.description,
                "amount": {
                    "currency_code": order.currency,
                    "value": paypal_amount(order.amount),
                }
            }],
            "application_context": {
                "return_url": order.return_url,
                "cancel_url": order.cancel_url,
                "user_action": "PAY_NOW",
                "shipping_preference": "NO_SHIPPING",
            }
        })
    }

    pub async fn create_order(&self, order: &NewPaypalOrder) -> Result<PaypalOrder, IntegrationError> {
        let token = self.access_token().await?;
        debug!("🅿️ Creating PayPal order for {}", order.order_id);
        let response = self
            .client
            .post(self.url("/v2/checkout/orders"))
            .bearer_auth(token)
            .json(&Self::create_order_body(order))
            .send()
            .await
            .map_err(|e| IntegrationError::RestRequestError(e.to_string()))?;
        let result = parse_response::<PaypalOrder>(response).await?;
        info!("🅿️ Created PayPal order {} for {}", result.id, order.order_id);
        Ok(result)
    }

    /// Captures an approved order. `paypal_order_id` is the `token` query parameter PayPal appends to the return URL.
    pub async fn capture_order(&self, paypal_order_id: &str) -> Result<PaypalOrder, IntegrationError> {
        let token = self.access_token().await?;
        debug!("🅿️ Capturing PayPal order {paypal_order_id}");
        let path = format!("/v2/checkout/orders/{paypal_order_id}/capture");
        let response = self
            .client
            .post(self.url(&path))
            .bearer_auth(token)
            .header("Content-Type", HeaderValue::from_static("application/json"))
            .body("{}")
            .send()
            .await
            .map_err(|e| IntegrationError::RestRequestError(e.to_string()))?;
        let result = parse_response::<PaypalOrder>(response).await?;
        info!("🅿️ PayPal order {paypal_order_id} capture status: {}", result.status);
        Ok(result)
    }

    /// Builds the verification request from the delivery headers (lower-case names). Missing headers are an error.
    pub fn verification_request(
        &self,
        headers: &HashMap<String, String>,
        event: &Value,
    ) -> Result<VerifyWebhookSignatureRequest, IntegrationError> {
        let header = |name: &str| {
            headers
                .get(name)
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .ok_or_else(|| IntegrationError::Rejected(format!("Missing {name} header")))
        };
        if self.config.webhook_id.is_empty() {
            return Err(IntegrationError::NotConfigured("PayPal webhook id".into()));
        }
        Ok(VerifyWebhookSignatureRequest {
            auth_algo: header("paypal-auth-algo")?,
            cert_url: header("paypal-cert-url")?,
            transmission_id: header("paypal-transmission-id")?,
            transmission_sig: header("paypal-transmission-sig")?,
            transmission_time: header("paypal-transmission-time")?,
            webhook_id: self.config.webhook_id.reveal().clone(),
            webhook_event: event.clone(),
        })
    }

    /// Asks PayPal whether a webhook delivery is genuine. Only a `SUCCESS` status counts.
    pub async fn verify_webhook_signature(
        &self,
        headers: &HashMap<String, String>,
        event: &Value,
    ) -> Result<bool, IntegrationError> {
        let request = self.verification_request(headers, event)?;
        let token = self.access_token().await?;
        let response = self
            .client
            .post(self.url("/v1/notifications/verify-webhook-signature"))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| IntegrationError::RestRequestError(e.to_string()))?;
        let result = parse_response::<VerifyWebhookSignatureResponse>(response).await?;
        debug!("🅿️ Webhook {} verification status: {}", request.transmission_id, result.verification_status);
        Ok(result.verification_status == "SUCCESS")
    }
}
