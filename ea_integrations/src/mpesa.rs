use std::sync::Arc;

use chrono::Utc;
use log::*;
use reqwest::Client;

use crate::{
    config::MpesaConfig,
    data_objects::{MpesaTokenResponse, StkPushRequest, StkPushResponse},
    helpers::{mpesa_password, mpesa_timestamp, normalize_msisdn, parse_response},
    token::{AccessToken, TokenCache},
    IntegrationError,
};

#[derive(Clone)]
pub struct MpesaApi {
    config: MpesaConfig,
    client: Arc<Client>,
    token: TokenCache,
}

/// The parameters of an STK push, before they are dressed up in Daraja's request format.
#[derive(Debug, Clone)]
pub struct StkPush {
    pub phone: String,
    /// Whole shillings. Daraja does not accept cents.
    pub amount: i64,
    pub account_reference: String,
    pub description: String,
    pub callback_url: String,
}

impl MpesaApi {
    pub fn new(config: MpesaConfig) -> Result<Self, IntegrationError> {
        let client = Client::builder().build().map_err(|e| IntegrationError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), token: TokenCache::default() })
    }

    pub fn config(&self) -> &MpesaConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn access_token(&self) -> Result<String, IntegrationError> {
        if !self.config.is_configured() {
            return Err(IntegrationError::NotConfigured("M-Pesa".into()));
        }
        if let Some(token) = self.token.current().await {
            return Ok(token);
        }
        trace!("📱️ Requesting a new Daraja access token");
        let response = self
            .client
            .get(self.url("/oauth/v1/generate"))
            .query(&[("grant_type", "client_credentials")])
            .basic_auth(self.config.consumer_key.reveal(), Some(self.config.consumer_secret.reveal()))
            .send()
            .await
            .map_err(|e| IntegrationError::RestRequestError(e.to_string()))?;
        let result = parse_response::<MpesaTokenResponse>(response).await?;
        let expires_in = match &result.expires_in {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
        .unwrap_or(3599);
        Ok(self.token.store(AccessToken::new(result.access_token, expires_in)).await)
    }

    /// Builds the Daraja request for `push`. The timestamp and password are derived from `timestamp`.
    pub fn stk_push_request(&self, push: &StkPush, timestamp: &str) -> Result<StkPushRequest, IntegrationError> {
        let phone = normalize_msisdn(&push.phone)?;
        let shortcode = self.config.shortcode.clone();
        Ok(StkPushRequest {
            password: mpesa_password(&shortcode, self.config.passkey.reveal(), timestamp),
            timestamp: timestamp.to_string(),
            transaction_type: "CustomerPayBillOnline".to_string(),
            amount: push.amount,
            party_a: phone.clone(),
            party_b: shortcode.clone(),
            business_short_code: shortcode,
            phone_number: phone,
            callback_url: push.callback_url.clone(),
            account_reference: push.account_reference.clone(),
            transaction_desc: push.description.clone(),
        })
    }

    /// Sends a payment prompt to the customer's phone. The returned `CheckoutRequestID` identifies the eventual
    /// callback.
    pub async fn stk_push(&self, push: &StkPush) -> Result<StkPushResponse, IntegrationError> {
        let request = self.stk_push_request(push, &mpesa_timestamp(Utc::now()))?;
        let token = self.access_token().await?;
        debug!("📱️ Sending STK push for {} to {}", push.account_reference, request.phone_number);
        let response = self
            .client
            .post(self.url("/mpesa/stkpush/v1/processrequest"))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| IntegrationError::RestRequestError(e.to_string()))?;
        let result = parse_response::<StkPushResponse>(response).await?;
        if !result.is_accepted() {
            let reason = result.response_description.clone().unwrap_or_else(|| "STK push was not accepted".into());
            return Err(IntegrationError::Rejected(reason));
        }
        info!(
            "📱️ STK push for {} accepted. CheckoutRequestID: {}",
            push.account_reference,
            result.checkout_request_id.as_deref().unwrap_or("none")
        );
        Ok(result)
    }
}
