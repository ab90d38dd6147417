use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde_json::json;

use crate::{
    config::PesapalConfig,
    data_objects::{
        PesapalTokenResponse,
        PesapalTransactionStatus,
        SubmitOrderRequest,
        SubmitOrderResponse,
    },
    helpers::parse_response,
    token::{AccessToken, TokenCache},
    IntegrationError,
};

/// Pesapal tokens last five minutes.
const TOKEN_LIFETIME_SECS: i64 = 300;

#[derive(Clone)]
pub struct PesapalApi {
    config: PesapalConfig,
    client: Arc<Client>,
    token: TokenCache,
}

impl PesapalApi {
    pub fn new(config: PesapalConfig) -> Result<Self, IntegrationError> {
        let mut headers = HeaderMap::with_capacity(2);
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| IntegrationError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), token: TokenCache::default() })
    }

    pub fn config(&self) -> &PesapalConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn access_token(&self) -> Result<String, IntegrationError> {
        if !self.config.is_configured() {
            return Err(IntegrationError::NotConfigured("Pesapal".into()));
        }
        if let Some(token) = self.token.current().await {
            return Ok(token);
        }
        trace!("💳️ Requesting a new Pesapal access token");
        let body = json!({
            "consumer_key": self.config.consumer_key.reveal(),
            "consumer_secret": self.config.consumer_secret.reveal(),
        });
        let response = self
            .client
            .post(self.url("/Auth/RequestToken"))
            .json(&body)
            .send()
            .await
            .map_err(|e| IntegrationError::RestRequestError(e.to_string()))?;
        let result = parse_response::<PesapalTokenResponse>(response).await?;
        match (result.token, result.error) {
            (Some(token), _) => Ok(self.token.store(AccessToken::new(token, TOKEN_LIFETIME_SECS)).await),
            (None, Some(e)) => Err(IntegrationError::Rejected(e.describe())),
            (None, None) => Err(IntegrationError::RestResponseError("Pesapal returned no token".into())),
        }
    }

    /// Registers the order with Pesapal and returns the hosted payment page the customer is redirected to.
    pub async fn submit_order(&self, request: &SubmitOrderRequest) -> Result<SubmitOrderResponse, IntegrationError> {
        let token = self.access_token().await?;
        debug!("💳️ Submitting order {} to Pesapal", request.id);
        let response = self
            .client
            .post(self.url("/Transactions/SubmitOrderRequest"))
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|e| IntegrationError::RestRequestError(e.to_string()))?;
        let result = parse_response::<SubmitOrderResponse>(response).await?;
        if let Some(e) = result.error.as_ref().filter(|e| e.message.is_some() || e.code.is_some()) {
            return Err(IntegrationError::Rejected(e.describe()));
        }
        if result.order_tracking_id.is_none() {
            return Err(IntegrationError::RestResponseError("Pesapal did not return an order tracking id".into()));
        }
        info!("💳️ Pesapal accepted order {}", request.id);
        Ok(result)
    }

    /// Asks Pesapal for the authoritative state of a transaction.
    pub async fn transaction_status(
        &self,
        order_tracking_id: &str,
    ) -> Result<PesapalTransactionStatus, IntegrationError> {
        let token = self.access_token().await?;
        debug!("💳️ Querying Pesapal transaction status for {order_tracking_id}");
        let response = self
            .client
            .get(self.url("/Transactions/GetTransactionStatus"))
            .bearer_auth(token)
            .query(&[("orderTrackingId", order_tracking_id)])
            .send()
            .await
            .map_err(|e| IntegrationError::RestRequestError(e.to_string()))?;
        let status = parse_response::<PesapalTransactionStatus>(response).await?;
        debug!("💳️ Pesapal says {order_tracking_id} is {}", status.status_text());
        Ok(status)
    }
}
