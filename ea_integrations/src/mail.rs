use std::sync::Arc;

use log::*;
use reqwest::Client;

use crate::{config::MailConfig, data_objects::OutgoingEmail, IntegrationError};

/// A client for a transactional mail service that accepts `{from, to, subject, text}` as JSON with a bearer key.
#[derive(Clone)]
pub struct MailApi {
    config: MailConfig,
    client: Arc<Client>,
}

impl MailApi {
    pub fn new(config: MailConfig) -> Result<Self, IntegrationError> {
        let client = Client::builder().build().map_err(|e| IntegrationError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &MailConfig {
        &self.config
    }

    pub fn email(&self, to: &str, subject: &str, text: &str) -> OutgoingEmail {
        OutgoingEmail {
            from: self.config.from.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            text: text.to_string(),
        }
    }

    pub async fn send(&self, email: &OutgoingEmail) -> Result<(), IntegrationError> {
        if !self.config.is_configured() {
            return Err(IntegrationError::NotConfigured("Mail".into()));
        }
        debug!("📧️ Sending \"{}\" to {}", email.subject, email.to);
        let mut request = self.client.post(&self.config.api_url).json(email);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(self.config.api_key.reveal());
        }
        let response = request.send().await.map_err(|e| IntegrationError::RestRequestError(e.to_string()))?;
        if response.status().is_success() {
            info!("📧️ Sent \"{}\" to {}", email.subject, email.to);
            Ok(())
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            warn!("📧️ Mail API refused \"{}\" for {}. {status}: {message}", email.subject, email.to);
            Err(IntegrationError::QueryError { status, message })
        }
    }
}
