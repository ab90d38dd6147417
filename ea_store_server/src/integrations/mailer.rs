use ea_integrations::{data_objects::OutgoingEmail, IntegrationError, MailApi, MailConfig};
use ea_store_engine::{
    traits::{NotificationError, PurchaseConfirmation},
    Notifier,
};
use log::*;

use crate::errors::ServerError;

/// Sends purchase confirmations through the mail API. Without a configured mail API, confirmations are only logged
/// and count as sent.
#[derive(Clone)]
pub struct MailNotifier {
    mail: Option<MailApi>,
    from: String,
    dashboard_url: String,
}

impl MailNotifier {
    pub fn new(config: &MailConfig, dashboard_url: &str) -> Result<Self, ServerError> {
        let mail = if config.is_configured() {
            info!("📧️ Confirmation emails will be sent through {}", config.api_url);
            Some(MailApi::new(config.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?)
        } else {
            warn!("📧️ No mail API is configured. Confirmation emails will be logged, not sent.");
            None
        };
        Ok(Self { mail, from: config.from.clone(), dashboard_url: dashboard_url.to_string() })
    }

    pub fn log_only(dashboard_url: &str) -> Self {
        Self { mail: None, from: String::default(), dashboard_url: dashboard_url.to_string() }
    }
}

pub fn confirmation_email(from: &str, confirmation: &PurchaseConfirmation, dashboard_url: &str) -> OutgoingEmail {
    let version = confirmation.version.as_deref().map(|v| format!(" v{v}")).unwrap_or_default();
    let subject = format!("Your purchase: {}{version}", confirmation.artifact_name);
    let reference = confirmation.transaction_id.as_deref().unwrap_or("n/a");
    let text = format!(
        "Thank you for your purchase!\n\nProduct: {}{version}\nOrder: {}\nAmount: {} {}\nPayment reference: \
         {reference}\n\nYour download is ready in your dashboard: {dashboard_url}\n",
        confirmation.artifact_name, confirmation.order_id, confirmation.currency, confirmation.amount
    );
    OutgoingEmail { from: from.to_string(), to: confirmation.email.clone(), subject, text }
}

fn notification_error(e: IntegrationError) -> NotificationError {
    match e {
        IntegrationError::RestRequestError(msg) => NotificationError::Unavailable(msg),
        IntegrationError::QueryError { status, message } if status >= 500 => {
            NotificationError::Unavailable(format!("{status}: {message}"))
        },
        IntegrationError::NotConfigured(what) => NotificationError::Unavailable(format!("{what} is not configured")),
        other => NotificationError::Rejected(other.to_string()),
    }
}

impl Notifier for MailNotifier {
    async fn send_purchase_confirmation(&self, confirmation: &PurchaseConfirmation) -> Result<(), NotificationError> {
        let email = confirmation_email(&self.from, confirmation, &self.dashboard_url);
        match &self.mail {
            Some(mail) => mail.send(&email).await.map_err(notification_error),
            None => {
                info!("📧️ [log only] To: {} Subject: {}\n{}", email.to, email.subject, email.text);
                Ok(())
            },
        }
    }
}
