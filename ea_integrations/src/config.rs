use eas_common::Secret;
use log::*;

fn env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        warn!("{key} not set, using {default} as default");
        default.to_string()
    })
}

fn env_secret(key: &str) -> Secret<String> {
    Secret::new(std::env::var(key).unwrap_or_else(|_| {
        warn!("{key} not set. The integration that needs it will be disabled.");
        String::default()
    }))
}

#[derive(Debug, Clone, Default)]
pub struct PesapalConfig {
    pub base_url: String,
    pub consumer_key: Secret<String>,
    pub consumer_secret: Secret<String>,
    /// The id Pesapal assigned when the IPN URL was registered.
    pub ipn_id: String,
}

impl PesapalConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = env_or_default("EAS_PESAPAL_BASE_URL", "https://cybqa.pesapal.com/pesapalv3");
        let consumer_key = env_secret("EAS_PESAPAL_CONSUMER_KEY");
        let consumer_secret = env_secret("EAS_PESAPAL_CONSUMER_SECRET");
        let ipn_id = std::env::var("EAS_PESAPAL_IPN_ID").unwrap_or_else(|_| {
            warn!("EAS_PESAPAL_IPN_ID not set. Pesapal will not send IPN notifications for new orders.");
            String::default()
        });
        Self { base_url, consumer_key, consumer_secret, ipn_id }
    }

    pub fn is_configured(&self) -> bool {
        !self.consumer_key.is_empty() && !self.consumer_secret.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MpesaConfig {
    pub base_url: String,
    pub consumer_key: Secret<String>,
    pub consumer_secret: Secret<String>,
    pub shortcode: String,
    pub passkey: Secret<String>,
}

impl MpesaConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = env_or_default("EAS_MPESA_BASE_URL", "https://sandbox.safaricom.co.ke");
        let consumer_key = env_secret("EAS_MPESA_CONSUMER_KEY");
        let consumer_secret = env_secret("EAS_MPESA_CONSUMER_SECRET");
        let shortcode = env_or_default("EAS_MPESA_SHORTCODE", "174379");
        let passkey = env_secret("EAS_MPESA_PASSKEY");
        Self { base_url, consumer_key, consumer_secret, shortcode, passkey }
    }

    pub fn is_configured(&self) -> bool {
        !self.consumer_key.is_empty() && !self.consumer_secret.is_empty() && !self.passkey.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PaypalConfig {
    pub base_url: String,
    pub client_id: Secret<String>,
    pub client_secret: Secret<String>,
    pub webhook_id: Secret<String>,
}

impl PaypalConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = env_or_default("EAS_PAYPAL_BASE_URL", "https://api-m.sandbox.paypal.com");
        let client_id = env_secret("EAS_PAYPAL_CLIENT_ID");
        let client_secret = env_secret("EAS_PAYPAL_CLIENT_SECRET");
        let webhook_id = env_secret("EAS_PAYPAL_WEBHOOK_ID");
        Self { base_url, client_id, client_secret, webhook_id }
    }

    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: Secret<String>,
    pub from: String,
}

impl MailConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("EAS_MAIL_API_URL").unwrap_or_else(|_| {
            warn!("EAS_MAIL_API_URL not set. Confirmation emails will only be logged.");
            String::default()
        });
        let api_key = env_secret("EAS_MAIL_API_KEY");
        let from = env_or_default("EAS_MAIL_FROM", "EA Store <no-reply@example.com>");
        Self { api_url, api_key, from }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_url.trim().is_empty()
    }
}
