use chrono::{DateTime, FixedOffset, Utc};
use eas_common::Money;
use reqwest::Response;
use serde::de::DeserializeOwned;

use crate::IntegrationError;

const EAT_OFFSET_SECS: i32 = 3 * 3600;

/// Daraja timestamps are `YYYYMMDDHHmmss` in East Africa Time.
pub fn mpesa_timestamp(now: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(EAT_OFFSET_SECS) {
        Some(eat) => now.with_timezone(&eat).format("%Y%m%d%H%M%S").to_string(),
        None => now.format("%Y%m%d%H%M%S").to_string(),
    }
}

/// The STK push password: `base64(shortcode + passkey + timestamp)`.
pub fn mpesa_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    base64::encode(format!("{shortcode}{passkey}{timestamp}"))
}

/// Converts a Kenyan phone number into the `2547XXXXXXXX` form Daraja expects. Accepts `07..`, `7..`, `+254..` and
/// `254..`, with or without spaces.
pub fn normalize_msisdn(phone: &str) -> Result<String, IntegrationError> {
    let digits = phone.chars().filter(|c| !c.is_whitespace() && *c != '-').collect::<String>();
    let digits = digits.strip_prefix('+').unwrap_or(&digits);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(IntegrationError::InvalidPhoneNumber(phone.to_string()));
    }
    let msisdn = if let Some(rest) = digits.strip_prefix("254") {
        format!("254{rest}")
    } else if let Some(rest) = digits.strip_prefix('0') {
        format!("254{rest}")
    } else {
        format!("254{digits}")
    };
    if msisdn.len() == 12 {
        Ok(msisdn)
    } else {
        Err(IntegrationError::InvalidPhoneNumber(phone.to_string()))
    }
}

/// PayPal amounts are decimal strings with two places.
pub fn paypal_amount(amount: Money) -> String {
    amount.to_string()
}

/// Deserializes a successful response, or turns a failed one into a `QueryError` carrying the body text.
pub(crate) async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, IntegrationError> {
    if response.status().is_success() {
        response.json::<T>().await.map_err(|e| IntegrationError::JsonError(e.to_string()))
    } else {
        let status = response.status().as_u16();
        let message = response.text().await.map_err(|e| IntegrationError::RestResponseError(e.to_string()))?;
        Err(IntegrationError::QueryError { status, message })
    }
}
