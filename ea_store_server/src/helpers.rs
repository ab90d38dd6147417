use std::{net::IpAddr, str::FromStr};

use actix_web::HttpRequest;
use ea_store_engine::traits::WebhookHeaders;
use eas_common::Secret;
use hmac::{Hmac, Mac};
use log::{debug, trace, warn};
use regex::Regex;
use sha2::Sha256;

use crate::errors::ServerError;

type HmacSha256 = Hmac<Sha256>;

const ADMIN_SECRET_DOMAIN: &[u8] = b"eas-admin-secret";
const WEBHOOK_SECRET_DOMAIN: &[u8] = b"eas-webhook-secret";
pub const WEBHOOK_SECRET_HEADER: &str = "X-Webhook-Secret";

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in decreasing order
/// of preference:
/// 1. The `X-Forwarded-For` header, iif `use_x_forwarded_for` is set to true in the configuration.
/// 2. The `Forwarded` header, iif `use_forwarded` is set to true in the configuration.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        // The left-most address is the original client
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| IpAddr::from_str(s.trim()).ok());
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        result = req.headers().get("Forwarded").and_then(|v| v.to_str().ok()).and_then(parse_forwarded_for);
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.connection_info().peer_addr().map(|a| a.to_string());
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr.and_then(|s| IpAddr::from_str(&s).ok())
    })
}

fn parse_forwarded_for(header: &str) -> Option<IpAddr> {
    let re = Regex::new(r#"for="?(?P<ip>[^;,"]+)"#).ok()?;
    re.captures(header).and_then(|caps| caps.name("ip")).and_then(|m| IpAddr::from_str(m.as_str()).ok())
}

/// Compares the supplied admin secret with the configured one in constant time. An unset admin secret refuses
/// everything. The error never says what was wrong.
pub fn check_admin_secret(expected: &Secret<String>, supplied: &str) -> Result<(), ServerError> {
    if expected.is_empty() {
        warn!("🔐️ Admin request refused. EAS_ADMIN_SECRET is not configured.");
        return Err(ServerError::Unauthorized);
    }
    if !secrets_match(ADMIN_SECRET_DOMAIN, expected, supplied) {
        warn!("🔐️ Admin request refused. Invalid credentials.");
        return Err(ServerError::Unauthorized);
    }
    Ok(())
}

/// Generic payment notifications carry no provider proof, so they must present the shared webhook secret in the
/// `X-Webhook-Secret` header. An unset webhook secret refuses every generic notification.
pub fn check_webhook_secret(expected: &Secret<String>, req: &HttpRequest) -> Result<(), ServerError> {
    if expected.is_empty() {
        warn!("🔐️ Generic payment notification refused. EAS_WEBHOOK_SECRET is not configured.");
        return Err(ServerError::Unauthorized);
    }
    let supplied = req.headers().get(WEBHOOK_SECRET_HEADER).and_then(|v| v.to_str().ok()).unwrap_or_default();
    if !secrets_match(WEBHOOK_SECRET_DOMAIN, expected, supplied) {
        warn!("🔐️ Generic payment notification refused. Missing or invalid {WEBHOOK_SECRET_HEADER} header.");
        return Err(ServerError::Unauthorized);
    }
    Ok(())
}

/// Both sides are run through the same keyed hash and the tags compared with `verify_slice`, which is constant time.
fn secrets_match(domain: &[u8], expected: &Secret<String>, supplied: &str) -> bool {
    let Some(tag) = secret_tag(domain, expected.reveal().as_bytes()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(domain) else {
        return false;
    };
    mac.update(supplied.as_bytes());
    mac.verify_slice(&tag).is_ok()
}

fn secret_tag(domain: &[u8], secret: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(domain).ok()?;
    mac.update(secret);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Collects the request headers into a map keyed by lower-case header name.
pub fn webhook_headers(req: &HttpRequest) -> WebhookHeaders {
    req.headers()
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_lowercase(), v.to_string())))
        .collect()
}

/// Appends query parameters to `base`, which may or may not already have a query string. Keys and values are
/// percent-encoded.
pub fn url_with_params(base: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return base.to_string();
    }
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{query}")
}
