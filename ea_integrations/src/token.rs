use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use eas_common::Secret;
use tokio::sync::Mutex;

/// Tokens are treated as expired this long before the provider says they are.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub(crate) struct AccessToken {
    pub token: Secret<String>,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: String, expires_in_secs: i64) -> Self {
        let lifetime = (expires_in_secs - EXPIRY_MARGIN_SECS).max(0);
        Self { token: Secret::new(token), expires_at: Utc::now() + Duration::seconds(lifetime) }
    }

    pub fn is_fresh(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

/// A shared slot for an OAuth token. Clones of an API client share the same cache.
#[derive(Debug, Clone, Default)]
pub(crate) struct TokenCache {
    slot: Arc<Mutex<Option<AccessToken>>>,
}

impl TokenCache {
    pub async fn current(&self) -> Option<String> {
        let slot = self.slot.lock().await;
        slot.as_ref().filter(|t| t.is_fresh()).map(|t| t.token.reveal().clone())
    }

    pub async fn store(&self, token: AccessToken) -> String {
        let value = token.token.reveal().clone();
        *self.slot.lock().await = Some(token);
        value
    }
}
