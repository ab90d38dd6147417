use thiserror::Error;

use crate::traits::PurchaseConfirmation;

#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error("The mail service rejected the message: {0}")]
    Rejected(String),
    #[error("Could not reach the mail service: {0}")]
    Unavailable(String),
    #[error("Timed out after {0} seconds waiting for the mail service")]
    Timeout(u64),
}

/// Sends customer-facing notifications.
#[allow(async_fn_in_trait)]
pub trait Notifier {
    async fn send_purchase_confirmation(&self, confirmation: &PurchaseConfirmation) -> Result<(), NotificationError>;
}
