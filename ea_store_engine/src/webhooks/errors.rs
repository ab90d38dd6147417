use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum WebhookError {
    #[error("The notification does not identify an order")]
    MissingOrderReference,
    #[error("The notification is not from a payment provider we recognise: {0}")]
    UnrecognizedPayload(String),
    #[error("The notification signature is invalid: {0}")]
    InvalidSignature(String),
    #[error("The notification names a different order than the payment provider does: {0}")]
    ReferenceMismatch(String),
    #[error("Could not verify the notification with the payment provider: {0}")]
    VerificationFailed(String),
    #[error("The order store is unavailable: {0}")]
    StoreUnavailable(String),
}
