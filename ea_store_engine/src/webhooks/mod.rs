//! Reduces provider-specific payment notifications to a [`crate::PaymentVerdict`].
mod errors;
mod normalizer;

pub use errors::WebhookError;
pub use normalizer::{detect_provider, WebhookNormalizer, WebhookQuery};
