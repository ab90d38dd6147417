//! Adapters that let the `ea_integrations` HTTP clients stand in for the engine's collaborator traits.
mod gateway;
mod mailer;

pub use gateway::{gateway_error, ProviderGateway};
pub use mailer::{confirmation_email, MailNotifier};
