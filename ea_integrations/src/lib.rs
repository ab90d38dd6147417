//! HTTP clients for the services the store talks to: the Pesapal v3 API, Safaricom's M-Pesa Daraja API, the PayPal
//! REST API and a transactional mail API.
//!
//! The clients know nothing about orders or entitlements. The server wraps them in adapters that implement the
//! engine's `PaymentGateway` and `Notifier` traits.
mod config;
mod error;
mod helpers;
mod token;

pub mod data_objects;
pub mod mail;
pub mod mpesa;
pub mod paypal;
pub mod pesapal;

pub use config::{MailConfig, MpesaConfig, PaypalConfig, PesapalConfig};
pub use error::IntegrationError;
pub use helpers::{mpesa_password, mpesa_timestamp, normalize_msisdn, paypal_amount};
pub use mail::MailApi;
pub use mpesa::MpesaApi;
pub use paypal::PaypalApi;
pub use pesapal::PesapalApi;
