//! # Backend and collaborator contracts
//!
//! The fulfillment engine never talks to SQLite, a payment provider or a mail service directly. Everything it needs
//! from the outside world is expressed by the traits in this module, and the APIs in [`crate::api`] are generic over
//! them.
//!
//! * [`OrderManagement`] stores orders and exposes the conditional writes that make fulfillment idempotent.
//! * [`EntitlementManagement`] stores customers and their entitlements.
//! * [`FulfillmentDatabase`] is shorthand for a backend that does both.
//! * [`ArtifactCatalog`] resolves a display name to a downloadable artifact.
//! * [`Notifier`] sends the purchase confirmation email.
//! * [`PaymentGateway`] initiates payments and answers verification queries for the three providers.
mod catalog;
mod data_objects;
mod entitlement_management;
mod notifier;
mod order_management;
mod payment_gateway;

pub use catalog::{Artifact, ArtifactCatalog};
pub use data_objects::{
    GrantResult,
    PaymentInitiation,
    PaymentRequest,
    PaypalCapture,
    ProviderVerdict,
    PurchaseConfirmation,
    WebhookHeaders,
};
pub use entitlement_management::EntitlementManagement;
pub use notifier::{NotificationError, Notifier};
pub use order_management::{OrderManagement, StoreError};
pub use payment_gateway::{GatewayError, PaymentGateway};

/// A backend that can carry an order through the entire fulfillment flow.
pub trait FulfillmentDatabase: OrderManagement + EntitlementManagement {}

impl<T> FulfillmentDatabase for T where T: OrderManagement + EntitlementManagement {}
