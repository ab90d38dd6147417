//! EA Store Engine
//!
//! The engine behind the EA storefront: it takes asynchronous, possibly duplicated and possibly out-of-order payment
//! notifications from Pesapal, M-Pesa and PayPal, and drives each order to a terminal outcome with side effects that
//! happen exactly once (an entitlement grant and a confirmation email).
//!
//! The library is divided into these main sections:
//! 1. Data types ([`mod@db_types`]) and the backend traits ([`mod@traits`]) that a storage backend or an external
//!    collaborator (payment gateway, mail service, catalog) must implement. A SQLite backend is provided.
//! 2. The public API ([`FulfillmentApi`], [`CheckoutApi`], [`EntitlementApi`]). Every way an order can become paid goes
//!    through [`FulfillmentApi::complete`].
//! 3. The webhook normalizer ([`mod@webhooks`]), which reduces provider payloads to a [`PaymentVerdict`].
//!
//! The engine also emits events when orders complete or fail, or when a verdict contradicts an order's state. See
//! [`mod@events`].
mod api;

pub mod catalog;
pub mod db_types;
pub mod events;
pub mod traits;
pub mod verdict;
pub mod webhooks;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use api::{
    checkout_api::CheckoutApi,
    entitlement_api::EntitlementApi,
    errors::FulfillmentError,
    fulfillment_api::{FulfillmentApi, FulfillmentOptions, DEFAULT_EMAIL_LEASE_MINUTES, DEFAULT_EMAIL_TIMEOUT},
    fulfillment_objects,
};
pub use catalog::{CatalogError, StaticCatalog};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    ArtifactCatalog,
    EntitlementManagement,
    FulfillmentDatabase,
    Notifier,
    OrderManagement,
    PaymentGateway,
};
pub use verdict::{PaymentProvider, PaymentVerdict, VerdictOutcome};
pub use webhooks::{WebhookError, WebhookNormalizer};
