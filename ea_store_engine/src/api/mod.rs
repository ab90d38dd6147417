//! # EA store engine public API
//!
//! The pattern for all the APIs is the same as for the storage traits: an API instance is created by supplying a
//! backend that implements the traits the API needs.
//!
//! * [`fulfillment_api`] is the single entry point that applies payment verdicts and drives side effects. Webhooks,
//!   the PayPal return handler and the admin endpoints all go through it.
//! * [`checkout_api`] creates orders and records what happened when a payment was initiated.
//! * [`entitlement_api`] serves the customer's list of downloadable artifacts.
//!
//! ```rust,ignore
//! use ea_store_engine::{FulfillmentApi, SqliteDatabase, StaticCatalog, events::EventProducers};
//! let db = SqliteDatabase::new_with_url("sqlite://data/ea_store.db", 5).await?;
//! let catalog = StaticCatalog::from_file("catalog.json")?;
//! let api = FulfillmentApi::new(db, catalog, notifier, EventProducers::default());
//! let report = api.complete(&order_id, &verdict).await?;
//! ```
pub mod checkout_api;
pub mod entitlement_api;
pub mod errors;
pub mod fulfillment_api;
pub mod fulfillment_objects;
