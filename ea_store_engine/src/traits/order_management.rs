use chrono::Duration;
use thiserror::Error;

use crate::db_types::{NewOrder, Order, OrderId};

/// Storage for orders.
///
/// Every state-changing method here is a *conditional* write. Callers learn whether their write won by the returned
/// value, never by reading first. This is what lets concurrent webhook deliveries, browser returns and admin retries
/// race on the same order without double-charging side effects.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new order in `pending` status. This call is idempotent: if an order with the same `order_id` exists,
    /// it is returned along with `false`.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), StoreError>;

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError>;

    /// Finds the most recent order whose provider reference matches `transaction_id`.
    async fn fetch_order_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Order>, StoreError>;

    /// Attaches the provider reference returned at initiation. Only `pending` orders are touched; `None` is returned
    /// otherwise.
    async fn set_transaction_id(&self, order_id: &OrderId, transaction_id: &str) -> Result<Option<Order>, StoreError>;

    /// Transitions the order from `pending` to `completed`, stamping `paid_at` (if not already set) and overwriting the
    /// transaction id when one is given.
    ///
    /// Returns `None` if the order was not `pending`, i.e. somebody else already decided its fate.
    async fn mark_order_completed(
        &self,
        order_id: &OrderId,
        transaction_id: Option<&str>,
    ) -> Result<Option<Order>, StoreError>;

    /// Transitions the order from `pending` to `failed`. Returns `None` if the order was not `pending`.
    async fn mark_order_failed(
        &self,
        order_id: &OrderId,
        reason: &str,
        transaction_id: Option<&str>,
    ) -> Result<Option<Order>, StoreError>;

    /// Records the result of an entitlement grant attempt. `error == None` means the entitlement exists.
    /// A delivered flag is never cleared by a later failure.
    async fn record_entitlement_outcome(&self, order_id: &OrderId, error: Option<&str>) -> Result<(), StoreError>;

    /// Claims the right to send the confirmation email for this order.
    ///
    /// Succeeds only if the email has not been sent and no other claim younger than `lease` is outstanding.
    async fn claim_email_lease(&self, order_id: &OrderId, lease: Duration) -> Result<bool, StoreError>;

    /// Records the result of a confirmation email attempt and releases the lease. `error == None` means sent.
    async fn record_email_outcome(&self, order_id: &OrderId, error: Option<&str>) -> Result<(), StoreError>;

    /// Stamps `last_retry_at` on the order, returning the updated record.
    async fn stamp_retry(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError>;
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("No customer is registered with email {0}")]
    CustomerNotFound(String),
    #[error("The entitlement {0} does not exist")]
    EntitlementNotFound(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}
