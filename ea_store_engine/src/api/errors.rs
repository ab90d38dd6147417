use thiserror::Error;

use crate::{
    db_types::{OrderId, OrderStatusType},
    traits::StoreError,
};

#[derive(Debug, Clone, Error)]
pub enum FulfillmentError {
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} already exists")]
    OrderAlreadyExists(OrderId),
    #[error("'{0}' is not in the catalog")]
    ArtifactNotFound(String),
    #[error("Order {0} is {1}, not completed")]
    OrderNotCompleted(OrderId, OrderStatusType),
    #[error("The order store is unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Could not send the notification: {0}")]
    NotificationFailed(String),
    #[error("The entitlement {0} does not exist")]
    EntitlementNotFound(String),
}

impl FulfillmentError {
    /// Maps a failed *read* to `StoreUnavailable`. Reads fail when the store itself is unreachable or unmigrated;
    /// failed writes stay `DatabaseError`.
    pub fn unavailable(e: StoreError) -> Self {
        match e {
            StoreError::DatabaseError(msg) => FulfillmentError::StoreUnavailable(msg),
            other => other.into(),
        }
    }
}

impl From<StoreError> for FulfillmentError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DatabaseError(msg) => FulfillmentError::DatabaseError(msg),
            StoreError::OrderNotFound(id) => FulfillmentError::OrderNotFound(id),
            StoreError::CustomerNotFound(email) => {
                FulfillmentError::DatabaseError(format!("No customer record for {email}"))
            },
            StoreError::EntitlementNotFound(id) => FulfillmentError::EntitlementNotFound(id),
        }
    }
}
