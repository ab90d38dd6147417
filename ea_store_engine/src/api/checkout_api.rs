use std::fmt::Debug;

use log::*;

use crate::{
    api::errors::FulfillmentError,
    db_types::{NewOrder, Order, OrderId},
    events::{EventProducers, OrderFailedEvent},
    traits::OrderManagement,
};

/// `CheckoutApi` creates orders and records the result of handing them to a payment provider.
///
/// It never completes an order. That only happens through [`crate::FulfillmentApi`].
pub struct CheckoutApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for CheckoutApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi")
    }
}

impl<B> CheckoutApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> CheckoutApi<B>
where B: OrderManagement
{
    /// Stores a brand-new `pending` order. Re-using an existing order id is an error.
    pub async fn create_order(&self, order: NewOrder) -> Result<Order, FulfillmentError> {
        let order_id = order.order_id.clone();
        let (order, inserted) = self.db.insert_order(order).await?;
        if !inserted {
            warn!("🛒️ Order [{order_id}] already exists");
            return Err(FulfillmentError::OrderAlreadyExists(order_id));
        }
        info!("🛒️ Order [{}] created: {} for {} {}", order.order_id, order.artifact_name, order.amount, order.currency);
        Ok(order)
    }

    /// Stores the provider's reference for the payment. Orders that are no longer pending are returned unchanged.
    pub async fn attach_transaction_id(
        &self,
        order_id: &OrderId,
        transaction_id: &str,
    ) -> Result<Order, FulfillmentError> {
        match self.db.set_transaction_id(order_id, transaction_id).await? {
            Some(order) => {
                debug!("🛒️ Order [{order_id}] linked to provider reference {transaction_id}");
                Ok(order)
            },
            None => {
                let order =
                    self.fetch_order(order_id).await?.ok_or_else(|| FulfillmentError::OrderNotFound(order_id.clone()))?;
                warn!("🛒️ Order [{order_id}] is {}. Provider reference {transaction_id} was not stored.", order.status);
                Ok(order)
            },
        }
    }

    /// Marks the order as failed because the provider refused to start the payment.
    pub async fn record_initiation_failure(&self, order_id: &OrderId, reason: &str) -> Result<Order, FulfillmentError> {
        let reason = format!("Payment initiation failed: {reason}");
        match self.db.mark_order_failed(order_id, &reason, None).await? {
            Some(order) => {
                warn!("🛒️ Order [{order_id}] failed. {reason}");
                for emitter in &self.producers.order_failed_producer {
                    emitter.publish_event(OrderFailedEvent::new(order.clone(), reason.as_str())).await;
                }
                Ok(order)
            },
            None => self.fetch_order(order_id).await?.ok_or_else(|| FulfillmentError::OrderNotFound(order_id.clone())),
        }
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, FulfillmentError> {
        self.db.fetch_order_by_order_id(order_id).await.map_err(FulfillmentError::unavailable)
    }

    pub async fn fetch_order_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Order>, FulfillmentError> {
        self.db.fetch_order_by_transaction_id(transaction_id).await.map_err(FulfillmentError::unavailable)
    }
}
