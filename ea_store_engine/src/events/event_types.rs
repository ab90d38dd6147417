use serde::{Deserialize, Serialize};

use crate::{db_types::Order, verdict::PaymentVerdict};

/// Emitted exactly once per order, by whichever caller won the `pending -> completed` transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCompletedEvent {
    pub order: Order,
}

impl OrderCompletedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFailedEvent {
    pub order: Order,
    pub reason: String,
}

impl OrderFailedEvent {
    pub fn new<S: Into<String>>(order: Order, reason: S) -> Self {
        Self { order, reason: reason.into() }
    }
}

/// A verdict that contradicts the order's terminal state: a failure for a paid order, or a success for an order that
/// has already failed. The order is left untouched, but somebody should look at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalousVerdictEvent {
    pub order: Order,
    pub verdict: PaymentVerdict,
    pub note: String,
}

impl AnomalousVerdictEvent {
    pub fn new<S: Into<String>>(order: Order, verdict: PaymentVerdict, note: S) -> Self {
        Self { order, verdict, note: note.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderCompleted(OrderCompletedEvent),
    OrderFailed(OrderFailedEvent),
    AnomalousVerdict(AnomalousVerdictEvent),
}
