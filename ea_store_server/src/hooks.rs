use ea_store_engine::events::{
    AnomalousVerdictEvent,
    EventHandlers,
    EventHooks,
    OrderCompletedEvent,
    OrderFailedEvent,
};
use log::*;

pub const AUDIT_EVENT_BUFFER_SIZE: usize = 25;
pub const AUDIT_LOG_TARGET: &str = "eas::audit";

/// Writes every fulfillment event to the `eas::audit` log target.
///
/// Anomalous verdicts are logged at error level: they mean money and order state disagree and an admin has to look
/// at the order.
pub fn create_audit_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_order_completed(|ev| {
        let OrderCompletedEvent { order } = ev;
        Box::pin(async move {
            info!(
                target: AUDIT_LOG_TARGET,
                "Order [{}] completed. {} bought {} for {} {} (tx {})",
                order.order_id,
                order.customer_email,
                order.artifact_name,
                order.currency,
                order.amount,
                order.transaction_id.as_deref().unwrap_or("none")
            );
        })
    });
    hooks.on_order_failed(|ev| {
        let OrderFailedEvent { order, reason } = ev;
        Box::pin(async move {
            info!(
                target: AUDIT_LOG_TARGET,
                "Order [{}] failed via {}. {reason}", order.order_id, order.payment_method
            );
        })
    });
    hooks.on_anomalous_verdict(|ev| {
        let AnomalousVerdictEvent { order, verdict, note } = ev;
        Box::pin(async move {
            error!(
                target: AUDIT_LOG_TARGET,
                "Anomalous {} verdict for order [{}] ({}). {note}", verdict.provider, order.order_id, order.status
            );
        })
    });
    EventHandlers::new(AUDIT_EVENT_BUFFER_SIZE, hooks)
}
