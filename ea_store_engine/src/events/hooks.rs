use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{AnomalousVerdictEvent, EventHandler, EventProducer, Handler, OrderCompletedEvent, OrderFailedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_completed_producer: Vec<EventProducer<OrderCompletedEvent>>,
    pub order_failed_producer: Vec<EventProducer<OrderFailedEvent>>,
    pub anomalous_verdict_producer: Vec<EventProducer<AnomalousVerdictEvent>>,
}

pub struct EventHandlers {
    pub on_order_completed: Option<EventHandler<OrderCompletedEvent>>,
    pub on_order_failed: Option<EventHandler<OrderFailedEvent>>,
    pub on_anomalous_verdict: Option<EventHandler<AnomalousVerdictEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_completed = hooks.on_order_completed.map(|f| EventHandler::new(buffer_size, f));
        let on_order_failed = hooks.on_order_failed.map(|f| EventHandler::new(buffer_size, f));
        let on_anomalous_verdict = hooks.on_anomalous_verdict.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_completed, on_order_failed, on_anomalous_verdict }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_completed {
            result.order_completed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_failed {
            result.order_failed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_anomalous_verdict {
            result.anomalous_verdict_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_completed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_order_failed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_anomalous_verdict {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_completed: Option<Handler<OrderCompletedEvent>>,
    pub on_order_failed: Option<Handler<OrderFailedEvent>>,
    pub on_anomalous_verdict: Option<Handler<AnomalousVerdictEvent>>,
}

impl EventHooks {
    pub fn on_order_completed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCompletedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_completed = Some(Arc::new(f));
        self
    }

    pub fn on_order_failed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderFailedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_failed = Some(Arc::new(f));
        self
    }

    pub fn on_anomalous_verdict<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(AnomalousVerdictEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_anomalous_verdict = Some(Arc::new(f));
        self
    }
}
