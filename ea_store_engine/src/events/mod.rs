//! Stateless pub-sub hooks for fulfillment events.
//!
//! Producers live inside the engine APIs. Handlers are plain async closures registered through [`EventHooks`] and are
//! driven by [`EventHandlers::start_handlers`]. Handlers only ever see the event, never the engine's state.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
