//! Registration event channel for hostbridge.
//!
//! A typed publish/subscribe bus scoped to one bridge context. Publishers
//! announce that a domain object became available; converters subscribe to
//! keep their mapping tables current after bulk registration closed.
//!
//! Delivery semantics:
//! - Ordered: subscribers of one event type are called in subscription order.
//! - FIFO per publisher: a publish issued while a delivery is in progress is
//!   queued and delivered once the current delivery finishes.
//! - Failure isolation: a handler that returns `Err` or panics is logged and
//!   the remaining subscribers still receive the event.

mod bus;
mod error;

pub use bus::{DeliveryReport, EventBus, Handler, HandlerFailure, PublishOutcome, Subscription};
pub use error::{EventError, EventResult};
