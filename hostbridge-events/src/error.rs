//! Error types for the event channel.

use thiserror::Error;

/// Result type for event channel operations.
pub type EventResult<T> = Result<T, EventError>;

/// Errors raised by subscription bookkeeping. Handler failures are never
/// surfaced here; they are reported in [`crate::DeliveryReport`].
#[derive(Debug, Error)]
pub enum EventError {
    /// A subscriber with this name already listens to this event type.
    #[error("subscriber '{name}' is already bound to {event}")]
    DuplicateSubscriber { event: &'static str, name: String },

    /// The subscription was already removed or never existed.
    #[error("subscription {id} for {event} does not exist")]
    UnknownSubscription { event: &'static str, id: u64 },
}
