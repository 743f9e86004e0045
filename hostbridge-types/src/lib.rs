//! Core type definitions for hostbridge.
//!
//! This crate defines the fundamental, kind-agnostic types shared by every
//! part of the bridge:
//! - Object identifiers (`namespace:path`) and sub-variant discriminators
//! - Opaque persisted payloads threaded between the two object models
//! - The process-scoped lifecycle phase and its single-writer clock
//! - Kind pairs naming the (abstract, native) types a converter bridges
//!
//! Kind-specific types (blocks, items, entities) belong to the adapters that
//! plug into the converter layer, not here.

mod ids;
mod kind;
mod payload;
mod phase;

pub use ids::{EventId, MetaVariant, ObjectId, VariantId};
pub use kind::KindPair;
pub use payload::Payload;
pub use phase::{LifecyclePhase, PhaseClock, PhaseView, PhaseViolation};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid object id '{id}': {reason}")]
    InvalidObjectId { id: String, reason: &'static str },

    #[error("invalid variant id '{id}': {reason}")]
    InvalidVariantId { id: String, reason: &'static str },

    #[error("lifecycle already reached {0}, no later phase exists")]
    PhaseExhausted(LifecyclePhase),
}
