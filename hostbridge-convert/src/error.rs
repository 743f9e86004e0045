//! Error types for converters and the converter registry.

use hostbridge_events::EventError;
use hostbridge_types::{MetaVariant, ObjectId, PhaseViolation};
use thiserror::Error;

/// Result type for conversion and registration operations.
pub type ConvertResult<T> = Result<T, ConvertError>;

#[derive(Debug, Error)]
pub enum ConvertError {
    /// The native key is already bound to a different abstract object.
    #[error(
        "{kind} native '{native}' (variant {variant}) is already mapped to '{existing}', refusing to map it to '{incoming}'"
    )]
    DuplicateMapping {
        kind: &'static str,
        native: String,
        variant: MetaVariant,
        existing: ObjectId,
        incoming: ObjectId,
    },

    #[error("a converter for {kind} is already registered")]
    DuplicateConverter { kind: String },

    #[error("{kind} converter is already bound to an event bus")]
    AlreadyBound { kind: &'static str },

    #[error("{kind} '{id}' is already registered")]
    AlreadyRegistered { kind: &'static str, id: ObjectId },

    /// The abstract object is already mapped to another native key.
    #[error(
        "{kind} '{id}' is already mapped to native '{bound}', refusing to rebind it to '{incoming}'"
    )]
    IdentityTaken {
        kind: &'static str,
        id: ObjectId,
        bound: String,
        incoming: String,
    },

    #[error("{kind} '{id}' is already being registered")]
    RegistrationInProgress { kind: &'static str, id: ObjectId },

    #[error("no converter registered for {abstract_type} <-> {native_type}")]
    NoConverter {
        abstract_type: &'static str,
        native_type: &'static str,
    },

    #[error("{kind} '{id}' has no native counterpart")]
    UnmappedAbstractObject { kind: &'static str, id: ObjectId },

    #[error("unsupported {kind} native object '{native}': {reason}")]
    UnsupportedNativeObject {
        kind: &'static str,
        native: String,
        reason: String,
    },

    #[error(transparent)]
    PhaseViolation(#[from] PhaseViolation),

    /// A kind adapter hook failed for a reason other than an unsupported object.
    #[error("{kind} adapter failed on '{subject}'")]
    Adapter {
        kind: &'static str,
        subject: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("event channel error: {0}")]
    Events(#[from] EventError),
}

/// Failure reported by a [`crate::KindAdapter`] hook.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The adapter cannot introspect this object.
    #[error("{0}")]
    Unsupported(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AdapterError {
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::Unsupported(reason.into())
    }
}
