//! Process-scoped lifecycle phase.
//!
//! The phase only ever moves forward. Exactly one [`PhaseClock`] exists per
//! bridge context and it belongs to the lifecycle orchestrator; every other
//! component observes the phase through a cloned [`PhaseView`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// The global startup stage of the bridge, totally ordered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LifecyclePhase {
    /// Subsystems are declared and the load order is computed.
    Preparation = 0,
    /// Converters register themselves and their event subscriptions.
    ConverterRegistration = 1,
    /// Converters map every object the host engine already has.
    BulkImport = 2,
    /// Converters register every object the abstraction layer declares.
    BulkExport = 3,
    /// The event channel is the only path for new mappings.
    Runtime = 4,
}

impl LifecyclePhase {
    /// All phases in order.
    pub const ALL: [Self; 5] = [
        Self::Preparation,
        Self::ConverterRegistration,
        Self::BulkImport,
        Self::BulkExport,
        Self::Runtime,
    ];

    /// Returns the phase that follows this one, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Preparation => Some(Self::ConverterRegistration),
            Self::ConverterRegistration => Some(Self::BulkImport),
            Self::BulkImport => Some(Self::BulkExport),
            Self::BulkExport => Some(Self::Runtime),
            Self::Runtime => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Preparation => "preparation",
            Self::ConverterRegistration => "converter_registration",
            Self::BulkImport => "bulk_import",
            Self::BulkExport => "bulk_export",
            Self::Runtime => "runtime",
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Preparation,
            1 => Self::ConverterRegistration,
            2 => Self::BulkImport,
            3 => Self::BulkExport,
            _ => Self::Runtime,
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation was attempted in the wrong lifecycle phase.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{operation}` is only allowed during {expected}, but the bridge is in {actual}")]
pub struct PhaseViolation {
    pub operation: String,
    pub expected: LifecyclePhase,
    pub actual: LifecyclePhase,
}

/// The single writer of the lifecycle phase.
///
/// Deliberately not `Clone`: whoever owns the clock owns phase transitions.
#[derive(Debug)]
pub struct PhaseClock {
    current: Arc<AtomicU8>,
}

impl PhaseClock {
    /// Creates a clock positioned at [`LifecyclePhase::Preparation`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: Arc::new(AtomicU8::new(LifecyclePhase::Preparation as u8)),
        }
    }

    /// Returns the current phase.
    #[must_use]
    pub fn current(&self) -> LifecyclePhase {
        LifecyclePhase::from_u8(self.current.load(Ordering::Acquire))
    }

    /// Returns a read-only view sharing this clock's state.
    #[must_use]
    pub fn view(&self) -> PhaseView {
        PhaseView {
            current: Arc::clone(&self.current),
        }
    }

    /// Moves to the next phase and returns it.
    pub fn advance(&mut self) -> Result<LifecyclePhase> {
        let current = self.current();
        let next = current.next().ok_or(Error::PhaseExhausted(current))?;
        self.current.store(next as u8, Ordering::Release);
        Ok(next)
    }
}

impl Default for PhaseClock {
    fn default() -> Self {
        Self::new()
    }
}

/// A read-only handle on the lifecycle phase.
#[derive(Debug, Clone)]
pub struct PhaseView {
    current: Arc<AtomicU8>,
}

impl PhaseView {
    /// Returns the current phase.
    #[must_use]
    pub fn current(&self) -> LifecyclePhase {
        LifecyclePhase::from_u8(self.current.load(Ordering::Acquire))
    }

    /// Whether the bridge is exactly in `phase`.
    #[must_use]
    pub fn is(&self, phase: LifecyclePhase) -> bool {
        self.current() == phase
    }

    /// Whether the bridge has reached `phase` or any later one.
    #[must_use]
    pub fn at_least(&self, phase: LifecyclePhase) -> bool {
        self.current() >= phase
    }

    /// Fails unless the bridge is exactly in `expected`.
    pub fn require(
        &self,
        expected: LifecyclePhase,
        operation: &str,
    ) -> std::result::Result<(), PhaseViolation> {
        let actual = self.current();
        if actual == expected {
            Ok(())
        } else {
            Err(PhaseViolation {
                operation: operation.to_string(),
                expected,
                actual,
            })
        }
    }
}
