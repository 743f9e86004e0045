//! Error types for the lifecycle orchestrator.

use hostbridge_convert::ConvertError;
use hostbridge_types::{LifecyclePhase, PhaseViolation};
use thiserror::Error;

pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// `members` lists the cycle in dependency order.
    #[error("dependency cycle between {scope}s: {}", render_cycle(.members))]
    DependencyCycle {
        scope: &'static str,
        members: Vec<String>,
    },

    #[error("subsystem '{subsystem}' depends on unknown subsystem '{dependency}'")]
    UnknownDependency {
        subsystem: String,
        dependency: String,
    },

    #[error("subsystem '{0}' is already declared")]
    DuplicateSubsystem(String),

    #[error("subsystem '{subsystem}' declares stage '{stage}' more than once")]
    DuplicateStage { subsystem: String, stage: String },

    #[error("stage '{stage}' of subsystem '{subsystem}' failed")]
    StageFailure {
        subsystem: String,
        stage: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    PhaseViolation(#[from] PhaseViolation),

    #[error("phase clock error: {0}")]
    Phase(#[from] hostbridge_types::Error),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error("invalid bridge configuration: {0}")]
    Config(String),

    #[error("startup aborted after a failure during {phase}")]
    Aborted { phase: LifecyclePhase },

    #[error("runtime stages already ran")]
    AlreadyRunning,
}

fn render_cycle(members: &[String]) -> String {
    match members.first() {
        Some(first) => format!("{} -> {first}", members.join(" -> ")),
        None => String::new(),
    }
}
