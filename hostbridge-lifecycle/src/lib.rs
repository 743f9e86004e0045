//! Lifecycle orchestration for hostbridge.
//!
//! An [`Orchestrator`] owns the phase clock and a fresh [`BridgeContext`].
//! Subsystems declare themselves with named stages and dependencies;
//! converters are queued; [`Orchestrator::start`] then walks every phase:
//! preparation, converter registration, bulk import, bulk export and
//! runtime.
//!
//! ```ignore
//! let mut orchestrator = Orchestrator::new(BridgeConfig::load_from("hostbridge.toml"));
//! orchestrator.add_converter(Arc::new(Converter::new(BlockAdapter::new(host, domain))))?;
//! orchestrator.declare_subsystem(Subsystem::new("recipes").after("blocks").stage("init", init))?;
//! let report = orchestrator.start()?;
//! ```

mod config;
mod context;
mod error;
pub mod graph;
mod orchestrator;
mod subsystem;

pub use config::{BridgeConfig, StageExecution};
pub use context::BridgeContext;
pub use error::{LifecycleError, LifecycleResult};
pub use orchestrator::{Orchestrator, StartupReport};
pub use subsystem::{StageHandler, Subsystem};
