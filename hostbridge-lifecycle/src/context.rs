use crate::config::BridgeConfig;
use hostbridge_convert::{ConvertResult, ConverterRegistry, NativeConverter};
use hostbridge_events::EventBus;
use hostbridge_types::{LifecyclePhase, PhaseView};
use std::sync::Arc;

/// Everything one bridge instance shares with its subsystems: the converter
/// registry, the registration event bus, a read-only view of the lifecycle
/// phase and the configuration.
///
/// Built by the [`crate::Orchestrator`]; each orchestrator owns a fresh one.
#[derive(Debug)]
pub struct BridgeContext {
    config: BridgeConfig,
    events: Arc<EventBus>,
    registry: ConverterRegistry,
    phase: PhaseView,
}

impl BridgeContext {
    pub(crate) fn new(config: BridgeConfig, phase: PhaseView) -> Self {
        Self {
            config,
            events: Arc::new(EventBus::new()),
            registry: ConverterRegistry::new(phase.clone()),
            phase,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase.current()
    }

    pub fn phase_view(&self) -> &PhaseView {
        &self.phase
    }

    /// Shorthand for [`ConverterRegistry::resolve`].
    pub fn converter<A: 'static, N: 'static>(
        &self,
    ) -> ConvertResult<Arc<dyn NativeConverter<Abstract = A, Native = N>>> {
        self.registry.resolve::<A, N>()
    }
}
