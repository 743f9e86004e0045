//! Lifecycle orchestrator.
//!
//! Drives the bridge through its phases, in order:
//!
//! 1. `Preparation`: subsystems are declared; [`Orchestrator::prepare`]
//!    computes the load order and the global stage order.
//! 2. `ConverterRegistration`: queued converters are registered and bound.
//! 3. `BulkImport`: every converter maps the host's registry.
//! 4. `BulkExport`: every converter creates natives for declared objects.
//! 5. `Runtime`: stages run one by one, with a barrier between stages.
//!    Converters take part in each stage before the subsystems.
//!
//! Any failure is fatal. The orchestrator is poisoned and every later call
//! returns [`LifecycleError::Aborted`].

use crate::config::{BridgeConfig, StageExecution};
use crate::context::BridgeContext;
use crate::error::{LifecycleError, LifecycleResult};
use crate::graph::DependencyGraph;
use crate::subsystem::{StageHandler, Subsystem};
use hostbridge_convert::{
    BindContext, BulkReport, ConvertResult, ConverterLifecycle, ConverterRegistry,
    NativeConverter,
};
use hostbridge_types::{KindPair, LifecyclePhase, PhaseClock};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info};

type RegisterFn = Box<dyn FnOnce(&ConverterRegistry) -> ConvertResult<()> + Send>;

struct PendingConverter {
    kind: KindPair,
    register: RegisterFn,
}

/// Orderings computed during preparation. Indices point into the
/// orchestrator's subsystem list.
struct Plan {
    load_order: Vec<usize>,
    waves: Vec<Vec<usize>>,
    stage_order: Vec<String>,
}

/// What a completed startup did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupReport {
    /// Subsystem names in load order.
    pub load_order: Vec<String>,
    /// Stage names in execution order.
    pub stage_order: Vec<String>,
    /// Converter kind labels in registration order.
    pub converters: Vec<String>,
    pub imports: Vec<BulkReport>,
    pub exports: Vec<BulkReport>,
    /// Stage handlers that ran.
    pub stage_runs: usize,
}

pub struct Orchestrator {
    clock: PhaseClock,
    context: Arc<BridgeContext>,
    subsystems: Vec<Subsystem>,
    pending: Vec<PendingConverter>,
    plan: Option<Plan>,
    report: StartupReport,
    poisoned: Option<LifecyclePhase>,
    running: bool,
}

impl Orchestrator {
    #[must_use]
    pub fn new(config: BridgeConfig) -> Self {
        let clock = PhaseClock::new();
        let context = Arc::new(BridgeContext::new(config, clock.view()));
        Self {
            clock,
            context,
            subsystems: Vec::new(),
            pending: Vec::new(),
            plan: None,
            report: StartupReport::default(),
            poisoned: None,
            running: false,
        }
    }

    pub fn context(&self) -> &Arc<BridgeContext> {
        &self.context
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.clock.current()
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Progress so far; complete once [`Self::enter_runtime`] succeeded.
    pub fn report(&self) -> &StartupReport {
        &self.report
    }

    // ── Declaration ──────────────────────────────────────────────

    pub fn declare_subsystem(&mut self, subsystem: Subsystem) -> LifecycleResult<()> {
        self.ensure_alive()?;
        self.clock
            .view()
            .require(LifecyclePhase::Preparation, "declare subsystem")?;
        if self.subsystems.iter().any(|s| s.name() == subsystem.name()) {
            return Err(LifecycleError::DuplicateSubsystem(subsystem.name().to_string()));
        }
        if let Some(stage) = subsystem.duplicate_stage() {
            return Err(LifecycleError::DuplicateStage {
                subsystem: subsystem.name().to_string(),
                stage: stage.to_string(),
            });
        }

        info!(subsystem = subsystem.name(), after = ?subsystem.dependencies(), "subsystem declared");
        self.subsystems.push(subsystem);
        Ok(())
    }

    /// Queues a converter for the converter-registration phase.
    pub fn add_converter<C>(&mut self, converter: Arc<C>) -> LifecycleResult<()>
    where
        C: NativeConverter + ConverterLifecycle + 'static,
        C::Abstract: 'static,
        C::Native: 'static,
    {
        self.ensure_alive()?;
        self.clock
            .view()
            .require(LifecyclePhase::Preparation, "add converter")?;

        let kind = NativeConverter::kind(converter.as_ref());
        debug!(kind = %kind, "converter queued");
        self.pending.push(PendingConverter {
            kind,
            register: Box::new(move |registry: &ConverterRegistry| registry.register(converter)),
        });
        Ok(())
    }

    // ── Phase steps ──────────────────────────────────────────────

    /// Runs every phase and returns the startup report.
    pub fn start(&mut self) -> LifecycleResult<StartupReport> {
        self.prepare()?;
        self.register_converters()?;
        self.bulk_import()?;
        self.bulk_export()?;
        self.enter_runtime()?;
        Ok(self.report.clone())
    }

    /// Orders subsystems and stages, then closes preparation.
    pub fn prepare(&mut self) -> LifecycleResult<()> {
        self.step(LifecyclePhase::Preparation, "prepare", |this| {
            let plan = this.build_plan()?;
            this.report.load_order = plan
                .load_order
                .iter()
                .map(|&i| this.subsystems[i].name().to_string())
                .collect();
            this.report.stage_order = plan.stage_order.clone();
            info!(
                load_order = ?this.report.load_order,
                stage_order = ?this.report.stage_order,
                "preparation complete"
            );
            this.plan = Some(plan);
            this.advance()
        })
    }

    /// Registers queued converters and binds them to the event bus.
    pub fn register_converters(&mut self) -> LifecycleResult<()> {
        self.step(
            LifecyclePhase::ConverterRegistration,
            "register converters",
            |this| {
                let registry = this.context.registry();
                for pending in std::mem::take(&mut this.pending) {
                    debug!(kind = %pending.kind, "registering converter");
                    (pending.register)(registry)?;
                }

                let bind = BindContext {
                    events: Arc::clone(this.context.events()),
                    phase: this.clock.view(),
                    options: this.context.config().converter_options(),
                };
                for lifecycle in registry.lifecycles() {
                    lifecycle.bind(&bind)?;
                }

                this.report.converters = registry
                    .kinds()
                    .iter()
                    .map(|kind| kind.label().to_string())
                    .collect();
                this.advance()
            },
        )
    }

    /// Maps every host object through its converter.
    pub fn bulk_import(&mut self) -> LifecycleResult<()> {
        self.step(LifecyclePhase::BulkImport, "bulk import", |this| {
            for lifecycle in this.context.registry().lifecycles() {
                let report = lifecycle.bulk_import()?;
                this.report.imports.push(report);
            }
            this.advance()
        })
    }

    /// Creates host objects for every declared domain object.
    pub fn bulk_export(&mut self) -> LifecycleResult<()> {
        self.step(LifecyclePhase::BulkExport, "bulk export", |this| {
            for lifecycle in this.context.registry().lifecycles() {
                let report = lifecycle.bulk_export()?;
                this.report.exports.push(report);
            }
            this.advance()
        })
    }

    /// Runs every stage of every converter and subsystem. Stage N starts
    /// only after all subsystems finished stage N-1.
    pub fn enter_runtime(&mut self) -> LifecycleResult<()> {
        self.ensure_alive()?;
        if self.running {
            return Err(LifecycleError::AlreadyRunning);
        }
        self.step(LifecyclePhase::Runtime, "enter runtime", |this| {
            this.running = true;
            let Some(plan) = this.plan.as_ref() else {
                return Ok(());
            };

            let converters = this.context.registry().lifecycles();
            let mut runs = 0;
            for stage in &plan.stage_order {
                info!(stage = %stage, "stage starting");
                for converter in &converters {
                    converter.run_stage(stage)?;
                }
                runs += match this.context.config().stage_execution {
                    StageExecution::Sequential => {
                        run_sequential(&this.subsystems, &plan.load_order, stage, &this.context)?
                    }
                    StageExecution::Waves => {
                        run_waves(&this.subsystems, &plan.waves, stage, &this.context)?
                    }
                };
            }

            this.report.stage_runs = runs;
            info!(stages = plan.stage_order.len(), runs, "runtime reached");
            Ok(())
        })
    }

    // ── Internals ────────────────────────────────────────────────

    fn ensure_alive(&self) -> LifecycleResult<()> {
        match self.poisoned {
            Some(phase) => Err(LifecycleError::Aborted { phase }),
            None => Ok(()),
        }
    }

    fn step<T>(
        &mut self,
        expected: LifecyclePhase,
        operation: &str,
        work: impl FnOnce(&mut Self) -> LifecycleResult<T>,
    ) -> LifecycleResult<T> {
        self.ensure_alive()?;
        self.clock.view().require(expected, operation)?;

        work(self).inspect_err(|err| {
            error!(phase = %expected, error = %err, "startup aborted");
            self.poisoned = Some(expected);
        })
    }

    fn advance(&mut self) -> LifecycleResult<()> {
        let from = self.clock.current();
        let to = self.clock.advance()?;
        info!(from = %from, to = %to, "phase advanced");
        Ok(())
    }

    fn build_plan(&self) -> LifecycleResult<Plan> {
        let mut graph = DependencyGraph::new();
        for subsystem in &self.subsystems {
            graph.add_node(subsystem.name());
        }
        for (index, subsystem) in self.subsystems.iter().enumerate() {
            for dependency in subsystem.dependencies() {
                let Some(before) = graph.node(dependency) else {
                    return Err(LifecycleError::UnknownDependency {
                        subsystem: subsystem.name().to_string(),
                        dependency: dependency.clone(),
                    });
                };
                graph.add_edge(before, index);
            }
        }

        let cycle = |cycle: crate::graph::Cycle| LifecycleError::DependencyCycle {
            scope: "subsystem",
            members: cycle.members,
        };
        let load_order = graph.order().map_err(cycle)?;
        let waves = graph.waves().map_err(cycle)?;

        // Each subsystem's declared stage sequence constrains the global one.
        let mut stages = DependencyGraph::new();
        for &index in &load_order {
            let mut previous = None;
            for name in self.subsystems[index].stage_names() {
                let current = stages.add_node(name);
                if let Some(previous) = previous {
                    stages.add_edge(previous, current);
                }
                previous = Some(current);
            }
        }
        let stage_order = stages
            .order()
            .map_err(|cycle| LifecycleError::DependencyCycle {
                scope: "stage",
                members: cycle.members,
            })?
            .into_iter()
            .map(|id| stages.name(id).to_string())
            .collect();

        Ok(Plan {
            load_order,
            waves,
            stage_order,
        })
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("phase", &self.clock.current())
            .field("subsystems", &self.subsystems.len())
            .field("pending_converters", &self.pending.len())
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

fn run_sequential(
    subsystems: &[Subsystem],
    load_order: &[usize],
    stage: &str,
    context: &BridgeContext,
) -> LifecycleResult<usize> {
    let mut runs = 0;
    for &index in load_order {
        let subsystem = &subsystems[index];
        if let Some(handler) = subsystem.handler(stage) {
            invoke(subsystem, stage, handler, context)?;
            runs += 1;
        }
    }
    Ok(runs)
}

/// Runs each wave's participants concurrently. A wave finishes completely
/// before the next starts; the first failure in load order is returned.
fn run_waves(
    subsystems: &[Subsystem],
    waves: &[Vec<usize>],
    stage: &str,
    context: &BridgeContext,
) -> LifecycleResult<usize> {
    let mut runs = 0;
    for wave in waves {
        let participants: Vec<(&Subsystem, &StageHandler)> = wave
            .iter()
            .filter_map(|&index| {
                let subsystem = &subsystems[index];
                subsystem.handler(stage).map(|handler| (subsystem, handler))
            })
            .collect();

        let results: Vec<LifecycleResult<()>> = thread::scope(|scope| {
            let handles: Vec<_> = participants
                .iter()
                .map(|&(subsystem, handler)| {
                    scope.spawn(move || invoke(subsystem, stage, handler, context))
                })
                .collect();

            handles
                .into_iter()
                .zip(&participants)
                .map(|(handle, (subsystem, _))| {
                    handle.join().unwrap_or_else(|payload| {
                        Err(stage_failure(subsystem, stage, panic_error(payload.as_ref())))
                    })
                })
                .collect()
        });

        for result in results {
            result?;
            runs += 1;
        }
    }
    Ok(runs)
}

fn invoke(
    subsystem: &Subsystem,
    stage: &str,
    handler: &StageHandler,
    context: &BridgeContext,
) -> LifecycleResult<()> {
    debug!(subsystem = subsystem.name(), stage, "running stage");
    match panic::catch_unwind(AssertUnwindSafe(|| handler(context))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(stage_failure(subsystem, stage, source)),
        Err(payload) => Err(stage_failure(subsystem, stage, panic_error(payload.as_ref()))),
    }
}

fn stage_failure(subsystem: &Subsystem, stage: &str, source: anyhow::Error) -> LifecycleError {
    LifecycleError::StageFailure {
        subsystem: subsystem.name().to_string(),
        stage: stage.to_string(),
        source,
    }
}

fn panic_error(payload: &(dyn Any + Send)) -> anyhow::Error {
    if let Some(message) = payload.downcast_ref::<&str>() {
        anyhow::anyhow!("stage panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        anyhow::anyhow!("stage panicked: {message}")
    } else {
        anyhow::anyhow!("stage panicked")
    }
}
