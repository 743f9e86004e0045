use crate::context::BridgeContext;
use std::fmt;
use std::sync::Arc;

/// Work a subsystem performs during one named stage.
pub type StageHandler = Arc<dyn Fn(&BridgeContext) -> anyhow::Result<()> + Send + Sync>;

struct Stage {
    name: String,
    handler: StageHandler,
}

/// A dependent subsystem: a name, the subsystems it must follow, and its
/// stages in the order it expects them to run.
///
/// ```ignore
/// let recipes = Subsystem::new("recipes")
///     .after("blocks")
///     .stage("init", |ctx| Ok(()))
///     .stage("post_init", |ctx| Ok(()));
/// ```
pub struct Subsystem {
    name: String,
    after: Vec<String>,
    stages: Vec<Stage>,
}

impl Subsystem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            after: Vec::new(),
            stages: Vec::new(),
        }
    }

    /// Runs this subsystem's stages after those of `dependency`.
    pub fn after(mut self, dependency: impl Into<String>) -> Self {
        self.after.push(dependency.into());
        self
    }

    pub fn stage<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&BridgeContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.stages.push(Stage {
            name: name.into(),
            handler: Arc::new(handler),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[String] {
        &self.after
    }

    /// Declared stage names, in declaration order.
    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|stage| stage.name.as_str())
    }

    /// The first stage name declared twice, if any.
    pub(crate) fn duplicate_stage(&self) -> Option<&str> {
        self.stages
            .iter()
            .enumerate()
            .find(|(index, stage)| {
                self.stages[..*index]
                    .iter()
                    .any(|earlier| earlier.name == stage.name)
            })
            .map(|(_, stage)| stage.name.as_str())
    }

    pub(crate) fn handler(&self, stage: &str) -> Option<&StageHandler> {
        self.stages
            .iter()
            .find(|candidate| candidate.name == stage)
            .map(|candidate| &candidate.handler)
    }
}

impl fmt::Debug for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subsystem")
            .field("name", &self.name)
            .field("after", &self.after)
            .field("stages", &self.stage_names().collect::<Vec<_>>())
            .finish()
    }
}
