//! Bridge configuration.
//!
//! Loaded from a TOML file such as:
//!
//! ```toml
//! default_namespace = "mymod"
//! stage_execution = "waves"
//! variant_fallback = true
//! log_registrations = false
//! ```
//!
//! Every field is optional.

use crate::error::{LifecycleError, LifecycleResult};
use hostbridge_convert::ConverterOptions;
use hostbridge_types::ObjectId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// How subsystems run within one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageExecution {
    /// One subsystem at a time, in load order.
    #[default]
    Sequential,
    /// Subsystems without mutual dependencies run concurrently on scoped
    /// threads, one dependency wave at a time.
    Waves,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Namespace for unqualified ids of natively created objects.
    pub default_namespace: String,
    pub stage_execution: StageExecution,
    /// Map `namespace:path:variant` lookups lazily when bulk import missed them.
    pub variant_fallback: bool,
    /// Log each new mapping at `info` instead of `debug`.
    pub log_registrations: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            default_namespace: "bridge".to_string(),
            stage_execution: StageExecution::Sequential,
            variant_fallback: true,
            log_registrations: false,
        }
    }
}

impl BridgeConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> LifecycleResult<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| LifecycleError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration at `path`, falling back to defaults when the
    /// file is missing, unreadable or invalid.
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("No bridge config found at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(config) => {
                    info!("Loaded bridge config from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!(
                        "Failed to parse bridge config {:?}: {}. Falling back to defaults.",
                        path, e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read bridge config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> LifecycleResult<()> {
        ObjectId::namespaced(&self.default_namespace, "probe").map_err(|_| {
            LifecycleError::Config(format!(
                "default_namespace '{}' is not a valid namespace",
                self.default_namespace
            ))
        })?;
        Ok(())
    }

    /// Options handed to every converter when it is bound.
    #[must_use]
    pub fn converter_options(&self) -> ConverterOptions {
        ConverterOptions {
            default_namespace: self.default_namespace.clone(),
            variant_fallback: self.variant_fallback,
            log_registrations: self.log_registrations,
        }
    }
}
