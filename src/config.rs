//! Configuration System
//!
//! Layered engine configuration: built-in defaults, then the global config file,
//! then workspace files, then `CTXSYNC__SECTION__KEY` environment variables. Every
//! field has a default, so any layer may be partial.

use crate::collaborator::BridgeConfig;
use crate::context::ComponentStatus;
use crate::error::EngineError;
use crate::health::HealthConfig;
use crate::logging::LoggingConfig;
use crate::recovery::RecoveryConfig;
use crate::scheduler::SchedulerConfig;
use crate::session::SessionConfig;
use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

mod sources;

pub use sources::global_file::global_config_path;
pub use sources::workspace_file::ENV_NAME_VAR;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub health: HealthConfig,
    pub recovery: RecoveryConfig,
    pub sessions: SessionConfig,
    pub bridge: BridgeConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,

    /// Components declared at startup with their initial status
    pub components: BTreeMap<String, ComponentStatus>,
}

/// Storage configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// sled directory for the snapshot archive; unset keeps snapshots in memory only
    pub snapshot_path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(path) = &self.snapshot_path {
            if path.as_os_str().is_empty() {
                return Err("Snapshot path cannot be empty".to_string());
            }
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub section: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.section, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl EngineConfig {
    /// Validate every section, collecting all violations.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let checks: [(&'static str, Result<(), String>); 6] = [
            ("scheduler", self.scheduler.validate()),
            ("health", self.health.validate()),
            ("recovery", self.recovery.validate()),
            ("sessions", self.sessions.validate()),
            ("bridge", self.bridge.validate()),
            ("storage", self.storage.validate()),
        ];

        let mut errors: Vec<ValidationError> = checks
            .into_iter()
            .filter_map(|(section, result)| {
                result.err().map(|message| ValidationError { section, message })
            })
            .collect();

        if self.logging.level.trim().is_empty() {
            errors.push(ValidationError {
                section: "logging",
                message: "Log level cannot be empty".to_string(),
            });
        }
        if let Some(name) = self.components.keys().find(|name| name.trim().is_empty()) {
            errors.push(ValidationError {
                section: "components",
                message: format!("Component name cannot be blank: {:?}", name),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold all violations into one error.
    pub fn ensure_valid(&self) -> Result<(), EngineError> {
        self.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            EngineError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                messages.join("\n")
            ))
        })
    }

    pub fn to_toml(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self)
            .map_err(|e| EngineError::ConfigError(format!("Failed to render config: {}", e)))
    }
}

/// Loads [`EngineConfig`] from layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load using the platform global config path.
    pub fn load(workspace_root: &Path) -> Result<EngineConfig, ConfigError> {
        Self::load_with_global(workspace_root, global_config_path().as_deref())
    }

    /// Load with an explicit global config path (`None` skips that layer).
    pub fn load_with_global(
        workspace_root: &Path,
        global_path: Option<&Path>,
    ) -> Result<EngineConfig, ConfigError> {
        let builder = Config::builder();
        let builder = sources::global_file::add_to_builder(builder, global_path);
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root);
        let builder = sources::add_env_overrides(builder);
        builder.build()?.try_deserialize()
    }

    /// Load a single file on top of the defaults.
    pub fn load_from_file(path: &Path) -> Result<EngineConfig, ConfigError> {
        Config::builder()
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize()
    }
}
