//! CLI route: loads configuration once and dispatches each command.

use crate::cli::output::{format_demo_report, format_health_report};
use crate::cli::parse::Commands;
use crate::config::{ConfigLoader, EngineConfig};
use crate::engine::Engine;
use crate::error::EngineError;
use crate::session::SessionKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// Resolved configuration plus the workspace it came from.
pub struct RunContext {
    workspace: PathBuf,
    config: EngineConfig,
}

impl RunContext {
    pub fn new(workspace: PathBuf, config_path: Option<PathBuf>) -> Result<Self, EngineError> {
        let config = load_config(&workspace, config_path.as_deref())?;
        config.ensure_valid()?;
        Ok(Self { workspace, config })
    }

    pub fn with_config(workspace: PathBuf, config: EngineConfig) -> Self {
        Self { workspace, config }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn execute(&self, command: &Commands) -> Result<String, EngineError> {
        match command {
            Commands::Config => self.config.to_toml(),
            Commands::Health { input, format } => {
                let engine = Engine::builder(self.config.clone()).build()?;
                let result = engine.check_health(input.as_deref());
                match format.as_str() {
                    "json" => serde_json::to_string_pretty(&result).map_err(|e| {
                        EngineError::ProcessingError(format!("Failed to render health: {}", e))
                    }),
                    "text" => Ok(format_health_report(&result)),
                    other => Err(EngineError::ConfigError(format!(
                        "Invalid format: {} (must be 'text' or 'json')",
                        other
                    ))),
                }
            }
            Commands::Demo { input, kind } => {
                let kind: SessionKind = kind.parse()?;
                runtime()?.block_on(self.run_demo(input, kind))
            }
        }
    }

    async fn run_demo(&self, input: &str, kind: SessionKind) -> Result<String, EngineError> {
        let engine = Engine::builder(self.config.clone()).build()?;
        engine.start()?;
        info!(input = %input, kind = %kind, "Running demo");

        let outcome = async {
            let response = engine
                .submit(input, None, Some(Duration::from_secs(10)))
                .await?;
            engine.store().update("development_phase", "demo");
            let session = engine.start_session(
                "demo",
                Some("CLI demo session".to_string()),
                kind,
            );
            let result = engine
                .complete_session(
                    session.id,
                    vec![format!("Processed '{}'", input)],
                    true,
                )
                .await?;
            Ok::<_, EngineError>((response, result))
        }
        .await;

        engine.shutdown().await;
        let (response, result) = outcome?;
        debug!(session_id = %result.session.id, "Demo finished");
        Ok(format_demo_report(
            &response,
            &result,
            engine.store().coherence(),
        ))
    }
}

fn load_config(workspace: &Path, config_path: Option<&Path>) -> Result<EngineConfig, EngineError> {
    let config = match config_path {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load(workspace)?,
    };
    Ok(config)
}

fn runtime() -> Result<Runtime, EngineError> {
    Runtime::new()
        .map_err(|e| EngineError::ProcessingError(format!("Failed to create tokio runtime: {}", e)))
}
