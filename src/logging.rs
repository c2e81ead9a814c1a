//! Logging System
//!
//! Structured logging on top of `tracing`. Level, format and destination come from
//! the `[logging]` config section and can be overridden through `CTXSYNC_LOG*`
//! environment variables.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(EngineError::ConfigError(format!(
                "Invalid log format: {} (must be 'json' or 'text')",
                other
            ))),
        }
    }
}

/// Log destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    Stderr,
    File,
}

impl std::str::FromStr for LogOutput {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdout" => Ok(LogOutput::Stdout),
            "stderr" => Ok(LogOutput::Stderr),
            "file" => Ok(LogOutput::File),
            other => Err(EngineError::ConfigError(format!(
                "Invalid log output: {} (must be 'stdout', 'stderr' or 'file')",
                other
            ))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Disable to install no subscriber at all
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off
    pub level: String,

    pub format: LogFormat,

    pub output: LogOutput,

    /// Log file path when `output = "file"`
    pub file: PathBuf,

    /// Enable ANSI colors (text format on a terminal stream only)
    pub color: bool,

    /// Per-module levels, e.g. `ctxsync::scheduler = "debug"`
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Text,
            output: LogOutput::Stderr,
            file: PathBuf::from("ctxsync.log"),
            color: true,
            modules: BTreeMap::new(),
        }
    }
}

/// Initialize the global subscriber.
///
/// Environment variables take precedence over the config:
/// `CTXSYNC_LOG` (full filter), `CTXSYNC_LOG_FORMAT`, `CTXSYNC_LOG_OUTPUT`,
/// `CTXSYNC_LOG_MODULES` (`module=level,...`).
pub fn init_logging(config: &LoggingConfig) -> Result<(), EngineError> {
    if !config.enabled {
        return Ok(());
    }

    let filter = build_env_filter(config)?;
    let format = match std::env::var("CTXSYNC_LOG_FORMAT") {
        Ok(value) => value.parse()?,
        Err(_) => config.format,
    };
    let output = match std::env::var("CTXSYNC_LOG_OUTPUT") {
        Ok(value) => value.parse()?,
        Err(_) => config.output,
    };

    let registry = Registry::default().with(filter);
    let timer = ChronoUtc::rfc_3339();

    // Each arm builds a differently-typed layer, so the subscriber is installed per arm.
    let installed = match (format, output) {
        (LogFormat::Json, LogOutput::File) => registry
            .with(
                fmt::layer()
                    .json()
                    .with_timer(timer)
                    .with_writer(std::sync::Mutex::new(open_log_file(config)?)),
            )
            .try_init(),
        (LogFormat::Json, LogOutput::Stdout) => registry
            .with(fmt::layer().json().with_timer(timer).with_writer(std::io::stdout))
            .try_init(),
        (LogFormat::Json, LogOutput::Stderr) => registry
            .with(fmt::layer().json().with_timer(timer).with_writer(std::io::stderr))
            .try_init(),
        (LogFormat::Text, LogOutput::File) => registry
            .with(
                fmt::layer()
                    .with_timer(timer)
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(open_log_file(config)?)),
            )
            .try_init(),
        (LogFormat::Text, LogOutput::Stdout) => registry
            .with(
                fmt::layer()
                    .with_timer(timer)
                    .with_ansi(config.color)
                    .with_writer(std::io::stdout),
            )
            .try_init(),
        (LogFormat::Text, LogOutput::Stderr) => registry
            .with(
                fmt::layer()
                    .with_timer(timer)
                    .with_ansi(config.color)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    installed.map_err(|e| EngineError::ConfigError(format!("Failed to install logger: {}", e)))
}

fn open_log_file(config: &LoggingConfig) -> Result<std::fs::File, EngineError> {
    if let Some(parent) = config.file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                EngineError::ConfigError(format!("Failed to create log directory: {}", e))
            })?;
        }
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file)
        .map_err(|e| {
            EngineError::ConfigError(format!(
                "Failed to open log file {}: {}",
                config.file.display(),
                e
            ))
        })
}

fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, EngineError> {
    if let Ok(filter) = EnvFilter::try_from_env("CTXSYNC_LOG") {
        return Ok(filter);
    }

    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut directives: Vec<String> = config
        .modules
        .iter()
        .map(|(module, level)| format!("{}={}", module, level))
        .collect();
    if let Ok(modules) = std::env::var("CTXSYNC_LOG_MODULES") {
        directives.extend(parse_module_directives(&modules));
    }

    let mut filter = EnvFilter::new(&config.level);
    for directive in directives {
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| EngineError::ConfigError(format!("Invalid log directive: {}", e)))?,
        );
    }
    Ok(filter)
}

fn parse_module_directives(spec: &str) -> Vec<String> {
    spec.split(',')
        .filter_map(|part| {
            let (module, level) = part.split_once('=')?;
            let (module, level) = (module.trim(), level.trim());
            if module.is_empty() || level.is_empty() {
                None
            } else {
                Some(format!("{}={}", module, level))
            }
        })
        .collect()
}
