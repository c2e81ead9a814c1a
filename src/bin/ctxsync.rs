//! ctxsync CLI Binary
//!
//! Command-line interface for the context synchronization engine.

use anyhow::{Context, Result};
use clap::Parser;
use ctxsync::cli::{map_error, Cli, RunContext};
use ctxsync::config::ConfigLoader;
use ctxsync::logging::{init_logging, LoggingConfig};
use tracing::{error, info};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli)?;
    init_logging(&logging_config).context("Failed to initialize logging")?;

    info!("ctxsync CLI starting");

    let context = RunContext::new(cli.workspace.clone(), cli.config.clone())
        .map_err(|e| anyhow::anyhow!(map_error(&e)))
        .context("Failed to load configuration")?;

    match context.execute(&cli.command) {
        Ok(output) => {
            info!("Command completed successfully");
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            Err(anyhow::anyhow!(map_error(&e)))
        }
    }
}

/// Build logging configuration from CLI args and the config file.
/// Precedence: CLI flags override config file override defaults.
fn build_logging_config(cli: &Cli) -> Result<LoggingConfig> {
    let loaded = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(&cli.workspace),
    };
    let mut config = loaded.map(|c| c.logging).unwrap_or_default();

    if cli.quiet {
        config.enabled = false;
    }
    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(level) = &cli.log_level {
        config.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.format = format.parse().context("Invalid --log-format")?;
    }
    if let Some(output) = &cli.log_output {
        config.output = output.parse().context("Invalid --log-output")?;
    }
    if let Some(file) = &cli.log_file {
        config.file = file.clone();
    }

    Ok(config)
}
