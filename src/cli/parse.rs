//! CLI parse: clap types for ctxsync. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ctxsync CLI - context synchronization and recovery engine
#[derive(Parser)]
#[command(name = "ctxsync")]
#[command(about = "Context synchronization, health checks and snapshot recovery")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (where `config/` is looked up)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides layered config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score context health for an optional input
    Health {
        /// Latest user input to scan for context-loss phrases
        #[arg(long)]
        input: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Run a request, a debug session and a restore against the built-in processor
    Demo {
        /// Request payload
        #[arg(long, default_value = "status")]
        input: String,
        /// Session kind (quick, standard, extended, emergency)
        #[arg(long, default_value = "quick")]
        kind: String,
    },
    /// Print the effective configuration as TOML
    Config,
}
