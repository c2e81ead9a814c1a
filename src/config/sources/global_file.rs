//! Global config file source: `{project config dir}/config.toml`
//! (e.g. `~/.config/ctxsync/config.toml` on Linux).

use config::builder::DefaultState;
use config::{ConfigBuilder, File};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Path to the global config file, if a home directory can be determined.
pub fn global_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "ctxsync").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Add the global config file to the builder when it exists.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    path: Option<&Path>,
) -> ConfigBuilder<DefaultState> {
    match path {
        Some(path) if path.exists() => builder.add_source(File::from(path).required(false)),
        Some(path) => {
            debug!(config_path = %path.display(), "No global configuration file");
            builder
        }
        None => builder,
    }
}
