//! Workspace config file source: `config/ctxsync.toml` and `config/{env}.toml`

use config::builder::DefaultState;
use config::{ConfigBuilder, File};
use std::path::Path;

pub const ENV_NAME_VAR: &str = "CTXSYNC_ENV";
const DEFAULT_ENV_NAME: &str = "development";

/// Add workspace config files to the builder.
/// Precedence: `config/ctxsync.toml` (base) then `config/{CTXSYNC_ENV}.toml`.
pub fn add_to_builder(
    mut builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> ConfigBuilder<DefaultState> {
    let config_dir = workspace_root.join("config");
    let env_name = std::env::var(ENV_NAME_VAR).unwrap_or_else(|_| DEFAULT_ENV_NAME.to_string());

    let base_config_path = config_dir.join("ctxsync.toml");
    if base_config_path.exists() {
        builder = builder.add_source(File::from(base_config_path).required(false));
    }

    let env_config_path = config_dir.join(format!("{}.toml", env_name));
    if env_config_path.exists() {
        builder = builder.add_source(File::from(env_config_path).required(false));
    }

    builder
}
