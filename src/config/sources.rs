//! Configuration sources, lowest precedence first.

pub mod global_file;
pub mod workspace_file;

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment};

/// Add `CTXSYNC__SECTION__KEY` environment overrides to the builder.
pub fn add_env_overrides(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("CTXSYNC")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    )
}
