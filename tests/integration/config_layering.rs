//! Layered configuration: global file, workspace files, then environment.

use ctxsync::config::{ConfigLoader, EngineConfig, ENV_NAME_VAR};
use ctxsync::logging::LogFormat;
use parking_lot::Mutex;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

static ENV_LOCK: Mutex<()> = parking_lot::const_mutex(());

const QUEUE_OVERRIDE_VAR: &str = "CTXSYNC__SCHEDULER__MAX_QUEUE_SIZE";

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

#[test]
fn later_layers_override_earlier_ones() {
    let _guard = ENV_LOCK.lock();
    std::env::remove_var(QUEUE_OVERRIDE_VAR);
    std::env::set_var(ENV_NAME_VAR, "staging");

    let global = TempDir::new().unwrap();
    let global_path = global.path().join("config.toml");
    write(
        &global_path,
        "[scheduler]\nmax_queue_size = 10\ndefault_timeout_ms = 1000\n\n[health]\ncheck_interval_ms = 900\n",
    );

    let workspace = TempDir::new().unwrap();
    write(
        &workspace.path().join("config/ctxsync.toml"),
        "[scheduler]\nmax_queue_size = 20\n\n[logging]\nformat = \"json\"\n",
    );
    write(
        &workspace.path().join("config/staging.toml"),
        "[scheduler]\nmax_queue_size = 30\n",
    );

    let config = ConfigLoader::load_with_global(workspace.path(), Some(&global_path)).unwrap();
    std::env::remove_var(ENV_NAME_VAR);

    assert_eq!(config.scheduler.max_queue_size, 30);
    assert_eq!(config.scheduler.default_timeout_ms, 1000);
    assert_eq!(config.health.check_interval_ms, 900);
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(
        config.sessions.restore_tolerance,
        EngineConfig::default().sessions.restore_tolerance
    );
}

#[test]
fn environment_overrides_workspace_files() {
    let _guard = ENV_LOCK.lock();
    std::env::remove_var(ENV_NAME_VAR);

    let workspace = TempDir::new().unwrap();
    write(
        &workspace.path().join("config/ctxsync.toml"),
        "[scheduler]\nmax_queue_size = 20\n",
    );

    std::env::set_var(QUEUE_OVERRIDE_VAR, "42");
    let config = ConfigLoader::load_with_global(workspace.path(), None);
    std::env::remove_var(QUEUE_OVERRIDE_VAR);

    assert_eq!(config.unwrap().scheduler.max_queue_size, 42);
}

#[test]
fn missing_files_yield_defaults() {
    let _guard = ENV_LOCK.lock();
    std::env::remove_var(ENV_NAME_VAR);
    std::env::remove_var(QUEUE_OVERRIDE_VAR);

    let workspace = TempDir::new().unwrap();
    let missing_global = workspace.path().join("nowhere/config.toml");
    let config = ConfigLoader::load_with_global(workspace.path(), Some(&missing_global)).unwrap();

    assert_eq!(config, EngineConfig::default());
    assert!(config.validate().is_ok());
}

#[test]
fn invalid_values_are_reported_per_section() {
    let _guard = ENV_LOCK.lock();
    std::env::remove_var(ENV_NAME_VAR);
    std::env::remove_var(QUEUE_OVERRIDE_VAR);

    let workspace = TempDir::new().unwrap();
    write(
        &workspace.path().join("config/ctxsync.toml"),
        "[scheduler]\nmax_queue_size = 0\n\n[sessions]\nrestore_tolerance = 3.0\n",
    );
    let config = ConfigLoader::load_with_global(workspace.path(), None).unwrap();

    let errors = config.validate().unwrap_err();
    let sections: Vec<&str> = errors.iter().map(|e| e.section).collect();
    assert!(sections.contains(&"scheduler"));
    assert!(sections.contains(&"sessions"));
}
