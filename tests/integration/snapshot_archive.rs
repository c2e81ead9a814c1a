//! Snapshots survive an engine restart when an archive path is configured.

use ctxsync::config::EngineConfig;
use ctxsync::session::SessionKind;
use ctxsync::snapshot::{SnapshotArchive, ACTIVE_TASKS_KEY, DEVELOPMENT_PHASE_KEY};
use ctxsync::Engine;
use serde_json::json;
use tempfile::TempDir;

fn archived_config(dir: &TempDir) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.storage.snapshot_path = Some(dir.path().join("snapshots"));
    config
}

#[tokio::test]
async fn restarted_engine_reloads_archived_snapshots() {
    let dir = TempDir::new().unwrap();

    let (first_id, second_id) = {
        let engine = Engine::builder(archived_config(&dir)).build().unwrap();
        engine.store().update(DEVELOPMENT_PHASE_KEY, "testing");
        engine
            .store()
            .update(ACTIVE_TASKS_KEY, json!(["write docs", "fix ci"]));
        let first = engine.create_snapshot("manual", Some("before refactor".to_string()));
        let session = engine.start_session("ci failure", None, SessionKind::Quick);
        (first.id, session.snapshot_id.unwrap())
    };

    let engine = Engine::builder(archived_config(&dir)).build().unwrap();
    let snapshots = engine.snapshots().list();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].id, first_id);
    assert_eq!(snapshots[1].id, second_id);

    let first = engine.snapshots().get(first_id).unwrap();
    assert_eq!(first.development_phase, "testing");
    assert_eq!(first.active_tasks, vec!["write docs", "fix ci"]);
    assert_eq!(first.description.as_deref(), Some("before refactor"));
    assert_eq!(first.context_copy.get(DEVELOPMENT_PHASE_KEY), Some(&json!("testing")));

    let restored = engine.restore_snapshot(first_id, &[]).await.unwrap();
    assert!(restored.success);
    assert_eq!(
        engine.store().get(ACTIVE_TASKS_KEY),
        Some(json!(["write docs", "fix ci"]))
    );
}

#[tokio::test]
async fn archive_lists_records_oldest_first() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshots");

    {
        let engine = Engine::builder(archived_config(&dir)).build().unwrap();
        for i in 0..3 {
            engine.create_snapshot(format!("checkpoint {}", i), None);
        }
    }

    let archive = SnapshotArchive::open(&path).unwrap();
    assert_eq!(archive.len(), 3);
    let triggers: Vec<String> = archive
        .load_all()
        .unwrap()
        .into_iter()
        .map(|s| s.trigger)
        .collect();
    assert_eq!(triggers, vec!["checkpoint 0", "checkpoint 1", "checkpoint 2"]);
}
