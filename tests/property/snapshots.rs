//! Snapshots are immutable and restores are judged against the tolerance.

use ctxsync::config::EngineConfig;
use ctxsync::context::{ComponentStatus, ContextStore};
use ctxsync::session::Integrity;
use ctxsync::snapshot::SnapshotManager;
use ctxsync::telemetry::EventBus;
use ctxsync::Engine;
use proptest::prelude::*;
use proptest::test_runner::{Config, TestRunner};
use serde_json::json;
use std::sync::Arc;

#[test]
fn test_snapshot_is_unaffected_by_later_writes() {
    let mut runner = TestRunner::default();

    runner
        .run(
            &(
                prop::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..12),
                prop::collection::vec(("[a-z]{1,6}", any::<i64>()), 1..12),
            ),
            |(initial, later)| {
                let store = Arc::new(ContextStore::new());
                for (key, value) in &initial {
                    store.update(key.clone(), *value);
                }
                store.update_component("core", ComponentStatus::Active);

                let manager = SnapshotManager::new(Arc::clone(&store), EventBus::default());
                let snapshot = manager.capture("property", None);
                let before = snapshot.context_copy.clone();

                for (key, value) in &later {
                    store.update(key.clone(), json!(value.wrapping_add(1)));
                }
                store.update_component("core", ComponentStatus::Idle);

                let reread = manager.get(snapshot.id).unwrap();
                prop_assert_eq!(&reread.context_copy, &before);
                prop_assert_eq!(reread.coherence, 1.0);
                prop_assert_eq!(
                    reread.components.get("core").map(|c| c.status),
                    Some(ComponentStatus::Active)
                );
                for (key, value) in &initial {
                    prop_assert_eq!(reread.context_copy.get(key), Some(&json!(value)));
                }
                Ok(())
            },
        )
        .unwrap();
}

#[test]
fn test_restore_integrity_follows_tolerance() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut runner = TestRunner::new(Config::with_cases(32));

    runner
        .run(&(1usize..12, 0usize..12), |(total, idle)| {
            let idle = idle.min(total);
            let mut config = EngineConfig::default();
            for i in 0..total {
                config
                    .components
                    .insert(format!("component-{}", i), ComponentStatus::Active);
            }
            let tolerance = config.sessions.restore_tolerance;
            let engine = Engine::builder(config).build().unwrap();
            let snapshot = engine.create_snapshot("property", None);

            for i in 0..idle {
                engine
                    .store()
                    .update_component(format!("component-{}", i), ComponentStatus::Idle);
            }
            let live = engine.store().coherence();
            let result = runtime
                .block_on(engine.restore_snapshot(snapshot.id, &[]))
                .unwrap();

            prop_assert!(result.success);
            let drift = (live - snapshot.coherence).abs();
            if drift < tolerance {
                prop_assert_eq!(result.integrity, Integrity::Valid);
                prop_assert!(result.integrity_warning.is_none());
            } else {
                prop_assert_eq!(result.integrity, Integrity::Compromised);
                let warning = result.integrity_warning.unwrap();
                prop_assert!((warning.drift - drift).abs() < 1e-12);
            }
            Ok(())
        })
        .unwrap();
}
