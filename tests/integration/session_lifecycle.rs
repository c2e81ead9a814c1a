//! Debug session lifecycle and snapshot restore through the engine.

use ctxsync::config::EngineConfig;
use ctxsync::context::ComponentStatus;
use ctxsync::error::EngineError;
use ctxsync::session::manager::{
    ACTIVE_DEBUG_SESSION_KEY, CONTEXT_RESTORED_KEY, DEBUG_LEARNINGS_KEY, DEBUG_MODE_KEY,
};
use ctxsync::session::{Integrity, SessionKind, SessionStatus};
use ctxsync::snapshot::DEVELOPMENT_PHASE_KEY;
use ctxsync::Engine;
use serde_json::{json, Value};
use std::time::Duration;

fn config_with_components(count: usize) -> EngineConfig {
    let mut config = EngineConfig::default();
    for i in 0..count {
        config
            .components
            .insert(format!("component-{}", i), ComponentStatus::Active);
    }
    config
}

#[tokio::test]
async fn quick_session_completes_with_restored_findings() {
    let engine = Engine::builder(EngineConfig::default()).build().unwrap();
    engine.store().update(DEVELOPMENT_PHASE_KEY, "implementation");

    let session = engine.start_session(
        "tokenizer crash",
        Some("panics on empty input".to_string()),
        SessionKind::Quick,
    );
    assert_eq!(session.status, SessionStatus::Active);
    assert!(session.snapshot_id.is_some());
    assert_eq!(engine.store().get(DEBUG_MODE_KEY), Some(json!(true)));

    engine.store().update(DEVELOPMENT_PHASE_KEY, "debugging");

    let result = engine
        .complete_session(
            session.id,
            vec!["off-by-one in tokenizer".to_string()],
            true,
        )
        .await
        .unwrap();

    assert!(result.success);
    assert!(result.context_restored);
    assert_eq!(result.session.status, SessionStatus::Completed);
    assert!(result.session.end_time.is_some());
    assert_eq!(result.findings, vec!["off-by-one in tokenizer".to_string()]);
    assert_eq!(
        result.recovery_steps.last().map(String::as_str),
        Some("Development flow resumed")
    );
    assert!(result
        .recovery_steps
        .iter()
        .any(|step| step == "Integrated 1 debug insights"));

    let store = engine.store();
    assert_eq!(store.get(DEVELOPMENT_PHASE_KEY), Some(json!("implementation")));
    assert_eq!(store.get(CONTEXT_RESTORED_KEY), Some(json!(true)));
    assert_eq!(store.get(DEBUG_MODE_KEY), Some(json!(false)));
    assert_eq!(store.get(ACTIVE_DEBUG_SESSION_KEY), Some(Value::Null));
    let learnings = store.get(DEBUG_LEARNINGS_KEY).unwrap();
    assert_eq!(learnings["insights"], json!(["off-by-one in tokenizer"]));

    assert!(engine.sessions().active().is_empty());
    assert_eq!(engine.sessions().completed().len(), 1);
    assert_eq!(
        engine.sessions().get(session.id).unwrap().status,
        SessionStatus::Completed
    );
}

#[tokio::test]
async fn completing_twice_reports_session_not_found() {
    let engine = Engine::builder(EngineConfig::default()).build().unwrap();
    let session = engine.start_session("flaky test", None, SessionKind::Standard);

    engine
        .complete_session(session.id, vec![], false)
        .await
        .unwrap();
    let again = engine.complete_session(session.id, vec![], false).await;
    assert!(matches!(again, Err(EngineError::SessionNotFound(_))));
}

#[tokio::test]
async fn restore_within_tolerance_is_valid() {
    let engine = Engine::builder(config_with_components(10)).build().unwrap();
    let snapshot = engine.create_snapshot("manual", None);
    assert_eq!(snapshot.coherence, 1.0);

    engine
        .store()
        .update_component("component-0", ComponentStatus::Idle);
    let result = engine.restore_snapshot(snapshot.id, &[]).await.unwrap();

    assert!(result.success);
    assert_eq!(result.integrity, Integrity::Valid);
    assert!(result.integrity_warning.is_none());
    assert!(result
        .steps_executed
        .iter()
        .any(|step| step == "Context integrity: Valid"));
}

#[tokio::test]
async fn restore_beyond_tolerance_warns_but_succeeds() {
    let engine = Engine::builder(config_with_components(10)).build().unwrap();
    let snapshot = engine.create_snapshot("manual", None);

    for i in 0..5 {
        engine
            .store()
            .update_component(format!("component-{}", i), ComponentStatus::Idle);
    }
    let result = engine.restore_snapshot(snapshot.id, &[]).await.unwrap();

    assert!(result.success);
    assert_eq!(result.integrity, Integrity::Compromised);
    let warning = result.integrity_warning.unwrap();
    assert_eq!(warning.snapshot_coherence, 1.0);
    assert_eq!(warning.live_coherence, 0.5);
    assert!((warning.drift - 0.5).abs() < 1e-9);
    assert!(result
        .steps_executed
        .iter()
        .any(|step| step == "Context integrity: Compromised"));
}

#[tokio::test]
async fn drifted_restore_still_completes_session() {
    let engine = Engine::builder(config_with_components(4)).build().unwrap();
    let session = engine.start_session("race in cache", None, SessionKind::Standard);

    for i in 0..2 {
        engine
            .store()
            .update_component(format!("component-{}", i), ComponentStatus::Idle);
    }
    let result = engine
        .complete_session(session.id, vec!["lock ordering".to_string()], true)
        .await
        .unwrap();

    assert!(result.success);
    assert!(result.context_restored);
    assert_eq!(result.session.status, SessionStatus::Completed);
    assert!(result.recovery_error.is_none());
    assert!(result.integrity_warning.is_some());
}

#[tokio::test]
async fn abandoned_session_moves_to_completed_log() {
    let engine = Engine::builder(EngineConfig::default()).build().unwrap();
    let session = engine.start_session("memory leak", None, SessionKind::Extended);

    let abandoned = engine
        .abandon_session(session.id, "superseded by a rewrite")
        .unwrap();
    assert_eq!(abandoned.status, SessionStatus::Abandoned);
    assert!(engine.sessions().active().is_empty());
    assert_eq!(engine.sessions().completed()[0].id, session.id);
    assert!(matches!(
        engine.abandon_session(session.id, "again"),
        Err(EngineError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn background_monitor_repeats_long_session_warning() {
    let mut config = EngineConfig::default();
    config.sessions.long_session_threshold_secs = 0;
    config.sessions.monitor_interval_ms = 20;
    let engine = Engine::builder(config).build().unwrap();
    let session = engine.start_session("slow build", None, SessionKind::Quick);
    let extended = engine.start_session("profiling", None, SessionKind::Extended);

    engine.start().unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    engine.shutdown().await;

    let warnings = engine.sessions().get(session.id).unwrap().warnings;
    let long_warnings: Vec<&String> = warnings
        .iter()
        .filter(|w| w.contains("consider upgrading to Extended"))
        .collect();
    assert!(long_warnings.len() >= 2, "warnings: {:?}", warnings);

    let extended_warnings = engine.sessions().get(extended.id).unwrap().warnings;
    assert!(extended_warnings
        .iter()
        .all(|w| !w.contains("consider upgrading to Extended")));
}
