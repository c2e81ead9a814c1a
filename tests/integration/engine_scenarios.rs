//! End-to-end engine behavior with the background monitors running.

use crate::integration::test_utils::{CountingBridge, OverlapDetectingSource};
use ctxsync::config::EngineConfig;
use ctxsync::error::EngineError;
use ctxsync::health::{BRIDGE_SYNC_STATUS_KEY, LAST_BRIDGE_SYNC_KEY};
use ctxsync::scheduler::StreamChunk;
use ctxsync::telemetry::EngineEvent;
use ctxsync::Engine;
use futures::StreamExt;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn healthy_ticks_push_context_to_the_bridge() {
    let mut config = EngineConfig::default();
    config.health.check_interval_ms = 20;
    let bridge = Arc::new(CountingBridge::default());
    let engine = Engine::builder(config)
        .bridge(Arc::clone(&bridge) as _)
        .build()
        .unwrap();
    let mut events = engine.subscribe();

    engine.start().unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    engine.shutdown().await;

    assert!(bridge.pushes.load(Ordering::SeqCst) >= 1);
    assert_eq!(
        engine.store().get(BRIDGE_SYNC_STATUS_KEY),
        Some(json!("synchronized"))
    );
    assert!(engine.store().get(LAST_BRIDGE_SYNC_KEY).is_some());

    let mut health_checks = 0;
    while let Ok(envelope) = events.try_recv() {
        if let EngineEvent::HealthChecked { healthy, .. } = envelope.event {
            assert!(healthy);
            health_checks += 1;
        }
    }
    assert!(health_checks >= 1);
}

#[tokio::test]
async fn loss_phrase_scores_low_and_prescribes_full_recovery() {
    let engine = Engine::builder(EngineConfig::default()).build().unwrap();

    let result = engine.check_health(Some("Wait, I think we are STARTING OVER?"));
    assert!(result.score <= 0.3);
    assert!(result.needs_immediate_recovery());
    assert_eq!(result.indicators, vec!["User mentioned: starting over"]);
    assert_eq!(result.recovery_actions, vec!["Execute full context recovery"]);

    let calm = engine.check_health(Some("let's add a test for the parser"));
    assert_eq!(calm.score, 1.0);
    assert!(calm.indicators.is_empty());
}

#[tokio::test]
async fn streamed_chunks_reassemble_the_response() {
    let engine = Engine::builder(EngineConfig::default()).build().unwrap();
    engine.start().unwrap();

    let chunks: Vec<StreamChunk> = engine
        .submit_streaming("context", None, Some(Duration::from_secs(5)))
        .await
        .unwrap()
        .collect()
        .await;
    engine.shutdown().await;

    assert!(!chunks.is_empty());
    assert!(chunks.last().unwrap().is_complete);
    assert!(chunks[..chunks.len() - 1].iter().all(|c| !c.is_complete));
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.index, i);
        assert!((0.7..=1.0).contains(&chunk.coherence));
    }
    let history = engine.scheduler().conversation("default");
    let streamed: String = chunks.iter().map(|c| c.content.as_str()).collect();
    let expected = history[0]
        .response
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    assert_eq!(streamed, expected);
}

#[tokio::test]
async fn caller_timeout_covers_pre_submit_recovery() {
    let source = Arc::new(OverlapDetectingSource::new(Duration::from_millis(500)));
    let engine = Engine::builder(EngineConfig::default())
        .state_source(Arc::clone(&source) as _)
        .build()
        .unwrap();

    let started = Instant::now();
    let result = engine
        .submit(
            "I lost track, starting over",
            None,
            Some(Duration::from_millis(10)),
        )
        .await;
    assert!(matches!(result, Err(EngineError::Timeout(t)) if t == Duration::from_millis(10)));
    assert!(started.elapsed() < Duration::from_millis(300));
    assert_eq!(engine.scheduler().stats().pending, 0);

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.recovery().history().len(), 1);
}
