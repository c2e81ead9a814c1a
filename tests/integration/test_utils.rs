//! Processors and collaborators shared by the integration tests.

use async_trait::async_trait;
use ctxsync::collaborator::{StateSource, SyncBridge};
use ctxsync::context::ContextSnapshot;
use ctxsync::error::{CollaboratorError, EngineError};
use ctxsync::scheduler::{ProcessorOutput, Request, RequestProcessor};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Sleeps before echoing the payload.
pub struct SlowProcessor {
    pub delay: Duration,
}

#[async_trait]
impl RequestProcessor for SlowProcessor {
    async fn process(
        &self,
        request: &Request,
        _context: &ContextSnapshot,
    ) -> Result<ProcessorOutput, EngineError> {
        tokio::time::sleep(self.delay).await;
        Ok(ProcessorOutput::new(format!("slow: {}", request.payload), 0.9))
    }
}

/// Records payloads in processing order.
#[derive(Default)]
pub struct RecordingProcessor {
    pub seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl RequestProcessor for RecordingProcessor {
    async fn process(
        &self,
        request: &Request,
        _context: &ContextSnapshot,
    ) -> Result<ProcessorOutput, EngineError> {
        self.seen.lock().push(request.payload.clone());
        Ok(ProcessorOutput::new(request.payload.clone(), 1.0))
    }
}

/// Panics on "panic", fails on "fail", echoes anything else.
pub struct FlakyProcessor;

#[async_trait]
impl RequestProcessor for FlakyProcessor {
    async fn process(
        &self,
        request: &Request,
        _context: &ContextSnapshot,
    ) -> Result<ProcessorOutput, EngineError> {
        match request.payload.as_str() {
            "panic" => panic!("processor exploded"),
            "fail" => Err(EngineError::ProcessingError("refused".to_string())),
            other => Ok(ProcessorOutput::new(format!("ok: {}", other), 0.8)),
        }
    }
}

/// State source that counts overlapping calls.
pub struct OverlapDetectingSource {
    pub in_flight: AtomicBool,
    pub overlaps: AtomicUsize,
    pub calls: AtomicUsize,
    pub delay: Duration,
}

impl OverlapDetectingSource {
    pub fn new(delay: Duration) -> Self {
        Self {
            in_flight: AtomicBool::new(false),
            overlaps: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            delay,
        }
    }
}

#[async_trait]
impl StateSource for OverlapDetectingSource {
    fn name(&self) -> &str {
        "editor"
    }

    async fn get_state(&self) -> Result<Value, CollaboratorError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.store(false, Ordering::SeqCst);
        Ok(json!({ "open_files": 3 }))
    }
}

/// Bridge that counts pushes and accepts them all.
#[derive(Default)]
pub struct CountingBridge {
    pub pushes: AtomicUsize,
}

#[async_trait]
impl SyncBridge for CountingBridge {
    async fn push(&self, _context: &ContextSnapshot) -> bool {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        true
    }
}
