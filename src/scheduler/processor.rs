//! Request processors.

use crate::context::ContextSnapshot;
use crate::error::EngineError;
use crate::scheduler::types::{ProcessorOutput, Request};
use async_trait::async_trait;

/// Turns a request plus a copy of the context into an output.
///
/// Errors and panics are both turned into failed responses by the worker.
#[async_trait]
pub trait RequestProcessor: Send + Sync {
    async fn process(
        &self,
        request: &Request,
        context: &ContextSnapshot,
    ) -> Result<ProcessorOutput, EngineError>;
}

/// Deterministic keyword-driven processor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextAwareProcessor;

impl ContextAwareProcessor {
    pub const CONFIDENCE: f64 = 0.85;

    fn reply(request: &Request, context: &ContextSnapshot) -> String {
        let input = request.payload.to_lowercase();
        if input.contains("status") {
            format!(
                "System Status: All components operational. Coherence: {:.3}. Active components: {}.",
                context.coherence,
                context.components.len()
            )
        } else if input.contains("context") {
            format!(
                "Context Health: Good. Last update: {}. Context memory: Operational.",
                context.last_update.format("%H:%M:%S")
            )
        } else if input.contains("help") {
            "Available commands: status, context, sync, analyze, help.".to_string()
        } else {
            format!(
                "Received input: '{}'. Processing with coherence {:.3} and {} active components.",
                request.payload,
                context.coherence,
                context.components.len()
            )
        }
    }
}

#[async_trait]
impl RequestProcessor for ContextAwareProcessor {
    async fn process(
        &self,
        request: &Request,
        context: &ContextSnapshot,
    ) -> Result<ProcessorOutput, EngineError> {
        Ok(ProcessorOutput::new(
            Self::reply(request, context),
            Self::CONFIDENCE,
        ))
    }
}
