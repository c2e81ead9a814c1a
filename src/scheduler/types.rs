//! Request, response and stream chunk types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Conversation id used when the caller does not supply one.
pub const DEFAULT_CONVERSATION: &str = "default";

/// Priority used for ordinary requests.
pub const NORMAL_PRIORITY: u8 = 5;
/// Priority used when the submitter detected the context is in bad shape.
pub const URGENT_PRIORITY: u8 = 1;

/// Work item consumed exactly once by the worker.
///
/// `priority` is recorded but never reorders the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: Uuid,
    pub conversation_id: String,
    pub payload: String,
    pub priority: u8,
    pub enqueued_at: DateTime<Utc>,
}

impl Request {
    pub fn new(payload: impl Into<String>, conversation_id: Option<String>, priority: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id: conversation_id.unwrap_or_else(|| DEFAULT_CONVERSATION.to_string()),
            payload: payload.into(),
            priority,
            enqueued_at: Utc::now(),
        }
    }
}

/// Result paired 1:1 with a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: Uuid,
    pub conversation_id: String,
    pub content: String,
    pub success: bool,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub processing_time_ms: u64,
}

/// What a processor hands back for a request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorOutput {
    pub content: String,
    pub confidence: f64,
}

impl ProcessorOutput {
    pub fn new(content: impl Into<String>, confidence: f64) -> Self {
        Self {
            content: content.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Piece of a response delivered incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub response_id: Uuid,
    pub index: usize,
    pub content: String,
    pub coherence: f64,
    pub is_complete: bool,
}

/// Split a response into word chunks.
///
/// Chunk `i` of `n` carries coherence `0.7 + 0.3 * i / n`; only the last is complete.
/// Empty content yields a single empty, complete chunk.
pub fn stream_chunks(response: &Response) -> Vec<StreamChunk> {
    let words: Vec<&str> = response.content.split_whitespace().collect();
    if words.is_empty() {
        return vec![StreamChunk {
            response_id: response.id,
            index: 0,
            content: String::new(),
            coherence: 1.0,
            is_complete: true,
        }];
    }

    let total = words.len();
    words
        .into_iter()
        .enumerate()
        .map(|(i, word)| StreamChunk {
            response_id: response.id,
            index: i,
            content: if i + 1 == total {
                word.to_string()
            } else {
                format!("{} ", word)
            },
            coherence: 0.7 + 0.3 * i as f64 / total as f64,
            is_complete: i + 1 == total,
        })
        .collect()
}
