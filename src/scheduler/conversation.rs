//! Per-conversation exchange log.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::scheduler::types::{Request, Response};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub request: String,
    pub response: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// Bounded history per conversation id; oldest exchanges drop first.
pub struct ConversationLog {
    limit: usize,
    conversations: RwLock<HashMap<String, VecDeque<Exchange>>>,
}

impl ConversationLog {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            conversations: RwLock::new(HashMap::new()),
        }
    }

    pub fn record(&self, request: &Request, response: &Response) {
        let mut conversations = self.conversations.write();
        let exchanges = conversations
            .entry(request.conversation_id.clone())
            .or_default();
        exchanges.push_back(Exchange {
            request: request.payload.clone(),
            response: response.content.clone(),
            success: response.success,
            timestamp: response.timestamp,
        });
        while exchanges.len() > self.limit {
            exchanges.pop_front();
        }
    }

    pub fn history(&self, conversation_id: &str) -> Vec<Exchange> {
        self.conversations
            .read()
            .get(conversation_id)
            .map(|exchanges| exchanges.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn conversation_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.conversations.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}
