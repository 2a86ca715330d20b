// src/model/conversation.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub conversation_id: i64,
    pub current_phase: String,
    pub last_ai_response: Option<String>,
    pub conversation_history_snapshot: Vec<Message>,
    pub context: HashMap<String, serde_json::Value>,
    pub last_updated: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(conversation_id: i64, history: Vec<Message>) -> Self {
        Self {
            conversation_id,
            current_phase: "understanding_intent".to_string(),
            last_ai_response: None,
            conversation_history_snapshot: history,
            context: HashMap::new(),
            last_updated: Utc::now(),
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>, ttl_seconds: i64) -> bool {
        (now - self.last_updated).num_seconds() > ttl_seconds
    }
}
