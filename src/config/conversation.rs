// src/config/conversation.rs

use serde::{Deserialize, Serialize};

use super::helpers::env_usize;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Conversations evicted after this many seconds of inactivity.
    pub ttl_secs: i64,
    pub sweep_interval_secs: u64,
    pub history_snapshot_cap: usize,
}

impl ConversationConfig {
    pub fn from_env() -> Self {
        Self {
            ttl_secs: env_usize("CONVERSATION_TTL_SECS", 3600) as i64,
            sweep_interval_secs: env_usize("CONVERSATION_SWEEP_INTERVAL_SECS", 300) as u64,
            history_snapshot_cap: env_usize("CONVERSATION_HISTORY_CAP", 200),
        }
    }
}
