// src/conversation/mod.rs
// The only component permitted to mutate a ConversationState. In-process
// concurrent map keyed by conversationId, lazily loaded from the
// repository, swept for idle staleness.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::config::CONFIG;
use crate::model::conversation::Message;
use crate::model::ConversationState;
use crate::repository::ConversationRepository;

pub struct ConversationManager {
    repository: Arc<dyn ConversationRepository>,
    states: tokio::sync::RwLock<HashMap<i64, ConversationState>>,
}

impl ConversationManager {
    pub fn new(repository: Arc<dyn ConversationRepository>) -> Self {
        Self {
            repository,
            states: tokio::sync::RwLock::new(HashMap::new()),
        }
    }

    /// Returns the in-memory state for `conversation_id`, constructing it
    /// from the repository's message history on first access.
    pub async fn get_or_create(&self, conversation_id: i64) -> anyhow::Result<ConversationState> {
        if let Some(existing) = self.states.read().await.get(&conversation_id) {
            return Ok(existing.clone());
        }

        let history = self.repository.load_history(conversation_id).await?;
        let state = ConversationState::new(conversation_id, history);
        self.states.write().await.insert(conversation_id, state.clone());
        Ok(state)
    }

    /// Records the AI's last response and advances `current_phase`,
    /// touching `last_updated`.
    pub async fn update_state(
        &self,
        conversation_id: i64,
        phase: impl Into<String>,
        ai_response: Option<String>,
    ) -> anyhow::Result<()> {
        let mut guard = self.states.write().await;
        let state = guard
            .entry(conversation_id)
            .or_insert_with(|| ConversationState::new(conversation_id, Vec::new()));
        state.current_phase = phase.into();
        if let Some(response) = ai_response {
            state.last_ai_response = Some(response);
        }
        state.last_updated = Utc::now();
        self.repository.save_state(state).await
    }

    /// Appends a user turn to the history snapshot and persists it.
    pub async fn add_user_message(&self, conversation_id: i64, content: impl Into<String>) -> anyhow::Result<()> {
        let message = Message {
            role: "user".to_string(),
            content: content.into(),
            timestamp: Utc::now(),
        };

        let mut guard = self.states.write().await;
        let state = guard
            .entry(conversation_id)
            .or_insert_with(|| ConversationState::new(conversation_id, Vec::new()));
        state.conversation_history_snapshot.push(message.clone());
        state.last_updated = Utc::now();
        drop(guard);

        self.repository.append_message(conversation_id, message).await
    }

    /// Allocates a new conversation id, seeding state with none of the
    /// caller's message yet (the orchestrator persists it separately via
    /// `add_user_message`).
    pub async fn create_conversation(&self) -> anyhow::Result<i64> {
        self.repository.next_conversation_id().await
    }

    /// Removes every state idle for longer than the conversation TTL.
    pub async fn cleanup(&self) {
        let now = Utc::now();
        let ttl = CONFIG.conversation.ttl_secs;
        let mut guard = self.states.write().await;
        let before = guard.len();
        guard.retain(|_, state| !state.is_stale(now, ttl));
        let removed = before - guard.len();
        if removed > 0 {
            info!(removed, "evicted stale conversation states");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;

    #[tokio::test]
    async fn get_or_create_lazily_loads_from_repository() {
        let repo = Arc::new(InMemoryRepository::new());
        let manager = ConversationManager::new(repo);

        let state = manager.get_or_create(1).await.unwrap();
        assert_eq!(state.conversation_id, 1);
        assert_eq!(state.current_phase, "understanding_intent");
    }

    #[tokio::test]
    async fn add_user_message_persists_and_updates_snapshot() {
        let repo = Arc::new(InMemoryRepository::new());
        let manager = ConversationManager::new(repo.clone());

        manager.add_user_message(1, "hello").await.unwrap();
        let state = manager.get_or_create(1).await.unwrap();
        assert_eq!(state.conversation_history_snapshot.len(), 1);
        assert_eq!(state.conversation_history_snapshot[0].content, "hello");
    }

    #[tokio::test]
    async fn cleanup_evicts_stale_states_only() {
        let repo = Arc::new(InMemoryRepository::new());
        let manager = ConversationManager::new(repo);

        manager.get_or_create(1).await.unwrap();
        {
            let mut guard = manager.states.write().await;
            let state = guard.get_mut(&1).unwrap();
            state.last_updated = Utc::now() - chrono::Duration::hours(2);
        }
        manager.get_or_create(2).await.unwrap();

        manager.cleanup().await;

        let guard = manager.states.read().await;
        assert!(!guard.contains_key(&1));
        assert!(guard.contains_key(&2));
    }
}
