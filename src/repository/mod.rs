// src/repository/mod.rs
// The persistence boundary. Out of scope per the purpose statement: users,
// connections, and messages are owned by an external collaborator. This
// module defines the trait contract the orchestration core depends on and a
// minimal in-memory implementation used for local running and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::model::conversation::Message;
use crate::model::{Connection, ConversationState};
use crate::summary::EmbeddableDataset;

/// Hands the dashboard phase's chart config and embeddable datasets off to
/// whatever renders them (a server-side HTML builder, a client push, ...).
/// No concrete implementation ships here — the same external-collaborator
/// boundary as `ConnectionRepository`/`ConversationRepository`.
#[async_trait]
pub trait DashboardRenderer: Send + Sync {
    async fn render(
        &self,
        conversation_id: i64,
        chart_config: Option<serde_json::Value>,
        datasets: Vec<EmbeddableDataset>,
    ) -> anyhow::Result<()>;
}

#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    /// Reads a connection by id, enforcing `(connection_id, owner_id)`
    /// ownership. Returns `Ok(None)` on a mismatch or missing row — never an
    /// error, so callers distinguish "not yours" from a transport failure.
    async fn find_by_id_and_owner(
        &self,
        connection_id: i64,
        owner_id: &str,
    ) -> anyhow::Result<Option<Connection>>;
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn load_history(&self, conversation_id: i64) -> anyhow::Result<Vec<Message>>;
    async fn append_message(&self, conversation_id: i64, message: Message) -> anyhow::Result<()>;
    async fn next_conversation_id(&self) -> anyhow::Result<i64>;
    async fn save_state(&self, state: &ConversationState) -> anyhow::Result<()>;
}

/// `HashMap`-backed fake satisfying both traits, used by `tests/` and the
/// `orchestrator_cli` binary. Not a product persistence layer.
#[derive(Default)]
pub struct InMemoryRepository {
    connections: RwLock<HashMap<i64, Connection>>,
    histories: RwLock<HashMap<i64, Vec<Message>>>,
    next_id: RwLock<i64>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            histories: RwLock::new(HashMap::new()),
            next_id: RwLock::new(1),
        }
    }

    pub async fn insert_connection(&self, conn: Connection) {
        self.connections.write().await.insert(conn.id, conn);
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl ConnectionRepository for InMemoryRepository {
    async fn find_by_id_and_owner(
        &self,
        connection_id: i64,
        owner_id: &str,
    ) -> anyhow::Result<Option<Connection>> {
        let guard = self.connections.read().await;
        Ok(guard
            .get(&connection_id)
            .filter(|c| c.owner_id == owner_id)
            .cloned())
    }
}

#[async_trait]
impl ConversationRepository for InMemoryRepository {
    async fn load_history(&self, conversation_id: i64) -> anyhow::Result<Vec<Message>> {
        Ok(self
            .histories
            .read()
            .await
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_message(&self, conversation_id: i64, message: Message) -> anyhow::Result<()> {
        self.histories
            .write()
            .await
            .entry(conversation_id)
            .or_default()
            .push(message);
        Ok(())
    }

    async fn next_conversation_id(&self) -> anyhow::Result<i64> {
        let mut guard = self.next_id.write().await;
        let id = *guard;
        *guard += 1;
        Ok(id)
    }

    async fn save_state(&self, _state: &ConversationState) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::connection::SourceKind;

    fn conn(id: i64, owner: &str) -> Connection {
        Connection {
            id,
            owner_id: owner.to_string(),
            name: "test".to_string(),
            kind: SourceKind::Postgresql,
            host: None,
            port: None,
            database: None,
            username: None,
            password: None,
            detail: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn ownership_mismatch_returns_none() {
        let repo = InMemoryRepository::new();
        repo.insert_connection(conn(1, "alice")).await;

        assert!(repo
            .find_by_id_and_owner(1, "bob")
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .find_by_id_and_owner(1, "alice")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn conversation_ids_increment() {
        let repo = InMemoryRepository::new();
        let a = repo.next_conversation_id().await.unwrap();
        let b = repo.next_conversation_id().await.unwrap();
        assert_eq!(b, a + 1);
    }
}
