// src/registry.rs
// Resolves a connection record to a cached adapter; authorises by owner;
// owns adapter lifecycle.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::adapters::{build_adapter, DataSourceAdapter};
use crate::config::CONFIG;
use crate::error::EngineError;
use crate::model::Connection;
use crate::repository::ConnectionRepository;

pub struct DataSourceRegistry {
    repository: Arc<dyn ConnectionRepository>,
    cache: RwLock<HashMap<i64, Arc<dyn DataSourceAdapter>>>,
}

impl DataSourceRegistry {
    pub fn new(repository: Arc<dyn ConnectionRepository>) -> Self {
        Self {
            repository,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns a cached adapter for `conn`, creating one on miss.
    /// Insertion is insert-if-absent: a concurrent miss for the same id may
    /// build the adapter twice, but only one survives in the cache — safe
    /// because adapter construction has no side effects beyond building a
    /// connection string.
    pub async fn get_data_source(&self, conn: &Connection) -> Arc<dyn DataSourceAdapter> {
        if let Some(existing) = self.cache.read().await.get(&conn.id) {
            return existing.clone();
        }
        let adapter = build_adapter(conn);
        let mut guard = self.cache.write().await;
        guard.entry(conn.id).or_insert_with(|| adapter.clone());
        guard.get(&conn.id).cloned().unwrap_or(adapter)
    }

    /// Resolves via the repository with ownership enforcement first; `Ok(None)`
    /// on a mismatch, never an error.
    pub async fn get_data_source_by_connection_id(
        &self,
        connection_id: i64,
        owner_id: &str,
    ) -> Result<Option<Arc<dyn DataSourceAdapter>>, EngineError> {
        let conn = self
            .repository
            .find_by_id_and_owner(connection_id, owner_id)
            .await
            .map_err(|e| EngineError::ConnectionError(e.to_string()))?;
        match conn {
            Some(conn) => Ok(Some(self.get_data_source(&conn).await)),
            None => Ok(None),
        }
    }

    /// Inserts (or replaces) the cached adapter for `connection_id` directly,
    /// bypassing `build_adapter`. Lets a caller wire in a data source the
    /// normal connection record can't reach, the counterpart to `clear_cache`.
    pub async fn set_adapter(&self, connection_id: i64, adapter: Arc<dyn DataSourceAdapter>) {
        self.cache.write().await.insert(connection_id, adapter);
    }

    /// Invalidates the cached adapter for `connection_id`, e.g. after a
    /// connection's configuration changes.
    pub async fn clear_cache(&self, connection_id: i64) {
        self.cache.write().await.remove(&connection_id);
        info!(connection_id, "cleared cached adapter");
    }

    /// Probes every cached adapter with its lightweight availability check
    /// and evicts the ones that fail, so a connection that starts failing
    /// (credentials rotated, host gone) doesn't keep serving a dead handle
    /// out of the cache forever.
    pub async fn sweep_unavailable(&self) {
        let candidates: Vec<(i64, Arc<dyn DataSourceAdapter>)> = self
            .cache
            .read()
            .await
            .iter()
            .map(|(id, adapter)| (*id, adapter.clone()))
            .collect();

        let mut dead = Vec::new();
        for (id, adapter) in candidates {
            let probe = tokio::time::timeout(
                std::time::Duration::from_secs(CONFIG.registry.probe_timeout_secs),
                adapter.is_available(),
            )
            .await;
            if !matches!(probe, Ok(true)) {
                dead.push(id);
            }
        }

        if dead.is_empty() {
            return;
        }
        let mut guard = self.cache.write().await;
        for id in &dead {
            guard.remove(id);
        }
        info!(count = dead.len(), "evicted unavailable cached adapters");
    }
}

/// Periodically sweeps the adapter cache for unavailable connections.
/// Intended to be spawned once at startup via `tokio::spawn`.
pub async fn run_registry_sweep(registry: Arc<DataSourceRegistry>) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(CONFIG.registry.eviction_sweep_secs));
    loop {
        ticker.tick().await;
        registry.sweep_unavailable().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::connection::SourceKind;
    use crate::repository::InMemoryRepository;

    fn conn(id: i64, owner: &str) -> Connection {
        Connection {
            id,
            owner_id: owner.to_string(),
            name: format!("conn-{id}"),
            kind: SourceKind::Sqlite,
            host: None,
            port: None,
            database: None,
            username: None,
            password: None,
            detail: serde_json::json!({"file_path": ":memory:"}),
        }
    }

    #[tokio::test]
    async fn adapter_creation_is_cached_and_idempotent() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.insert_connection(conn(1, "alice")).await;
        let registry = DataSourceRegistry::new(repo.clone());

        let c = conn(1, "alice");
        let a1 = registry.get_data_source(&c).await;
        let a2 = registry.get_data_source(&c).await;
        assert!(Arc::ptr_eq(&a1, &a2));
    }

    #[tokio::test]
    async fn ownership_mismatch_yields_none() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.insert_connection(conn(1, "alice")).await;
        let registry = DataSourceRegistry::new(repo);

        let result = registry.get_data_source_by_connection_id(1, "mallory").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn clear_cache_evicts_entry() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.insert_connection(conn(1, "alice")).await;
        let registry = DataSourceRegistry::new(repo);

        let c = conn(1, "alice");
        let a1 = registry.get_data_source(&c).await;
        registry.clear_cache(1).await;
        let a2 = registry.get_data_source(&c).await;
        assert!(!Arc::ptr_eq(&a1, &a2));
    }
}
