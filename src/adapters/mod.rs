// src/adapters/mod.rs
// Uniform contract over SQL, document, search, and RPC-style MCP sources.
// One concrete type per source kind.

pub mod elasticsearch;
pub mod mcp;
pub mod mongo;
pub mod sql;
pub mod unsupported;

use async_trait::async_trait;

use crate::model::request::DataRequest;
use crate::model::{Connection, ExecutionResult, SourceKind, SourceSchema};

#[async_trait]
pub trait DataSourceAdapter: Send + Sync {
    fn id(&self) -> i64;
    fn name(&self) -> &str;
    fn kind(&self) -> SourceKind;

    /// Lightweight probe (`SELECT 1`, `ping`, first database name, ...).
    /// Must never throw — failures are reported as `false`.
    async fn is_available(&self) -> bool;

    async fn extract_schema(&self) -> anyhow::Result<SourceSchema>;

    async fn execute(&self, request: &DataRequest) -> ExecutionResult;
}

/// Builds the concrete adapter for a connection's kind. Fails fast with
/// `UNKNOWN_SOURCE_KIND` only at the registry layer (kind parsing), never
/// here — by this point the kind is already a valid `SourceKind`.
pub fn build_adapter(conn: &Connection) -> std::sync::Arc<dyn DataSourceAdapter> {
    if conn.kind.is_relational() {
        std::sync::Arc::new(sql::SqlAdapter::new(conn.clone()))
    } else {
        match conn.kind {
            SourceKind::Mongodb => std::sync::Arc::new(mongo::MongoAdapter::new(conn.clone())),
            SourceKind::Elasticsearch => {
                std::sync::Arc::new(elasticsearch::ElasticsearchAdapter::new(conn.clone()))
            }
            SourceKind::Mcp => std::sync::Arc::new(mcp::McpAdapter::new(conn.clone())),
            _ => std::sync::Arc::new(unsupported::UnsupportedAdapter::new(conn.clone())),
        }
    }
}
