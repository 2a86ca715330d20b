// src/adapters/unsupported.rs
// Placeholder for source kinds the spec enumerates (Redis) but defines no
// DataRequest payload variant or extraction procedure for.

use async_trait::async_trait;

use super::DataSourceAdapter;
use crate::model::request::DataRequest;
use crate::model::{Connection, ExecutionResult, SourceKind, SourceSchema};

pub struct UnsupportedAdapter {
    conn: Connection,
}

impl UnsupportedAdapter {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl DataSourceAdapter for UnsupportedAdapter {
    fn id(&self) -> i64 {
        self.conn.id
    }

    fn name(&self) -> &str {
        &self.conn.name
    }

    fn kind(&self) -> SourceKind {
        self.conn.kind
    }

    async fn is_available(&self) -> bool {
        false
    }

    async fn extract_schema(&self) -> anyhow::Result<SourceSchema> {
        anyhow::bail!(
            "no schema introspection is defined for source kind {:?}",
            self.conn.kind
        )
    }

    async fn execute(&self, _request: &DataRequest) -> ExecutionResult {
        ExecutionResult::error(
            format!("source kind {:?} has no supported request payload", self.conn.kind),
            0,
        )
    }
}
