// src/model/connection.rs

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Discriminator stored in a connection record's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceKind {
    Postgresql,
    Mysql,
    Sqlite,
    Supabase,
    Starrocks,
    Clickhouse,
    Snowflake,
    Mongodb,
    Redis,
    Elasticsearch,
    Bigquery,
    Mcp,
}

impl SourceKind {
    /// True for every kind handled by the relational adapter.
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            SourceKind::Postgresql
                | SourceKind::Mysql
                | SourceKind::Sqlite
                | SourceKind::Supabase
                | SourceKind::Starrocks
                | SourceKind::Clickhouse
                | SourceKind::Snowflake
                | SourceKind::Bigquery
        )
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "POSTGRESQL" => Ok(SourceKind::Postgresql),
            "MYSQL" => Ok(SourceKind::Mysql),
            "SQLITE" => Ok(SourceKind::Sqlite),
            "SUPABASE" => Ok(SourceKind::Supabase),
            "STARROCKS" => Ok(SourceKind::Starrocks),
            "CLICKHOUSE" => Ok(SourceKind::Clickhouse),
            "SNOWFLAKE" => Ok(SourceKind::Snowflake),
            "MONGODB" => Ok(SourceKind::Mongodb),
            "REDIS" => Ok(SourceKind::Redis),
            "ELASTICSEARCH" => Ok(SourceKind::Elasticsearch),
            "BIGQUERY" => Ok(SourceKind::Bigquery),
            "MCP" => Ok(SourceKind::Mcp),
            other => Err(other.to_string()),
        }
    }
}

/// A connection record as read from the external repository. The core never
/// persists this; it is read by `(connection_id, owner_id)` and mismatches
/// are refused by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: i64,
    pub owner_id: String,
    pub name: String,
    pub kind: SourceKind,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Kind-specific settings: SQLite file path, MongoDB auth source, ES
    /// scheme, MCP transport, bearer token, etc.
    pub detail: serde_json::Value,
}

impl Connection {
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.detail.get(key).and_then(|v| v.as_str())
    }
}
