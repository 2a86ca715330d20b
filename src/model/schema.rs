// src/model/schema.rs

use serde::{Deserialize, Serialize};

use super::connection::SourceKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    /// Up to `k` sample rows (k=3 by default), already redacted.
    pub sample_rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub sample_document: serde_json::Value,
    pub indexes: Vec<String>,
    pub approx_count: i64,
    pub fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSchema {
    pub name: String,
    pub fields: Vec<FieldSchema>,
    pub approx_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResourceSchema {
    pub uri: String,
    pub name: String,
    pub description: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum SchemaPayload {
    Relational { tables: Vec<TableSchema> },
    Document { collections: Vec<CollectionSchema> },
    SearchIndex { indices: Vec<IndexSchema> },
    ToolResource {
        tools: Vec<McpToolSchema>,
        resources: Vec<McpResourceSchema>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSchema {
    pub source_id: i64,
    pub source_name: String,
    pub source_kind: SourceKind,
    pub payload: SchemaPayload,
}
