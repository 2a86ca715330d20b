// src/model/result.rs

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub elapsed_ms: u64,
    pub error_message: Option<String>,
}

impl ExecutionResult {
    pub fn ok(
        rows: Vec<serde_json::Map<String, serde_json::Value>>,
        columns: Vec<String>,
        elapsed_ms: u64,
    ) -> Self {
        let row_count = rows.len();
        Self {
            success: true,
            rows,
            columns,
            row_count,
            elapsed_ms,
            error_message: None,
        }
    }

    pub fn error(message: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            rows: Vec::new(),
            columns: Vec::new(),
            row_count: 0,
            elapsed_ms,
            error_message: Some(message.into()),
        }
    }

    pub fn count(n: i64, elapsed_ms: u64) -> Self {
        let mut row = serde_json::Map::new();
        row.insert("count".to_string(), serde_json::json!(n));
        Self::ok(vec![row], vec!["count".to_string()], elapsed_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(flatten)]
    pub execution: ExecutionResult,
    pub connection_id: i64,
    pub connection_name: String,
    pub explanation: Option<String>,
}

impl QueryResult {
    pub fn from_execution(
        execution: ExecutionResult,
        connection_id: i64,
        connection_name: impl Into<String>,
        explanation: Option<String>,
    ) -> Self {
        Self {
            execution,
            connection_id,
            connection_name: connection_name.into(),
            explanation,
        }
    }

    pub fn error(
        connection_id: i64,
        connection_name: impl Into<String>,
        message: impl Into<String>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            execution: ExecutionResult::error(message, elapsed_ms),
            connection_id,
            connection_name: connection_name.into(),
            explanation: None,
        }
    }
}
