// src/config/execution.rs

use serde::{Deserialize, Serialize};

use super::helpers::env_usize;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub sql_statement_timeout_secs: u64,
    pub mcp_connect_timeout_secs: u64,
    pub mcp_request_timeout_secs: u64,
    pub llm_timeout_secs: u64,
    pub llm_stream_timeout_secs: u64,
    /// `k` in "SELECT * FROM <table> LIMIT k" sample-row fetch.
    pub sample_row_limit: u32,
    /// Default row cap for MongoDB `find` and Elasticsearch `size`.
    pub default_result_limit: u32,
}

impl ExecutionConfig {
    pub fn from_env() -> Self {
        Self {
            sql_statement_timeout_secs: env_usize("SQL_STATEMENT_TIMEOUT_SECS", 30) as u64,
            mcp_connect_timeout_secs: env_usize("MCP_CONNECT_TIMEOUT_SECS", 5) as u64,
            mcp_request_timeout_secs: env_usize("MCP_REQUEST_TIMEOUT_SECS", 60) as u64,
            llm_timeout_secs: env_usize("LLM_TIMEOUT_SECS", 60) as u64,
            llm_stream_timeout_secs: env_usize("LLM_STREAM_TIMEOUT_SECS", 120) as u64,
            sample_row_limit: env_usize("SAMPLE_ROW_LIMIT", 3) as u32,
            default_result_limit: env_usize("DEFAULT_RESULT_LIMIT", 100) as u32,
        }
    }
}
