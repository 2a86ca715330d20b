// src/model/response.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::result::QueryResult;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub user_message: String,
    pub conversation_id: Option<i64>,
    pub connection_ids: Vec<i64>,
    pub ai_provider: Option<String>,
    #[serde(default)]
    pub is_clarification_response: bool,
    pub clarification_answer: Option<String>,
}

impl AnalyzeRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.user_message.trim().is_empty() {
            return Err("userMessage must not be blank".to_string());
        }
        if self.connection_ids.is_empty() {
            return Err("connectionIds must contain at least one id".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub success: bool,
    pub conversation_id: i64,
    pub summary: String,
    pub query_results: Vec<QueryResult>,
    pub suggested_visualization: Option<serde_json::Value>,
    pub error: Option<ErrorInfo>,
    pub timestamp: DateTime<Utc>,
}

impl AnalyzeResponse {
    pub fn success(conversation_id: i64, summary: impl Into<String>, query_results: Vec<QueryResult>) -> Self {
        Self {
            success: true,
            conversation_id,
            summary: summary.into(),
            query_results,
            suggested_visualization: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            success: false,
            conversation_id: 0,
            summary: String::new(),
            query_results: Vec::new(),
            suggested_visualization: None,
            error: Some(ErrorInfo {
                code: code.into(),
                message: message.into(),
                suggestion: suggestion.into(),
            }),
            timestamp: Utc::now(),
        }
    }

    pub fn with_conversation_id(mut self, conversation_id: i64) -> Self {
        self.conversation_id = conversation_id;
        self
    }
}
