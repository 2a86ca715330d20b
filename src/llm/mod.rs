// src/llm/mod.rs
// Uniform contract over multiple remote LLM services, non-streaming and
// streaming chat, shared response parsing.

pub mod claude;
pub mod eren;
pub mod gemini;
pub mod openai;
pub mod parsing;
pub mod stream;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::request::DataRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct AiRequest {
    pub user_message: String,
    pub available_schemas: Vec<crate::model::SourceSchema>,
    pub conversation_history: Vec<HistoryTurn>,
    pub user_id: String,
    pub conversation_id: i64,
    pub first_message: bool,
    /// When set, sent verbatim instead of letting the provider build the
    /// decision prompt from the fields above — used by the analysis and
    /// dashboard phases, which build their own prompt.
    pub raw_prompt: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AiResponseType {
    ClarificationNeeded,
    ReadyToExecute,
    DirectAnswer,
}

#[derive(Debug, Clone)]
pub struct AiResponse {
    pub response_type: AiResponseType,
    pub content: String,
    pub intent: Option<String>,
    pub clarification_question: Option<String>,
    pub suggested_options: Option<Vec<String>>,
    pub data_requests: Option<Vec<DataRequest>>,
}

impl AiResponse {
    pub fn direct_answer(content: impl Into<String>) -> Self {
        Self {
            response_type: AiResponseType::DirectAnswer,
            content: content.into(),
            intent: None,
            clarification_question: None,
            suggested_options: None,
            data_requests: None,
        }
    }
}

pub type ChunkSink = tokio::sync::mpsc::Sender<String>;

#[async_trait]
pub trait AiProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_configured(&self) -> bool;
    fn supports_clarification(&self) -> bool {
        true
    }

    async fn chat(&self, request: &AiRequest) -> AiResponse;

    /// Default falls back to `chat` and delivers the full content as one
    /// chunk — providers override this to forward text deltas as they
    /// arrive over SSE.
    async fn stream_chat(&self, request: &AiRequest, chunks: ChunkSink) -> AiResponse {
        let response = self.chat(request).await;
        let _ = chunks.send(response.content.clone()).await;
        response
    }
}
