// src/llm/claude.rs
// Anthropic Messages API provider.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use super::parsing::parse_ai_response;
use super::stream::consume_sse;
use super::{AiProvider, AiRequest, AiResponse, ChunkSink};
use crate::config::ai::ProviderConfig;
use crate::config::CONFIG;
use crate::prompt::build_decision_prompt;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct ClaudeProvider {
    config: ProviderConfig,
}

impl ClaudeProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }

    fn messages(&self, request: &AiRequest) -> Value {
        let mut messages = Vec::new();
        for turn in &request.conversation_history {
            messages.push(json!({"role": turn.role, "content": turn.content}));
        }
        messages.push(json!({"role": "user", "content": request.user_message}));
        Value::Array(messages)
    }

    fn system_prompt(&self, request: &AiRequest) -> String {
        request.raw_prompt.clone().unwrap_or_else(|| build_decision_prompt(request))
    }
}

#[async_trait]
impl AiProvider for ClaudeProvider {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn chat(&self, request: &AiRequest) -> AiResponse {
        let body = json!({
            "model": self.config.model,
            "max_tokens": 4096,
            "system": self.system_prompt(request),
            "messages": self.messages(request),
            "stream": false,
        });

        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(CONFIG.execution.llm_timeout_secs))
            .build()
        {
            Ok(c) => c,
            Err(e) => return AiResponse::direct_answer(format!("claude client error: {e}")),
        };

        let response = client
            .post(&self.config.url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await;

        let text = match response {
            Ok(resp) => match resp.json::<Value>().await {
                Ok(json) => json["content"][0]["text"].as_str().unwrap_or_default().to_string(),
                Err(e) => return AiResponse::direct_answer(format!("claude response error: {e}")),
            },
            Err(e) => return AiResponse::direct_answer(format!("claude request failed: {e}")),
        };

        parse_ai_response(&text)
    }

    async fn stream_chat(&self, request: &AiRequest, chunks: ChunkSink) -> AiResponse {
        let body = json!({
            "model": self.config.model,
            "max_tokens": 4096,
            "system": self.system_prompt(request),
            "messages": self.messages(request),
            "stream": true,
        });

        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(CONFIG.execution.llm_stream_timeout_secs))
            .build()
        {
            Ok(c) => c,
            Err(e) => return AiResponse::direct_answer(format!("claude client error: {e}")),
        };

        let response = client
            .post(&self.config.url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => return AiResponse::direct_answer(format!("claude request failed: {e}")),
        };

        // Anthropic's stream emits `content_block_delta` events whose `delta.text`
        // carries the text fragment; other event types are ignored by returning None.
        let full_text = consume_sse(response, &chunks, |json| {
            if json.get("type").and_then(|t| t.as_str()) != Some("content_block_delta") {
                return None;
            }
            json["delta"]["text"].as_str().map(|s| s.to_string())
        })
        .await
        .unwrap_or_default();

        parse_ai_response(&full_text)
    }
}
