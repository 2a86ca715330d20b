// src/llm/eren.rs
// Eren provider: a custom OpenAI-compatible chat gateway reached at a
// user-configured URL, distinguished from `openai.rs` only by endpoint
// shape and header name.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use super::parsing::parse_ai_response;
use super::stream::consume_sse;
use super::{AiProvider, AiRequest, AiResponse, ChunkSink};
use crate::config::ai::ProviderConfig;
use crate::config::CONFIG;
use crate::prompt::build_decision_prompt;

pub struct ErenProvider {
    config: ProviderConfig,
}

impl ErenProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }

    fn messages(&self, request: &AiRequest) -> Value {
        let mut messages = Vec::new();
        let system_prompt = request
            .raw_prompt
            .clone()
            .unwrap_or_else(|| build_decision_prompt(request));
        messages.push(json!({"role": "system", "content": system_prompt}));
        for turn in &request.conversation_history {
            messages.push(json!({"role": turn.role, "content": turn.content}));
        }
        messages.push(json!({"role": "user", "content": request.user_message}));
        Value::Array(messages)
    }
}

#[async_trait]
impl AiProvider for ErenProvider {
    fn name(&self) -> &'static str {
        "eren"
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn chat(&self, request: &AiRequest) -> AiResponse {
        let body = json!({
            "model": self.config.model,
            "messages": self.messages(request),
            "stream": false,
        });

        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(CONFIG.execution.llm_timeout_secs))
            .build()
        {
            Ok(c) => c,
            Err(e) => return AiResponse::direct_answer(format!("eren client error: {e}")),
        };

        let response = client
            .post(&self.config.url)
            .header("x-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await;

        let text = match response {
            Ok(resp) => match resp.json::<Value>().await {
                Ok(json) => json["choices"][0]["message"]["content"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
                Err(e) => return AiResponse::direct_answer(format!("eren response error: {e}")),
            },
            Err(e) => return AiResponse::direct_answer(format!("eren request failed: {e}")),
        };

        parse_ai_response(&text)
    }

    async fn stream_chat(&self, request: &AiRequest, chunks: ChunkSink) -> AiResponse {
        let body = json!({
            "model": self.config.model,
            "messages": self.messages(request),
            "stream": true,
        });

        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(CONFIG.execution.llm_stream_timeout_secs))
            .build()
        {
            Ok(c) => c,
            Err(e) => return AiResponse::direct_answer(format!("eren client error: {e}")),
        };

        let response = client
            .post(&self.config.url)
            .header("x-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => return AiResponse::direct_answer(format!("eren request failed: {e}")),
        };

        let full_text = consume_sse(response, &chunks, |json| {
            json["choices"][0]["delta"]["content"].as_str().map(|s| s.to_string())
        })
        .await
        .unwrap_or_default();

        parse_ai_response(&full_text)
    }
}
