// src/llm/gemini.rs
// Google Generative Language API (Gemini) provider.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use super::parsing::parse_ai_response;
use super::stream::consume_sse;
use super::{AiProvider, AiRequest, AiResponse, ChunkSink};
use crate::config::ai::ProviderConfig;
use crate::config::CONFIG;
use crate::prompt::build_decision_prompt;

pub struct GeminiProvider {
    config: ProviderConfig,
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }

    fn contents(&self, request: &AiRequest) -> Value {
        let mut contents = Vec::new();
        for turn in &request.conversation_history {
            let role = if turn.role == "assistant" { "model" } else { "user" };
            contents.push(json!({"role": role, "parts": [{"text": turn.content}]}));
        }
        contents.push(json!({"role": "user", "parts": [{"text": request.user_message}]}));
        Value::Array(contents)
    }

    fn system_instruction(&self, request: &AiRequest) -> Value {
        let prompt = request.raw_prompt.clone().unwrap_or_else(|| build_decision_prompt(request));
        json!({"parts": [{"text": prompt}]})
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.config.url.trim_end_matches('/'),
            self.config.model,
            self.config.api_key,
        )
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.config.url.trim_end_matches('/'),
            self.config.model,
            self.config.api_key,
        )
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn chat(&self, request: &AiRequest) -> AiResponse {
        let body = json!({
            "contents": self.contents(request),
            "systemInstruction": self.system_instruction(request),
        });

        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(CONFIG.execution.llm_timeout_secs))
            .build()
        {
            Ok(c) => c,
            Err(e) => return AiResponse::direct_answer(format!("gemini client error: {e}")),
        };

        let response = client.post(self.generate_url()).json(&body).send().await;

        let text = match response {
            Ok(resp) => match resp.json::<Value>().await {
                Ok(json) => json["candidates"][0]["content"]["parts"][0]["text"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
                Err(e) => return AiResponse::direct_answer(format!("gemini response error: {e}")),
            },
            Err(e) => return AiResponse::direct_answer(format!("gemini request failed: {e}")),
        };

        parse_ai_response(&text)
    }

    async fn stream_chat(&self, request: &AiRequest, chunks: ChunkSink) -> AiResponse {
        let body = json!({
            "contents": self.contents(request),
            "systemInstruction": self.system_instruction(request),
        });

        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(CONFIG.execution.llm_stream_timeout_secs))
            .build()
        {
            Ok(c) => c,
            Err(e) => return AiResponse::direct_answer(format!("gemini client error: {e}")),
        };

        let response = client.post(self.stream_url()).json(&body).send().await;
        let response = match response {
            Ok(r) => r,
            Err(e) => return AiResponse::direct_answer(format!("gemini request failed: {e}")),
        };

        let full_text = consume_sse(response, &chunks, |json| {
            json["candidates"][0]["content"]["parts"][0]["text"]
                .as_str()
                .map(|s| s.to_string())
        })
        .await
        .unwrap_or_default();

        parse_ai_response(&full_text)
    }
}
