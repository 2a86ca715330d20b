// src/llm/stream.rs
// Shared SSE (Server-Sent Events) chunk parsing for streaming chat calls.

use futures::StreamExt;
use serde_json::Value;

use super::ChunkSink;

/// Consumes an SSE byte stream from `response`, extracting a text delta from
/// each `data: {...}` line via `extract_delta`, forwarding non-empty deltas
/// to `chunks`, and returning the concatenated full text. Stops at a
/// `data: [DONE]` sentinel or when the stream ends.
pub async fn consume_sse(
    response: reqwest::Response,
    chunks: &ChunkSink,
    extract_delta: impl Fn(&Value) -> Option<String>,
) -> anyhow::Result<String> {
    let mut byte_stream = response.bytes_stream();
    let mut full_text = String::new();
    let mut carry = String::new();

    while let Some(chunk) = byte_stream.next().await {
        let bytes = chunk?;
        carry.push_str(&String::from_utf8_lossy(&bytes));

        while let Some(newline_pos) = carry.find('\n') {
            let line = carry[..newline_pos].trim_end_matches('\r').to_string();
            carry.drain(..=newline_pos);

            let Some(payload) = line.strip_prefix("data:") else {
                continue;
            };
            let payload = payload.trim();
            if payload.is_empty() {
                continue;
            }
            if payload == "[DONE]" {
                return Ok(full_text);
            }

            let Ok(json) = serde_json::from_str::<Value>(payload) else {
                continue;
            };
            if let Some(delta) = extract_delta(&json) {
                if !delta.is_empty() {
                    full_text.push_str(&delta);
                    let _ = chunks.send(delta).await;
                }
            }
        }
    }

    Ok(full_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_delta_shape() {
        let value = json!({"choices": [{"delta": {"content": "hi"}}]});
        let delta = value["choices"][0]["delta"]["content"].as_str().map(|s| s.to_string());
        assert_eq!(delta, Some("hi".to_string()));
    }
}
