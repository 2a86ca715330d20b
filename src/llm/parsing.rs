// src/llm/parsing.rs
// Shared response parsing: every provider receives back a single text blob
// and this module turns it into a structured AiResponse the same way
// regardless of which provider produced it.

use serde::Deserialize;
use serde_json::Value;

use super::{AiResponse, AiResponseType};
use crate::model::request::DataRequest;

#[derive(Deserialize)]
struct RawAiResponse {
    #[serde(rename = "responseType")]
    response_type: Option<String>,
    message: Option<String>,
    intent: Option<String>,
    #[serde(rename = "clarificationQuestion")]
    clarification_question: Option<String>,
    #[serde(rename = "suggestedOptions")]
    suggested_options: Option<Vec<String>>,
    #[serde(rename = "dataRequests")]
    data_requests: Option<Vec<DataRequest>>,
}

/// Strips a leading/trailing markdown code fence (` ```json ... ``` ` or
/// ` ``` ... ``` `) if present.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\r', '\n']);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Extracts the substring spanning the first `{` and the last `}`, which
/// tolerates providers that wrap JSON in prose despite being asked not to.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Parses a raw model completion into an `AiResponse`. Any failure to find
/// or parse a JSON object, or an unrecognized `responseType`, falls back to
/// `DIRECT_ANSWER` carrying the raw text verbatim — the contract never
/// errors out on a malformed completion.
pub fn parse_ai_response(raw_text: &str) -> AiResponse {
    let candidate = strip_code_fence(raw_text);
    let json_slice = extract_json_object(candidate).unwrap_or(candidate);

    let parsed: Option<RawAiResponse> = serde_json::from_str(json_slice).ok();
    let Some(parsed) = parsed else {
        return AiResponse::direct_answer(raw_text.trim());
    };

    let response_type = match parsed.response_type.as_deref() {
        Some("CLARIFICATION_NEEDED") => AiResponseType::ClarificationNeeded,
        Some("READY_TO_EXECUTE") => AiResponseType::ReadyToExecute,
        Some("DIRECT_ANSWER") => AiResponseType::DirectAnswer,
        _ => AiResponseType::DirectAnswer,
    };

    let content = parsed
        .message
        .or_else(|| parsed.clarification_question.clone())
        .unwrap_or_else(|| raw_text.trim().to_string());

    AiResponse {
        response_type,
        content,
        intent: parsed.intent,
        clarification_question: parsed.clarification_question,
        suggested_options: parsed.suggested_options,
        data_requests: parsed.data_requests,
    }
}

/// Parses a partial JSON value without the full response conversion — used
/// by the dashboard phase to read the chart-config JSON a provider returns.
pub fn try_parse_json(raw_text: &str) -> Option<Value> {
    let candidate = strip_code_fence(raw_text);
    let json_slice = extract_json_object(candidate)?;
    serde_json::from_str(json_slice).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let text = r#"{"responseType":"DIRECT_ANSWER","message":"hello"}"#;
        let response = parse_ai_response(text);
        assert_eq!(response.response_type, AiResponseType::DirectAnswer);
        assert_eq!(response.content, "hello");
    }

    #[test]
    fn strips_markdown_code_fence() {
        let text = "```json\n{\"responseType\":\"READY_TO_EXECUTE\",\"message\":\"ok\"}\n```";
        let response = parse_ai_response(text);
        assert_eq!(response.response_type, AiResponseType::ReadyToExecute);
    }

    #[test]
    fn tolerates_surrounding_prose() {
        let text = "Sure, here you go:\n{\"responseType\":\"DIRECT_ANSWER\",\"message\":\"42\"}\nHope that helps!";
        let response = parse_ai_response(text);
        assert_eq!(response.content, "42");
    }

    #[test]
    fn falls_back_to_direct_answer_on_unparseable_text() {
        let response = parse_ai_response("not json at all");
        assert_eq!(response.response_type, AiResponseType::DirectAnswer);
        assert_eq!(response.content, "not json at all");
    }

    #[test]
    fn falls_back_to_direct_answer_on_unknown_type() {
        let text = r#"{"responseType":"SOMETHING_ELSE","message":"x"}"#;
        let response = parse_ai_response(text);
        assert_eq!(response.response_type, AiResponseType::DirectAnswer);
    }
}
