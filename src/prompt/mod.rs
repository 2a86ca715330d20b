// src/prompt/mod.rs
// Turns available schemas, conversation history and the user's message into
// the three prompt shapes the orchestrator needs — the decision prompt, the
// analysis prompt and the dashboard prompt.
//
// Follows the static/dynamic section split the prompt package already used:
// instructions and format rules are stable across calls, schema and history
// content varies per request.

use crate::llm::AiRequest;
use crate::model::schema::SchemaPayload;
use crate::model::SourceSchema;

const DECISION_INSTRUCTIONS: &str = r#"You are a data analysis assistant. You help users query their connected
data sources by deciding, for each user message, one of three outcomes:

- CLARIFICATION_NEEDED: the request is ambiguous or underspecified; ask exactly one
  focused question and optionally suggest options.
- READY_TO_EXECUTE: the request can be answered by running one or more data
  requests against the sources below; produce a step-ordered plan.
- DIRECT_ANSWER: the request needs no data access (greeting, general question,
  or a question already answered by the conversation history).

Respond with a single JSON object and nothing else, no markdown fences, matching:

{
  "responseType": "CLARIFICATION_NEEDED" | "READY_TO_EXECUTE" | "DIRECT_ANSWER",
  "message": string,
  "intent": string?,
  "clarificationQuestion": string?,
  "suggestedOptions": string[]?,
  "dataRequests": [
    {
      "kind": "SQL_QUERY" | "MONGO_QUERY" | "ES_QUERY" | "MCP_TOOL_CALL" | "MCP_RESOURCE_READ",
      "sourceId": number,
      "step": number,
      "dependsOn": number?,
      "outputAs": string?,
      "outputField": string?,
      "description": string?,
      "explanation": string?,
      "sql": string?,
      "collection": string?,
      "operation": "find" | "count" | "aggregate",
      "filter": object?,
      "limit": number?,
      "index": string?,
      "query": object?,
      "size": number?,
      "toolName": string?,
      "arguments": object?,
      "uri": string?
    }
  ]?
}

Rules for dataRequests:
- Only SQL is permitted for SQL_QUERY; it must be a read-only SELECT or WITH...SELECT statement.
- step values must start at 1 and be contiguous.
- dependsOn, if present, must reference a smaller step.
- outputAs, if present, must match ^\$[A-Za-z_][A-Za-z0-9_]*$ and be unique across the plan.
- a placeholder $x may only be used in a step's sql if some ancestor step (through dependsOn)
  declares outputAs = $x.
- never invent a sourceId that is not listed below.
"#;

fn render_schema(schema: &SourceSchema) -> String {
    let mut out = format!("Source #{} \"{}\" ({:?}):\n", schema.source_id, schema.source_name, schema.source_kind);
    match &schema.payload {
        SchemaPayload::Relational { tables } => {
            for table in tables {
                let columns: Vec<String> = table
                    .columns
                    .iter()
                    .map(|c| format!("{} {}{}", c.name, c.data_type, if c.primary_key { " (pk)" } else { "" }))
                    .collect();
                out.push_str(&format!("  table {}: {}\n", table.name, columns.join(", ")));
            }
        }
        SchemaPayload::Document { collections } => {
            for collection in collections {
                let fields: Vec<String> = collection.fields.iter().map(|f| format!("{}: {}", f.name, f.field_type)).collect();
                out.push_str(&format!(
                    "  collection {} (~{} docs): {}\n",
                    collection.name, collection.approx_count, fields.join(", ")
                ));
            }
        }
        SchemaPayload::SearchIndex { indices } => {
            for index in indices {
                let fields: Vec<String> = index.fields.iter().map(|f| format!("{}: {}", f.name, f.field_type)).collect();
                out.push_str(&format!(
                    "  index {} (~{} docs): {}\n",
                    index.name, index.approx_count, fields.join(", ")
                ));
            }
        }
        SchemaPayload::ToolResource { tools, resources } => {
            for tool in tools {
                out.push_str(&format!("  tool {}: {}\n", tool.name, tool.description));
            }
            for resource in resources {
                out.push_str(&format!("  resource {}: {}\n", resource.uri, resource.name));
            }
        }
    }
    out
}

/// Builds the decision prompt: static instructions followed by the dynamic
/// schema catalogue. The conversation history and user message are sent as
/// separate chat turns by the provider, not embedded here.
pub fn build_decision_prompt(request: &AiRequest) -> String {
    let mut prompt = String::new();
    prompt.push_str(DECISION_INSTRUCTIONS);
    prompt.push_str("\n--- AVAILABLE SOURCES ---\n\n");
    if request.available_schemas.is_empty() {
        prompt.push_str("(no data sources are connected)\n");
    } else {
        for schema in &request.available_schemas {
            prompt.push_str(&render_schema(schema));
        }
    }
    prompt
}

const ANALYSIS_INSTRUCTIONS: &str = r#"You previously asked for data to answer the user's question. The results
are summarised below (structural profile, not the raw sensitive data). Write a
concise natural-language answer to the user's original question, referencing
the figures from the summary. Respond with a single JSON object:

{ "responseType": "DIRECT_ANSWER", "message": string }
"#;

/// Builds the analysis prompt: the user's original question plus the
/// structural summary of executed query results (never the embeddable raw
/// dataset — that payload is attached separately for charting, not for the
/// model to read).
pub fn build_analysis_prompt(user_message: &str, structural_summary: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str(ANALYSIS_INSTRUCTIONS);
    prompt.push_str("\n--- USER QUESTION ---\n");
    prompt.push_str(user_message);
    prompt.push_str("\n\n--- RESULT SUMMARY ---\n");
    prompt.push_str(structural_summary);
    prompt
}

const DASHBOARD_INSTRUCTIONS: &str = r#"Given the result summary below, suggest a single visualization for a
dashboard. Respond with a single JSON object:

{ "responseType": "DIRECT_ANSWER", "message": string }

where `message` is a short recommendation naming a chart type (bar, line, pie,
table, or single-value) and which columns to plot. Do not invent columns that
are not in the summary.
"#;

/// Builds the dashboard-suggestion prompt from the same structural summary
/// used for the analysis phase.
pub fn build_dashboard_prompt(structural_summary: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str(DASHBOARD_INSTRUCTIONS);
    prompt.push_str("\n--- RESULT SUMMARY ---\n");
    prompt.push_str(structural_summary);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_prompt_lists_no_sources_explicitly() {
        let request = AiRequest {
            user_message: "hi".to_string(),
            available_schemas: vec![],
            conversation_history: vec![],
            user_id: "u1".to_string(),
            conversation_id: 1,
            first_message: true,
            raw_prompt: None,
        };
        let prompt = build_decision_prompt(&request);
        assert!(prompt.contains("no data sources are connected"));
    }

    #[test]
    fn analysis_prompt_embeds_question_and_summary() {
        let prompt = build_analysis_prompt("how many users?", "row_count: 42");
        assert!(prompt.contains("how many users?"));
        assert!(prompt.contains("row_count: 42"));
    }
}
