// src/adapters/mcp.rs
// MCP (JSON-RPC 2.0) Data Source Adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use super::DataSourceAdapter;
use crate::config::CONFIG;
use crate::error::sanitize_error;
use crate::model::request::{DataRequest, DataRequestKind};
use crate::model::schema::{McpResourceSchema, McpToolSchema, SchemaPayload};
use crate::model::{Connection, ExecutionResult, SourceKind, SourceSchema};

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    id: i64,
    method: String,
    params: Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    id: Option<Value>,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

pub struct McpAdapter {
    conn: Connection,
    next_id: AtomicI64,
}

impl McpAdapter {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            next_id: AtomicI64::new(1),
        }
    }

    fn url(&self) -> &str {
        self.conn.host.as_deref().unwrap_or("")
    }

    fn bearer_token(&self) -> Option<&str> {
        self.conn
            .detail_str("bearer_token")
            .or(self.conn.password.as_deref())
    }

    async fn call(&self, method: &str, params: Value) -> anyhow::Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method: method.to_string(),
            params,
        };

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONFIG.execution.mcp_connect_timeout_secs))
            .timeout(Duration::from_secs(CONFIG.execution.mcp_request_timeout_secs))
            .build()?;

        let mut request = client.post(self.url()).json(&body);
        if let Some(token) = self.bearer_token() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let rpc_response: JsonRpcResponse = response.json().await?;

        if let Some(error) = rpc_response.error {
            anyhow::bail!("MCP error {}: {}", error.code, error.message);
        }
        rpc_response
            .result
            .ok_or_else(|| anyhow::anyhow!("MCP response had neither result nor error"))
    }
}

#[async_trait]
impl DataSourceAdapter for McpAdapter {
    fn id(&self) -> i64 {
        self.conn.id
    }

    fn name(&self) -> &str {
        &self.conn.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Mcp
    }

    async fn is_available(&self) -> bool {
        self.call("tools/list", Value::Object(Map::new())).await.is_ok()
    }

    async fn extract_schema(&self) -> anyhow::Result<SourceSchema> {
        let tools_result = self.call("tools/list", Value::Object(Map::new())).await?;
        let tools = tools_result
            .get("tools")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|t| McpToolSchema {
                name: t.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                description: t
                    .get("description")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                input_schema: t.get("inputSchema").cloned().unwrap_or(Value::Null),
            })
            .collect();

        let resources_result = self.call("resources/list", Value::Object(Map::new())).await?;
        let resources = resources_result
            .get("resources")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|r| McpResourceSchema {
                uri: r.get("uri").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                name: r.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                description: r.get("description").and_then(|v| v.as_str()).map(|s| s.to_string()),
                mime_type: r.get("mimeType").and_then(|v| v.as_str()).map(|s| s.to_string()),
            })
            .collect();

        Ok(SourceSchema {
            source_id: self.conn.id,
            source_name: self.conn.name.clone(),
            source_kind: SourceKind::Mcp,
            payload: SchemaPayload::ToolResource { tools, resources },
        })
    }

    async fn execute(&self, request: &DataRequest) -> ExecutionResult {
        let start = Instant::now();
        let result = match &request.kind {
            DataRequestKind::McpToolCall { tool_name, arguments } => {
                let params = serde_json::json!({ "name": tool_name, "arguments": arguments });
                self.call("tools/call", params).await
            }
            DataRequestKind::McpResourceRead { uri } => {
                let params = serde_json::json!({ "uri": uri });
                self.call("resources/read", params).await
            }
            _ => {
                return ExecutionResult::error(
                    "MCP adapter received a request kind it does not handle",
                    elapsed_ms(start),
                )
            }
        };

        match result {
            Ok(value) => {
                let mut row = Map::new();
                row.insert("result".to_string(), value);
                ExecutionResult::ok(vec![row], vec!["result".to_string()], elapsed_ms(start))
            }
            Err(e) => ExecutionResult::error(sanitize_error(&e.to_string()), elapsed_ms(start)),
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
