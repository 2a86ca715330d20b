// tests/common/mod.rs
// Shared fakes for end-to-end scenario tests: an AI provider driven by a
// scripted response queue, and a data source adapter that returns canned
// rows while recording the requests it was asked to execute.

use std::sync::Arc;

use async_trait::async_trait;
use query_orchestration_engine::llm::parsing::parse_ai_response;
use query_orchestration_engine::llm::{AiProvider, AiRequest, AiResponse};
use query_orchestration_engine::model::connection::SourceKind;
use query_orchestration_engine::model::request::DataRequest;
use query_orchestration_engine::model::{Connection, ExecutionResult, SourceSchema};
use query_orchestration_engine::adapters::DataSourceAdapter;
use query_orchestration_engine::model::schema::SchemaPayload;
use tokio::sync::Mutex;

/// One entry in a `ScriptedProvider`'s queue: either a pre-built `AiResponse`
/// handed back as-is, or raw completion text that is run through
/// `parse_ai_response` exactly as a real provider's response would be.
pub enum ScriptedItem {
    Response(AiResponse),
    RawText(String),
}

impl From<AiResponse> for ScriptedItem {
    fn from(response: AiResponse) -> Self {
        ScriptedItem::Response(response)
    }
}

/// An `AiProvider` that returns one scripted response per call, in order,
/// and records every `AiRequest` it was asked to answer so a test can
/// inspect the prompt it was actually sent (e.g. to assert on redaction).
pub struct ScriptedProvider {
    responses: Mutex<std::collections::VecDeque<ScriptedItem>>,
    pub captured: Mutex<Vec<AiRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<AiResponse>) -> Self {
        Self::new_items(responses.into_iter().map(ScriptedItem::from).collect())
    }

    /// Builds a provider whose queue mixes pre-built responses and raw
    /// completion text parsed through the same path a real provider uses.
    pub fn new_items(items: Vec<ScriptedItem>) -> Self {
        Self {
            responses: Mutex::new(items.into()),
            captured: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AiProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn chat(&self, request: &AiRequest) -> AiResponse {
        self.captured.lock().await.push(request.clone());
        match self.responses.lock().await.pop_front() {
            Some(ScriptedItem::Response(response)) => response,
            Some(ScriptedItem::RawText(text)) => parse_ai_response(&text),
            None => AiResponse::direct_answer("no more scripted responses"),
        }
    }
}

/// A `DataSourceAdapter` returning a fixed `ExecutionResult` (or a fixed
/// schema) regardless of the request, recording every request it executed
/// so a test can assert on, e.g., a substituted Mongo filter.
pub struct FakeAdapter {
    id: i64,
    name: String,
    kind: SourceKind,
    schema: SourceSchema,
    result: ExecutionResult,
    available: bool,
    fail_schema: bool,
    pub captured: Mutex<Vec<DataRequest>>,
}

impl FakeAdapter {
    pub fn new(id: i64, name: impl Into<String>, kind: SourceKind, result: ExecutionResult) -> Self {
        let name = name.into();
        Self {
            id,
            schema: SourceSchema {
                source_id: id,
                source_name: name.clone(),
                source_kind: kind,
                payload: SchemaPayload::Document { collections: Vec::new() },
            },
            name,
            kind,
            result,
            available: true,
            fail_schema: false,
            captured: Mutex::new(Vec::new()),
        }
    }

    /// Builds an adapter whose `extract_schema` always errors, for
    /// scenarios exercising schema-extraction failure.
    pub fn new_failing_schema(id: i64, name: impl Into<String>, kind: SourceKind) -> Self {
        let mut adapter = Self::new(id, name, kind, ExecutionResult::ok(Vec::new(), Vec::new(), 0));
        adapter.fail_schema = true;
        adapter
    }
}

#[async_trait]
impl DataSourceAdapter for FakeAdapter {
    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn extract_schema(&self) -> anyhow::Result<SourceSchema> {
        if self.fail_schema {
            anyhow::bail!("schema extraction failed for {}", self.name);
        }
        Ok(self.schema.clone())
    }

    async fn execute(&self, request: &DataRequest) -> ExecutionResult {
        self.captured.lock().await.push(request.clone());
        self.result.clone()
    }
}

pub fn connection(id: i64, owner: &str, kind: SourceKind, detail: serde_json::Value) -> Connection {
    Connection {
        id,
        owner_id: owner.to_string(),
        name: format!("conn-{id}"),
        kind,
        host: None,
        port: None,
        database: None,
        username: None,
        password: None,
        detail,
    }
}

pub fn sqlite_connection(id: i64, owner: &str, path: &str) -> Connection {
    connection(id, owner, SourceKind::Sqlite, serde_json::json!({"file_path": path}))
}

static INSTALL_DRIVERS: std::sync::Once = std::sync::Once::new();

/// `sqlx::any::install_default_drivers` must run exactly once per process
/// before any `AnyPool` connects; each test binary calls this itself since
/// it doesn't go through `AppState::new`.
pub fn ensure_sql_drivers() {
    INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);
}

pub fn providers_with(name: &'static str, provider: Arc<dyn AiProvider>) -> std::collections::HashMap<&'static str, Arc<dyn AiProvider>> {
    let mut map = std::collections::HashMap::new();
    map.insert(name, provider);
    map
}

pub struct RunOutcome {
    pub activity: Vec<query_orchestration_engine::transport::ActivityMessage>,
    pub clarification: Vec<query_orchestration_engine::transport::ClarificationMessage>,
    pub response: Vec<query_orchestration_engine::model::AnalyzeResponse>,
    pub error: Vec<query_orchestration_engine::model::AnalyzeResponse>,
}

impl RunOutcome {
    pub fn phases(&self) -> Vec<String> {
        self.activity.iter().map(|a| a.phase.clone()).collect()
    }
}

/// Runs `orchestrator.handle` to completion, then drains every transport
/// channel. `handle` is awaited directly (not spawned) so every message it
/// will ever send is already queued in the bounded channels by the time
/// this returns; dropping `transport` closes the senders so the receivers'
/// drain loops terminate.
pub async fn run_request(
    orchestrator: &query_orchestration_engine::orchestrator::ChatOrchestrator,
    owner_id: &str,
    request: query_orchestration_engine::model::response::AnalyzeRequest,
) -> RunOutcome {
    let (transport, mut rx) = query_orchestration_engine::transport::UserTransport::new();
    orchestrator.handle(owner_id, &transport, request).await;
    drop(transport);

    let mut activity = Vec::new();
    while let Some(m) = rx.activity_rx.recv().await {
        activity.push(m);
    }
    let mut clarification = Vec::new();
    while let Some(m) = rx.clarification_rx.recv().await {
        clarification.push(m);
    }
    let mut response = Vec::new();
    while let Some(m) = rx.response_rx.recv().await {
        response.push(m);
    }
    let mut error = Vec::new();
    while let Some(m) = rx.error_rx.recv().await {
        error.push(m);
    }

    RunOutcome { activity, clarification, response, error }
}
