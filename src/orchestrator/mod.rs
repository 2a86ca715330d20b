// src/orchestrator/mod.rs
// The top-level state machine binding connection resolution, schema
// introspection, the AI provider, and query execution together. Emits
// phase events, drives the clarification loop, invokes the data summariser
// and dashboard phase.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::CONFIG;
use crate::conversation::ConversationManager;
use crate::error::{sanitize_error, EngineError};
use crate::llm::parsing::{parse_ai_response, try_parse_json};
use crate::llm::{AiProvider, AiRequest, AiResponseType, HistoryTurn};
use crate::model::request::validate_plan;
use crate::model::response::{AnalyzeRequest, AnalyzeResponse};
use crate::model::SourceSchema;
use crate::plan::execute_plan;
use crate::prompt::{build_analysis_prompt, build_dashboard_prompt};
use crate::registry::DataSourceRegistry;
use crate::repository::{ConnectionRepository, DashboardRenderer};
use crate::summary::{build_embeddable_datasets, build_structural_summary, render_structural_summary};
use crate::transport::{ActivityStatus, UserTransport};

pub struct ChatOrchestrator {
    registry: Arc<DataSourceRegistry>,
    connection_repository: Arc<dyn ConnectionRepository>,
    conversation: Arc<ConversationManager>,
    providers: HashMap<&'static str, Arc<dyn AiProvider>>,
    dashboard_renderer: Option<Arc<dyn DashboardRenderer>>,
}

impl ChatOrchestrator {
    pub fn new(
        registry: Arc<DataSourceRegistry>,
        connection_repository: Arc<dyn ConnectionRepository>,
        conversation: Arc<ConversationManager>,
        providers: HashMap<&'static str, Arc<dyn AiProvider>>,
    ) -> Self {
        Self {
            registry,
            connection_repository,
            conversation,
            providers,
            dashboard_renderer: None,
        }
    }

    /// Wires a dashboard renderer in; without one, the dashboard phase still
    /// runs (chart config is produced) but nothing consumes the embeddable
    /// datasets.
    pub fn with_dashboard_renderer(mut self, renderer: Arc<dyn DashboardRenderer>) -> Self {
        self.dashboard_renderer = Some(renderer);
        self
    }

    fn select_provider(&self, requested: Option<&str>) -> Option<Arc<dyn AiProvider>> {
        if let Some(name) = requested {
            if let Some(provider) = self.providers.get(name) {
                if provider.is_configured() {
                    return Some(provider.clone());
                }
            }
        }
        let default_name = CONFIG.default_provider()?;
        self.providers.get(default_name.as_str()).cloned()
    }

    /// Entry point: runs the full flow, catching any internal failure and
    /// converting it into a final `INTERNAL_ERROR` response on the error
    /// channel rather than letting it escape.
    pub async fn handle(&self, owner_id: &str, transport: &UserTransport, request: AnalyzeRequest) {
        if let Err(message) = request.validate() {
            let response = EngineError::Validation(message).into();
            transport.error(response).await;
            return;
        }

        if let Err(e) = self.run(owner_id, transport, request).await {
            error!(error = %e, "chat orchestrator failed");
            let response: AnalyzeResponse = EngineError::InternalError(sanitize_error(&e.to_string())).into();
            transport.activity("error", ActivityStatus::Error, "internal error", None).await;
            transport.error(response).await;
        }
    }

    async fn run(&self, owner_id: &str, transport: &UserTransport, request: AnalyzeRequest) -> anyhow::Result<()> {
        // Step 1: resolve conversation id.
        let conversation_id = match request.conversation_id {
            Some(id) => id,
            None => self.conversation.create_conversation().await?,
        };
        let mut state = self.conversation.get_or_create(conversation_id).await?;
        if state.context.get("seed").is_none() {
            let seed: String = request.user_message.chars().take(50).collect();
            state.context.insert("seed".to_string(), serde_json::json!(seed));
        }

        // Step 2: persist user message, phase understanding_intent.
        transport
            .activity("understanding_intent", ActivityStatus::InProgress, "reading your message", Some(conversation_id))
            .await;
        self.conversation.add_user_message(conversation_id, request.user_message.clone()).await?;
        transport
            .activity("understanding_intent", ActivityStatus::Completed, "message received", Some(conversation_id))
            .await;

        // Step 3: resolve connections, owner-filtered.
        transport
            .activity("mapping_data_sources", ActivityStatus::InProgress, "locating data sources", Some(conversation_id))
            .await;
        let mut connections = Vec::new();
        for id in &request.connection_ids {
            match self.connection_repository.find_by_id_and_owner(*id, owner_id).await {
                Ok(Some(conn)) => connections.push(conn),
                Ok(None) => warn!(connection_id = id, "connection not found or not owned by caller"),
                Err(e) => warn!(connection_id = id, error = %e, "failed to load connection"),
            }
        }
        if connections.is_empty() {
            self.finish_error(transport, conversation_id, EngineError::NoConnections).await;
            return Ok(());
        }
        transport
            .activity("mapping_data_sources", ActivityStatus::Completed, format!("{} source(s) resolved", connections.len()), Some(conversation_id))
            .await;

        // Step 4: extract schemas, skipping per-connection failures.
        transport
            .activity("analyzing_schemas", ActivityStatus::InProgress, "reading schemas", Some(conversation_id))
            .await;
        let mut schemas: Vec<SourceSchema> = Vec::new();
        for conn in &connections {
            let adapter = self.registry.get_data_source(conn).await;
            match adapter.extract_schema().await {
                Ok(schema) => schemas.push(schema),
                Err(e) => warn!(connection_id = conn.id, error = %e, "schema extraction failed"),
            }
        }
        if schemas.is_empty() {
            self.finish_error(transport, conversation_id, EngineError::SchemaError).await;
            return Ok(());
        }
        transport
            .activity("analyzing_schemas", ActivityStatus::Completed, format!("{} schema(s) loaded", schemas.len()), Some(conversation_id))
            .await;

        // Step 5: select provider, build and send the decision prompt.
        transport
            .activity("generating_queries", ActivityStatus::InProgress, "deciding how to answer", Some(conversation_id))
            .await;
        let Some(provider) = self.select_provider(request.ai_provider.as_deref()) else {
            self.finish_error(
                transport,
                conversation_id,
                EngineError::InternalError("no AI provider is configured".to_string()),
            )
            .await;
            return Ok(());
        };

        let history: Vec<HistoryTurn> = state
            .conversation_history_snapshot
            .iter()
            .map(|m| HistoryTurn { role: m.role.clone(), content: m.content.clone() })
            .collect();

        let decision_request = AiRequest {
            user_message: request.user_message.clone(),
            available_schemas: schemas,
            conversation_history: history,
            user_id: owner_id.to_string(),
            conversation_id,
            first_message: state.conversation_history_snapshot.len() <= 1,
            raw_prompt: None,
        };

        transport
            .activity("ai_thinking", ActivityStatus::InProgress, "thinking", Some(conversation_id))
            .await;
        let decision = self.stream_with_activity(&provider, &decision_request, transport, "ai_thinking", conversation_id).await;
        transport
            .activity("generating_queries", ActivityStatus::Completed, "decision made", Some(conversation_id))
            .await;

        // Step 6: branch on response type.
        match decision.response_type {
            AiResponseType::ClarificationNeeded => {
                self.conversation
                    .update_state(conversation_id, "clarification", Some(decision.content.clone()))
                    .await?;
                transport
                    .clarification(
                        conversation_id,
                        decision.clarification_question.unwrap_or(decision.content),
                        decision.suggested_options,
                    )
                    .await;
                Ok(())
            }
            AiResponseType::DirectAnswer => {
                self.conversation
                    .update_state(conversation_id, "completed", Some(decision.content.clone()))
                    .await?;
                let response = AnalyzeResponse::success(conversation_id, decision.content, Vec::new());
                transport
                    .activity("completed", ActivityStatus::Completed, "done", Some(conversation_id))
                    .await;
                transport.response(response).await;
                Ok(())
            }
            AiResponseType::ReadyToExecute => {
                let Some(plan) = decision.data_requests else {
                    self.finish_error(
                        transport,
                        conversation_id,
                        EngineError::QueryGenerationFailed("AI returned no data requests".to_string()),
                    )
                    .await;
                    return Ok(());
                };
                if plan.is_empty() || validate_plan(&plan).is_err() {
                    self.finish_error(
                        transport,
                        conversation_id,
                        EngineError::QueryGenerationFailed("the generated plan is empty or invalid".to_string()),
                    )
                    .await;
                    return Ok(());
                }

                self.execute_and_analyze(owner_id, transport, conversation_id, &request, plan, &provider)
                    .await
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_and_analyze(
        &self,
        owner_id: &str,
        transport: &UserTransport,
        conversation_id: i64,
        request: &AnalyzeRequest,
        plan: Vec<crate::model::request::DataRequest>,
        provider: &Arc<dyn AiProvider>,
    ) -> anyhow::Result<()> {
        // Step 7: execute the plan.
        transport
            .activity("executing_queries", ActivityStatus::InProgress, "running queries", Some(conversation_id))
            .await;
        let results = execute_plan(&plan, &request.connection_ids, owner_id, self.registry.as_ref(), &self.connection_repository).await;
        for result in &results {
            let status = if result.execution.success { ActivityStatus::Completed } else { ActivityStatus::Error };
            transport
                .activity(
                    "executing_queries",
                    status,
                    format!(
                        "{}: {} row(s) in {}ms",
                        result.connection_name, result.execution.row_count, result.execution.elapsed_ms
                    ),
                    Some(conversation_id),
                )
                .await;
        }

        // Step 8: analyze successful results.
        transport
            .activity("analyzing_data", ActivityStatus::InProgress, "analyzing results", Some(conversation_id))
            .await;
        let successful: Vec<_> = results.iter().filter(|r| r.execution.success).cloned().collect();

        let (analysis_summary, suggested_visualization) = if successful.is_empty() {
            ("no data returned".to_string(), None)
        } else {
            let summaries = build_structural_summary(&successful);
            let rendered = render_structural_summary(&summaries);
            let analysis_prompt = build_analysis_prompt(&request.user_message, &rendered);

            let analysis_request = AiRequest {
                user_message: request.user_message.clone(),
                available_schemas: Vec::new(),
                conversation_history: Vec::new(),
                user_id: owner_id.to_string(),
                conversation_id,
                first_message: false,
                raw_prompt: Some(analysis_prompt),
            };
            let analysis = self.stream_with_activity(provider, &analysis_request, transport, "analyzing_data", conversation_id).await;

            // Step 9: optional dashboard suggestion from the same summary.
            transport
                .activity("generating_dashboard", ActivityStatus::InProgress, "suggesting a visualization", Some(conversation_id))
                .await;
            let dashboard_prompt = build_dashboard_prompt(&rendered);
            let dashboard_request = AiRequest {
                user_message: request.user_message.clone(),
                available_schemas: Vec::new(),
                conversation_history: Vec::new(),
                user_id: owner_id.to_string(),
                conversation_id,
                first_message: false,
                raw_prompt: Some(dashboard_prompt),
            };
            let dashboard = self
                .stream_with_activity(provider, &dashboard_request, transport, "generating_dashboard", conversation_id)
                .await;
            let chart_suggestion = try_parse_json(&dashboard.content);
            transport
                .activity("generating_dashboard", ActivityStatus::Completed, "visualization ready", Some(conversation_id))
                .await;

            let embeddable = build_embeddable_datasets(&successful);
            if let Some(renderer) = &self.dashboard_renderer {
                if let Err(e) = renderer.render(conversation_id, chart_suggestion.clone(), embeddable).await {
                    warn!(error = %e, "dashboard renderer failed");
                }
            }
            transport
                .activity("analyzing_data", ActivityStatus::Completed, "analysis ready", Some(conversation_id))
                .await;
            (analysis.content, chart_suggestion)
        };

        // Step 10: final response.
        self.conversation
            .update_state(conversation_id, "completed", Some(analysis_summary.clone()))
            .await?;
        let mut response = AnalyzeResponse::success(conversation_id, analysis_summary, results);
        response.suggested_visualization = suggested_visualization;
        transport
            .activity("preparing_response", ActivityStatus::Completed, "sending response", Some(conversation_id))
            .await;
        transport
            .activity("completed", ActivityStatus::Completed, "done", Some(conversation_id))
            .await;
        transport.response(response).await;
        Ok(())
    }

    /// Calls `stream_chat`, forwarding each chunk as an in-progress activity
    /// event on `phase`, then returns the fully parsed response. The forward
    /// loop runs on the calling task, preserving the ordering guarantee that
    /// chunk delivery happens from the task owning the orchestration, not a
    /// separate I/O worker.
    async fn stream_with_activity(
        &self,
        provider: &Arc<dyn AiProvider>,
        request: &AiRequest,
        transport: &UserTransport,
        phase: &str,
        conversation_id: i64,
    ) -> crate::llm::AiResponse {
        let (chunk_tx, mut chunk_rx) = tokio::sync::mpsc::channel(32);
        let provider = provider.clone();
        let request = request.clone();

        let stream_task = tokio::spawn(async move { provider.stream_chat(&request, chunk_tx).await });

        while let Some(chunk) = chunk_rx.recv().await {
            transport.activity(phase, ActivityStatus::InProgress, chunk, Some(conversation_id)).await;
        }

        match stream_task.await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "provider task panicked");
                parse_ai_response("")
            }
        }
    }

    async fn finish_error(&self, transport: &UserTransport, conversation_id: i64, error: EngineError) {
        let response: AnalyzeResponse = (&error).into();
        let response = response.with_conversation_id(conversation_id);
        transport
            .activity(error.code().to_ascii_lowercase().as_str(), ActivityStatus::Error, error.to_string(), Some(conversation_id))
            .await;
        info!(code = error.code(), "orchestration finished with error");
        transport.error(response).await;
    }
}
