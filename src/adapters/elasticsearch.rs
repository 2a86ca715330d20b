// src/adapters/elasticsearch.rs
// Elasticsearch Data Source Adapter.

use async_trait::async_trait;
use elasticsearch::http::transport::Transport;
use elasticsearch::{CatIndicesParts, CountParts, Elasticsearch, IndicesGetMappingParts, SearchParts};
use serde_json::{Map, Value};
use std::time::Instant;

use super::DataSourceAdapter;
use crate::config::CONFIG;
use crate::error::sanitize_error;
use crate::model::request::{DataRequest, DataRequestKind};
use crate::model::schema::{FieldSchema, IndexSchema, SchemaPayload};
use crate::model::{Connection, ExecutionResult, SourceKind, SourceSchema};
use crate::summary::redact_row;

pub struct ElasticsearchAdapter {
    conn: Connection,
}

impl ElasticsearchAdapter {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    fn url(&self) -> String {
        let scheme = self.conn.detail_str("scheme").unwrap_or("https");
        format!(
            "{scheme}://{}:{}",
            self.conn.host.as_deref().unwrap_or("localhost"),
            self.conn.port.unwrap_or(9200),
        )
    }

    fn client(&self) -> anyhow::Result<Elasticsearch> {
        let transport = Transport::single_node(&self.url())
            .map_err(|e| anyhow::anyhow!(sanitize_error(&e.to_string())))?;
        Ok(Elasticsearch::new(transport))
    }
}

#[async_trait]
impl DataSourceAdapter for ElasticsearchAdapter {
    fn id(&self) -> i64 {
        self.conn.id
    }

    fn name(&self) -> &str {
        &self.conn.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Elasticsearch
    }

    async fn is_available(&self) -> bool {
        match self.client() {
            Ok(client) => client.ping().send().await.map(|r| r.status_code().is_success()).unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn extract_schema(&self) -> anyhow::Result<SourceSchema> {
        let client = self.client()?;

        let cat_response = client
            .cat()
            .indices(CatIndicesParts::None)
            .format("json")
            .send()
            .await?;
        let cat_body: Value = cat_response.json().await?;
        let index_names: Vec<String> = cat_body
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.get("index").and_then(|v| v.as_str()))
            .filter(|name| !name.starts_with('.'))
            .map(|s| s.to_string())
            .collect();

        let mut indices = Vec::new();
        for index_name in index_names {
            let mapping_response = client
                .indices()
                .get_mapping(IndicesGetMappingParts::Index(&[&index_name]))
                .send()
                .await?;
            let mapping_body: Value = mapping_response.json().await?;
            let fields = mapping_body
                .get(&index_name)
                .and_then(|v| v.get("mappings"))
                .and_then(|v| v.get("properties"))
                .and_then(|v| v.as_object())
                .map(|props| {
                    props
                        .iter()
                        .map(|(name, def)| FieldSchema {
                            name: name.clone(),
                            field_type: compact_es_type(def.get("type").and_then(|t| t.as_str())),
                        })
                        .collect()
                })
                .unwrap_or_default();

            let count_response = client
                .count(CountParts::Index(&[&index_name]))
                .send()
                .await?;
            let approx_count = count_response
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v.get("count").and_then(|c| c.as_i64()))
                .unwrap_or(0);

            indices.push(IndexSchema {
                name: index_name,
                fields,
                approx_count,
            });
        }

        Ok(SourceSchema {
            source_id: self.conn.id,
            source_name: self.conn.name.clone(),
            source_kind: SourceKind::Elasticsearch,
            payload: SchemaPayload::SearchIndex { indices },
        })
    }

    async fn execute(&self, request: &DataRequest) -> ExecutionResult {
        let start = Instant::now();
        let DataRequestKind::EsQuery { index, query, size } = &request.kind else {
            return ExecutionResult::error(
                "Elasticsearch adapter received a non-ES_QUERY request",
                elapsed_ms(start),
            );
        };

        let client = match self.client() {
            Ok(c) => c,
            Err(e) => return ExecutionResult::error(sanitize_error(&e.to_string()), elapsed_ms(start)),
        };

        let size = size.unwrap_or(CONFIG.execution.default_result_limit);
        let body = if query.is_object() && !query.as_object().unwrap().is_empty() {
            serde_json::json!({ "query": query, "size": size })
        } else {
            serde_json::json!({ "query": { "match_all": {} }, "size": size })
        };

        let response = client
            .search(SearchParts::Index(&[index]))
            .body(body)
            .send()
            .await;

        match response {
            Ok(resp) => match resp.json::<Value>().await {
                Ok(json) => {
                    let (rows, columns) = hits_to_rows(&json);
                    ExecutionResult::ok(rows, columns, elapsed_ms(start))
                }
                Err(e) => ExecutionResult::error(sanitize_error(&e.to_string()), elapsed_ms(start)),
            },
            Err(e) => ExecutionResult::error(sanitize_error(&e.to_string()), elapsed_ms(start)),
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn hits_to_rows(response: &Value) -> (Vec<Map<String, Value>>, Vec<String>) {
    let hits = response
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(|h| h.as_array())
        .cloned()
        .unwrap_or_default();

    let mut rows = Vec::new();
    let mut columns: Vec<String> = vec!["_id".to_string(), "_index".to_string(), "_score".to_string()];
    for hit in hits {
        let mut row = Map::new();
        row.insert("_id".to_string(), hit.get("_id").cloned().unwrap_or(Value::Null));
        row.insert("_index".to_string(), hit.get("_index").cloned().unwrap_or(Value::Null));
        row.insert("_score".to_string(), hit.get("_score").cloned().unwrap_or(Value::Null));
        if let Some(source) = hit.get("_source").and_then(|s| s.as_object()) {
            for (k, v) in source {
                if !columns.contains(k) {
                    columns.push(k.clone());
                }
                row.insert(k.clone(), v.clone());
            }
        }
        redact_row(&mut row);
        rows.push(row);
    }
    (rows, columns)
}

/// Maps ES mapping property `type` variants to a compact type token.
fn compact_es_type(es_type: Option<&str>) -> String {
    match es_type {
        Some("text") => "text",
        Some("keyword") => "keyword",
        Some("long") | Some("integer") | Some("short") | Some("byte") => "long",
        Some("double") | Some("float") | Some("half_float") | Some("scaled_float") => "double",
        Some("boolean") => "boolean",
        Some("date") => "date",
        Some("object") => "object",
        Some("nested") => "nested",
        Some("geo_point") => "geo_point",
        _ => "unknown",
    }
    .to_string()
}
