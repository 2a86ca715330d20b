// src/plan/mod.rs
// Orders requests by step, resolves $variable placeholders from prior
// results, routes each step to the correct adapter, times execution,
// aggregates per-request errors without aborting the plan.

mod substitution;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::warn;

pub use substitution::{replace_variables, substitute_json};

use crate::error::EngineError;
use crate::model::request::DataRequest;
use crate::model::{Connection, QueryResult};
use crate::registry::DataSourceRegistry;
use crate::repository::ConnectionRepository;

/// Resolves which connection a request targets. `sourceId` must name a
/// connection the caller actually supplied; with no `sourceId`, a single
/// supplied connection is unambiguous, but two or more is refused rather
/// than silently guessing "the first one".
fn resolve_connection_id(source_id: Option<&str>, connection_ids: &[i64]) -> Result<i64, EngineError> {
    match source_id {
        Some(raw) => {
            let parsed: i64 = raw
                .parse()
                .map_err(|_| EngineError::Validation(format!("sourceId '{raw}' is not an integer")))?;
            if connection_ids.contains(&parsed) {
                Ok(parsed)
            } else {
                Err(EngineError::Validation(format!(
                    "sourceId {parsed} is not among the supplied connectionIds"
                )))
            }
        }
        None => match connection_ids {
            [single] => Ok(*single),
            _ => Err(EngineError::AmbiguousConnection),
        },
    }
}

async fn authorize_and_load(
    repository: &Arc<dyn ConnectionRepository>,
    connection_id: i64,
    owner_id: &str,
) -> Result<Connection, EngineError> {
    repository
        .find_by_id_and_owner(connection_id, owner_id)
        .await
        .map_err(|e| EngineError::ConnectionError(e.to_string()))?
        .ok_or(EngineError::NoConnections)
}

async fn run_one(
    request: &DataRequest,
    registry: &DataSourceRegistry,
    repository: &Arc<dyn ConnectionRepository>,
    connection_ids: &[i64],
    owner_id: &str,
) -> QueryResult {
    let start = Instant::now();

    let connection_id = match resolve_connection_id(request.source_id.as_deref(), connection_ids) {
        Ok(id) => id,
        Err(e) => return QueryResult::error(0, "unresolved", e.to_string(), elapsed_ms(start)),
    };

    let conn = match authorize_and_load(repository, connection_id, owner_id).await {
        Ok(c) => c,
        Err(e) => return QueryResult::error(connection_id, "unknown", e.to_string(), elapsed_ms(start)),
    };

    let adapter = registry.get_data_source(&conn).await;
    if !adapter.is_available().await {
        return QueryResult::error(
            conn.id,
            conn.name.clone(),
            "data source is currently unavailable",
            elapsed_ms(start),
        );
    }

    let execution = adapter.execute(request).await;
    QueryResult::from_execution(execution, conn.id, conn.name.clone(), request.explanation.clone())
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Extracts `outputField` from a result's rows for carrying into dependent
/// steps: an exact column match first, then a case-insensitive fallback. A
/// single row yields one raw value; multiple rows are joined with `", "` so
/// the substitution pass can build an `IN (...)` list.
fn extract_output_value(result: &QueryResult, output_field: &str) -> Option<String> {
    if result.execution.rows.is_empty() {
        return None;
    }

    let lookup = |row: &serde_json::Map<String, serde_json::Value>| -> Option<String> {
        row.get(output_field)
            .or_else(|| {
                row.iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(output_field))
                    .map(|(_, v)| v)
            })
            .map(raw_piece)
    };

    let pieces: Vec<String> = result.execution.rows.iter().filter_map(lookup).collect();
    if pieces.is_empty() {
        return None;
    }
    Some(pieces.join(", "))
}

fn raw_piece(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Executes a validated plan (`validate_plan` must already have accepted
/// `requests`) and returns one `QueryResult` per request, in plan order.
/// Per-request failures never abort the plan.
pub async fn execute_plan(
    requests: &[DataRequest],
    connection_ids: &[i64],
    owner_id: &str,
    registry: &DataSourceRegistry,
    repository: &Arc<dyn ConnectionRepository>,
) -> Vec<QueryResult> {
    let chained = requests.iter().any(|r| r.step.is_some());
    if chained {
        execute_chained(requests, connection_ids, owner_id, registry, repository).await
    } else {
        execute_parallel(requests, connection_ids, owner_id, registry, repository).await
    }
}

async fn execute_parallel(
    requests: &[DataRequest],
    connection_ids: &[i64],
    owner_id: &str,
    registry: &DataSourceRegistry,
    repository: &Arc<dyn ConnectionRepository>,
) -> Vec<QueryResult> {
    let mut results = Vec::with_capacity(requests.len());
    for request in requests {
        results.push(run_one(request, registry, repository, connection_ids, owner_id).await);
    }
    results
}

async fn execute_chained(
    requests: &[DataRequest],
    connection_ids: &[i64],
    owner_id: &str,
    registry: &DataSourceRegistry,
    repository: &Arc<dyn ConnectionRepository>,
) -> Vec<QueryResult> {
    let mut ordered: Vec<&DataRequest> = requests.iter().collect();
    ordered.sort_by_key(|r| r.step.unwrap_or(u32::MAX));

    let mut variables: HashMap<String, String> = HashMap::new();
    let mut ordered_results = Vec::with_capacity(requests.len());

    for request in ordered {
        let mut owned_request = request.clone();

        if request.depends_on.is_some() && !variables.is_empty() {
            if let Some(sql) = owned_request.sql_mut() {
                *sql = replace_variables(sql, &variables);
            }
            for value in owned_request.substitutable_json_mut() {
                *value = substitute_json(value, &variables);
            }
        }

        let result = run_one(&owned_request, registry, repository, connection_ids, owner_id).await;

        if let (Some(output_as), Some(output_field)) = (&request.output_as, &request.output_field) {
            match extract_output_value(&result, output_field) {
                Some(value) => {
                    let name = output_as.trim_start_matches('$').to_string();
                    variables.insert(name, value);
                }
                None => warn!(
                    step = ?request.step,
                    output_as,
                    "producer step returned no rows for the declared output variable"
                ),
            }
        }

        ordered_results.push(result);
    }

    ordered_results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_connection_id_accepts_matching_source_id() {
        assert_eq!(resolve_connection_id(Some("2"), &[1, 2, 3]).unwrap(), 2);
    }

    #[test]
    fn resolve_connection_id_rejects_source_id_not_supplied() {
        assert!(resolve_connection_id(Some("9"), &[1, 2]).is_err());
    }

    #[test]
    fn resolve_connection_id_falls_back_when_unambiguous() {
        assert_eq!(resolve_connection_id(None, &[7]).unwrap(), 7);
    }

    #[test]
    fn resolve_connection_id_refuses_to_guess_among_many() {
        assert!(matches!(
            resolve_connection_id(None, &[1, 2]),
            Err(EngineError::AmbiguousConnection)
        ));
    }

    #[test]
    fn extract_output_value_single_row_exact_match() {
        let mut row = serde_json::Map::new();
        row.insert("id".to_string(), serde_json::json!(5));
        let result = QueryResult::from_execution(
            crate::model::result::ExecutionResult::ok(vec![row], vec!["id".to_string()], 1),
            1,
            "conn",
            None,
        );
        assert_eq!(extract_output_value(&result, "id"), Some("5".to_string()));
    }

    #[test]
    fn extract_output_value_case_insensitive_fallback() {
        let mut row = serde_json::Map::new();
        row.insert("ID".to_string(), serde_json::json!(9));
        let result = QueryResult::from_execution(
            crate::model::result::ExecutionResult::ok(vec![row], vec!["ID".to_string()], 1),
            1,
            "conn",
            None,
        );
        assert_eq!(extract_output_value(&result, "id"), Some("9".to_string()));
    }

    #[test]
    fn extract_output_value_multi_row_joins_with_comma_space() {
        let mut row1 = serde_json::Map::new();
        row1.insert("id".to_string(), serde_json::json!(1));
        let mut row2 = serde_json::Map::new();
        row2.insert("id".to_string(), serde_json::json!(2));
        let result = QueryResult::from_execution(
            crate::model::result::ExecutionResult::ok(vec![row1, row2], vec!["id".to_string()], 1),
            1,
            "conn",
            None,
        );
        assert_eq!(extract_output_value(&result, "id"), Some("1, 2".to_string()));
    }
}
