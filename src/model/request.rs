// src/model/request.rs
// DataRequest tagged union and the plan-level invariants over a Vec<DataRequest>.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DataRequestKind {
    #[serde(rename = "SQL_QUERY")]
    SqlQuery { sql: String },
    #[serde(rename = "MONGO_QUERY")]
    MongoQuery {
        collection: String,
        operation: MongoOperation,
        filter: serde_json::Value,
        limit: Option<u32>,
    },
    #[serde(rename = "ES_QUERY")]
    EsQuery {
        index: String,
        query: serde_json::Value,
        size: Option<u32>,
    },
    #[serde(rename = "MCP_TOOL_CALL")]
    McpToolCall {
        #[serde(rename = "toolName")]
        tool_name: String,
        arguments: HashMap<String, serde_json::Value>,
    },
    #[serde(rename = "MCP_RESOURCE_READ")]
    McpResourceRead { uri: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MongoOperation {
    Find,
    Count,
    Aggregate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRequest {
    #[serde(flatten)]
    pub kind: DataRequestKind,
    pub source_id: Option<String>,
    pub step: Option<u32>,
    pub depends_on: Option<u32>,
    pub output_as: Option<String>,
    pub output_field: Option<String>,
    pub description: Option<String>,
    pub explanation: Option<String>,
}

impl DataRequest {
    pub fn is_sql(&self) -> bool {
        matches!(self.kind, DataRequestKind::SqlQuery { .. })
    }

    /// Mutable access to the SQL text, if this is a `SQL_QUERY`.
    pub fn sql_mut(&mut self) -> Option<&mut String> {
        match &mut self.kind {
            DataRequestKind::SqlQuery { sql } => Some(sql),
            _ => None,
        }
    }

    /// Mutable access to every JSON value a non-SQL request kind carries
    /// that may contain `$name` placeholders: a Mongo filter, an ES query,
    /// or MCP tool call arguments.
    pub fn substitutable_json_mut(&mut self) -> Vec<&mut serde_json::Value> {
        match &mut self.kind {
            DataRequestKind::MongoQuery { filter, .. } => vec![filter],
            DataRequestKind::EsQuery { query, .. } => vec![query],
            DataRequestKind::McpToolCall { arguments, .. } => arguments.values_mut().collect(),
            DataRequestKind::SqlQuery { .. } | DataRequestKind::McpResourceRead { .. } => vec![],
        }
    }
}

static OUTPUT_AS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$[A-Za-z_][A-Za-z0-9_]*$").expect("valid outputAs regex"));

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PlanValidationError {
    #[error("step values must form the sequence 1..N, got {0:?}")]
    NonContiguousSteps(Vec<u32>),
    #[error("dependsOn={depends_on} on step {step} does not reference a smaller step")]
    DependsOnNotSmaller { step: u32, depends_on: u32 },
    #[error("outputAs '{0}' does not match ^\\$[A-Za-z_][A-Za-z0-9_]*$")]
    InvalidOutputAsFormat(String),
    #[error("outputAs '{0}' is declared more than once in the plan")]
    DuplicateOutputAs(String),
    #[error("placeholder '{placeholder}' in step {step} is not declared by any ancestor step's outputAs")]
    UndeclaredPlaceholder { step: u32, placeholder: String },
    #[error("plan is empty")]
    EmptyPlan,
}

/// Validates the four plan invariants from the data model section: step
/// contiguity, dependsOn ordering, outputAs format/uniqueness, and
/// placeholder reachability through the dependsOn chain.
pub fn validate_plan(requests: &[DataRequest]) -> Result<(), PlanValidationError> {
    if requests.is_empty() {
        return Err(PlanValidationError::EmptyPlan);
    }

    let any_stepped = requests.iter().any(|r| r.step.is_some());
    if !any_stepped {
        return Ok(());
    }

    let mut steps: Vec<u32> = requests.iter().filter_map(|r| r.step).collect();
    steps.sort_unstable();
    let expected: Vec<u32> = (1..=steps.len() as u32).collect();
    if steps != expected {
        return Err(PlanValidationError::NonContiguousSteps(steps));
    }

    let mut output_as_seen: HashSet<String> = HashSet::new();
    let mut declares_at_step: HashMap<String, u32> = HashMap::new();

    for req in requests {
        if let Some(step) = req.step {
            if let Some(depends_on) = req.depends_on {
                if depends_on >= step {
                    return Err(PlanValidationError::DependsOnNotSmaller {
                        step,
                        depends_on,
                    });
                }
            }
        }
        if let Some(output_as) = &req.output_as {
            if !OUTPUT_AS_RE.is_match(output_as) {
                return Err(PlanValidationError::InvalidOutputAsFormat(output_as.clone()));
            }
            if !output_as_seen.insert(output_as.clone()) {
                return Err(PlanValidationError::DuplicateOutputAs(output_as.clone()));
            }
            if let Some(step) = req.step {
                declares_at_step.insert(output_as.clone(), step);
            }
        }
    }

    let by_step: HashMap<u32, &DataRequest> = requests
        .iter()
        .filter_map(|r| r.step.map(|s| (s, r)))
        .collect();

    for req in requests {
        let Some(step) = req.step else { continue };
        let DataRequestKind::SqlQuery { sql } = &req.kind else {
            continue;
        };
        for placeholder in placeholders_in(sql) {
            if !ancestor_declares(step, &placeholder, &by_step, &declares_at_step) {
                return Err(PlanValidationError::UndeclaredPlaceholder { step, placeholder });
            }
        }
    }

    Ok(())
}

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$[A-Za-z_][A-Za-z0-9_]*").expect("valid placeholder regex"));

pub fn placeholders_in(sql: &str) -> Vec<String> {
    PLACEHOLDER_RE
        .find_iter(sql)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn ancestor_declares(
    step: u32,
    placeholder: &str,
    by_step: &HashMap<u32, &DataRequest>,
    declares_at_step: &HashMap<String, u32>,
) -> bool {
    let Some(&declared_at) = declares_at_step.get(placeholder) else {
        return false;
    };
    let mut current = step;
    loop {
        let Some(req) = by_step.get(&current) else {
            return false;
        };
        let Some(depends_on) = req.depends_on else {
            return false;
        };
        if depends_on == declared_at {
            return true;
        }
        current = depends_on;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql_req(step: Option<u32>, depends_on: Option<u32>, sql: &str, output_as: Option<&str>) -> DataRequest {
        DataRequest {
            kind: DataRequestKind::SqlQuery { sql: sql.to_string() },
            source_id: Some("1".to_string()),
            step,
            depends_on,
            output_as: output_as.map(|s| s.to_string()),
            output_field: None,
            description: None,
            explanation: None,
        }
    }

    #[test]
    fn unstepped_plan_is_always_valid() {
        let plan = vec![sql_req(None, None, "SELECT 1", None)];
        assert!(validate_plan(&plan).is_ok());
    }

    #[test]
    fn rejects_non_contiguous_steps() {
        let plan = vec![
            sql_req(Some(1), None, "SELECT 1", None),
            sql_req(Some(3), None, "SELECT 2", None),
        ];
        assert!(matches!(
            validate_plan(&plan),
            Err(PlanValidationError::NonContiguousSteps(_))
        ));
    }

    #[test]
    fn rejects_depends_on_not_smaller() {
        let plan = vec![
            sql_req(Some(1), Some(2), "SELECT 1", None),
            sql_req(Some(2), None, "SELECT 2", None),
        ];
        assert!(matches!(
            validate_plan(&plan),
            Err(PlanValidationError::DependsOnNotSmaller { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_output_as() {
        let plan = vec![
            sql_req(Some(1), None, "SELECT 1", Some("$x")),
            sql_req(Some(2), Some(1), "SELECT 2", Some("$x")),
        ];
        assert!(matches!(
            validate_plan(&plan),
            Err(PlanValidationError::DuplicateOutputAs(_))
        ));
    }

    #[test]
    fn rejects_unreachable_placeholder() {
        let plan = vec![
            sql_req(Some(1), None, "SELECT id FROM users", Some("$user_id")),
            sql_req(Some(2), None, "SELECT * FROM orders WHERE user_id = $user_id", None),
        ];
        assert!(matches!(
            validate_plan(&plan),
            Err(PlanValidationError::UndeclaredPlaceholder { .. })
        ));
    }

    #[test]
    fn accepts_chained_placeholder_through_dependency() {
        let plan = vec![
            sql_req(Some(1), None, "SELECT id FROM users", Some("$user_id")),
            sql_req(
                Some(2),
                Some(1),
                "SELECT * FROM orders WHERE user_id = $user_id",
                None,
            ),
        ];
        assert!(validate_plan(&plan).is_ok());
    }

    #[test]
    fn empty_plan_is_rejected() {
        assert_eq!(validate_plan(&[]), Err(PlanValidationError::EmptyPlan));
    }
}
