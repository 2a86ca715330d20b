// src/summary/mod.rs
// The sensitive-column matcher is shared by the schema introspector
// (redacting sample rows at extraction time) and by the post-execution
// structural summary built here.

use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::model::QueryResult;

static SENSITIVE_NAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "password", "passwd", "pwd", "secret", "token", "apikey", "api_key",
        "access_key", "private_key", "salt", "hash", "ssn", "social_security",
        "national_id", "credit_card", "card_number", "cvv", "card_no",
        "bank_account", "account_number", "routing_number", "email", "phone",
        "mobile", "contact", "address", "street", "zipcode", "zip_code",
        "passport", "license", "driving_license", "dob", "date_of_birth",
        "birth_date",
    ]
    .into_iter()
    .collect()
});

fn normalize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

/// True if `column_name` matches the sensitive-column pattern: the
/// normalized name equals a sensitive term, or contains it as a
/// `prefix_`/`_suffix`/`_infix_` surrounded whole word.
pub fn is_sensitive_column(column_name: &str) -> bool {
    let normalized = normalize(column_name);
    let parts: Vec<&str> = normalized.split('_').filter(|p| !p.is_empty()).collect();
    parts.iter().any(|part| SENSITIVE_NAMES.contains(part))
}

pub const REDACTED: &str = "[REDACTED]";

/// Redacts sensitive-column values in place within a single row.
pub fn redact_row(row: &mut Map<String, Value>) {
    let sensitive: Vec<String> = row
        .keys()
        .filter(|k| is_sensitive_column(k))
        .cloned()
        .collect();
    for key in sensitive {
        row.insert(key, Value::String(REDACTED.to_string()));
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub redacted: bool,
    pub inferred_type: Option<String>,
    pub null_count: Option<usize>,
    pub distinct_count: Option<usize>,
    pub top_values: Vec<(String, usize)>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
    pub sum: Option<f64>,
}

static ISO_DATE_RE: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("valid date regex"));
static US_DATE_RE: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}").expect("valid date regex"));

fn infer_type(values: &[&Value]) -> &'static str {
    let non_null: Vec<&&Value> = values.iter().filter(|v| !v.is_null()).collect();
    if non_null.is_empty() {
        return "string";
    }
    let all_numeric = non_null.iter().all(|v| match v {
        Value::Number(_) => true,
        Value::String(s) => s.parse::<f64>().is_ok(),
        _ => false,
    });
    if all_numeric {
        return "numeric";
    }
    let looks_like_date = |s: &str| ISO_DATE_RE.is_match(s) || US_DATE_RE.is_match(s);
    let sample: Vec<&str> = non_null
        .iter()
        .take(5)
        .filter_map(|v| v.as_str())
        .collect();
    if !sample.is_empty() && sample.iter().all(|s| looks_like_date(s)) {
        return "date";
    }
    "string"
}

fn column_profile(name: &str, values: Vec<&Value>) -> ColumnProfile {
    if is_sensitive_column(name) {
        return ColumnProfile {
            name: name.to_string(),
            redacted: true,
            inferred_type: None,
            null_count: None,
            distinct_count: None,
            top_values: Vec::new(),
            min: None,
            max: None,
            avg: None,
            sum: None,
        };
    }

    let null_count = values.iter().filter(|v| v.is_null()).count();
    let mut distinct: HashSet<String> = HashSet::new();
    let mut frequency: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for v in &values {
        if v.is_null() {
            continue;
        }
        let s = value_to_display(v);
        distinct.insert(s.clone());
        *frequency.entry(s).or_insert(0) += 1;
    }
    let mut top_values: Vec<(String, usize)> = frequency.into_iter().collect();
    top_values.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_values.truncate(10);

    let inferred = infer_type(&values);
    let (min, max, avg, sum) = if inferred == "numeric" {
        let nums: Vec<f64> = values
            .iter()
            .filter_map(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse::<f64>().ok(),
                _ => None,
            })
            .collect();
        if nums.is_empty() {
            (None, None, None, None)
        } else {
            let sum: f64 = nums.iter().sum();
            let avg = sum / nums.len() as f64;
            let min = nums.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = nums.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let round2 = |x: f64| (x * 100.0).round() / 100.0;
            (Some(round2(min)), Some(round2(max)), Some(round2(avg)), Some(round2(sum)))
        }
    } else {
        (None, None, None, None)
    };

    ColumnProfile {
        name: name.to_string(),
        redacted: false,
        inferred_type: Some(inferred.to_string()),
        null_count: Some(null_count),
        distinct_count: Some(distinct.len()),
        top_values,
        min,
        max,
        avg,
        sum,
    }
}

fn value_to_display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DatasetSummary {
    pub query: String,
    pub purpose: Option<String>,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub column_profiles: Vec<ColumnProfile>,
    pub sample_rows: Vec<Map<String, Value>>,
}

/// Builds the structural summary sent to the AI (never raw rows beyond the
/// capped, redacted samples) from the successful query results.
pub fn build_structural_summary(results: &[QueryResult]) -> Vec<DatasetSummary> {
    results
        .iter()
        .filter(|r| r.execution.success)
        .map(|r| {
            let columns = r.execution.columns.clone();
            let column_profiles = columns
                .iter()
                .map(|col| {
                    let values: Vec<&Value> = r
                        .execution
                        .rows
                        .iter()
                        .map(|row| row.get(col).unwrap_or(&Value::Null))
                        .collect();
                    column_profile(col, values)
                })
                .collect();

            let sample_rows = r
                .execution
                .rows
                .iter()
                .take(5)
                .map(|row| {
                    let mut row = row.clone();
                    redact_row(&mut row);
                    row
                })
                .collect();

            DatasetSummary {
                query: r.explanation.clone().unwrap_or_default(),
                purpose: r.explanation.clone(),
                columns,
                row_count: r.execution.row_count,
                column_profiles,
                sample_rows,
            }
        })
        .collect()
}

/// Renders the structural summary as the deterministic, parseable text the
/// prompt builder embeds in the analysis prompt.
pub fn render_structural_summary(summaries: &[DatasetSummary]) -> String {
    let mut out = String::new();
    for (i, s) in summaries.iter().enumerate() {
        out.push_str(&format!(
            "Dataset {}: query=\"{}\" rows={}\n",
            i + 1,
            s.query,
            s.row_count
        ));
        for profile in &s.column_profiles {
            if profile.redacted {
                out.push_str(&format!("  - {} [REDACTED]\n", profile.name));
                continue;
            }
            out.push_str(&format!(
                "  - {} type={} nulls={} distinct={}",
                profile.name,
                profile.inferred_type.as_deref().unwrap_or("string"),
                profile.null_count.unwrap_or(0),
                profile.distinct_count.unwrap_or(0),
            ));
            if let (Some(min), Some(max), Some(avg), Some(sum)) =
                (profile.min, profile.max, profile.avg, profile.sum)
            {
                out.push_str(&format!(" min={min} max={max} avg={avg} sum={sum}"));
            }
            out.push('\n');
        }
        out.push_str("  sample rows:\n");
        for row in &s.sample_rows {
            out.push_str(&format!("  {}\n", Value::Object(row.clone())));
        }
    }
    out
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct EmbeddableDataset {
    pub query: String,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub rows: Vec<Map<String, Value>>,
}

/// Array of one entry per result, serialised verbatim with no redaction —
/// this payload never reaches the AI, only a dashboard renderer.
pub fn build_embeddable_datasets(results: &[QueryResult]) -> Vec<EmbeddableDataset> {
    results
        .iter()
        .filter(|r| r.execution.success)
        .map(|r| EmbeddableDataset {
            query: r.explanation.clone().unwrap_or_default(),
            columns: r.execution.columns.clone(),
            row_count: r.execution.row_count,
            rows: r.execution.rows.clone(),
        })
        .collect()
}
