// src/plan/substitution.rs
// `replaceVariables`: placeholder substitution for chained-mode SQL.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$[A-Za-z_][A-Za-z0-9_]*").expect("valid placeholder regex"));

static NUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("valid numeric regex"));

/// Formats one resolved value for embedding in SQL: a bare number is
/// inserted raw; a comma-list is split, each piece re-quoted, and rejoined;
/// anything else is single-quoted with internal quotes doubled.
fn format_value(raw: &str) -> String {
    if NUMERIC_RE.is_match(raw) {
        return raw.to_string();
    }
    if raw.contains(", ") {
        return raw.split(", ").map(format_value).collect::<Vec<_>>().join(", ");
    }
    format!("'{}'", raw.replace('\'', "''"))
}

/// Replaces every `$name` placeholder in `sql` with its formatted value from
/// `variables`. A placeholder with no entry in `variables` is left
/// unchanged — it will fail the safety validator or at execution, which is
/// preferable to silently substituting nothing.
pub fn replace_variables(sql: &str, variables: &HashMap<String, String>) -> String {
    PLACEHOLDER_RE
        .replace_all(sql, |caps: &regex::Captures| {
            let token = &caps[0];
            let name = &token[1..];
            match variables.get(name) {
                Some(value) => format_value(value),
                None => token.to_string(),
            }
        })
        .into_owned()
}

fn exact_placeholder_name(s: &str) -> Option<&str> {
    let m = PLACEHOLDER_RE.find(s)?;
    (m.start() == 0 && m.end() == s.len()).then(|| &s[1..])
}

fn json_value_for(raw: &str) -> serde_json::Value {
    if let Ok(n) = raw.parse::<i64>() {
        return serde_json::Value::from(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return serde_json::Value::from(f);
    }
    serde_json::Value::String(raw.to_string())
}

/// Substitutes `$name` placeholders found inside a JSON value (Mongo
/// filter, ES query, MCP tool arguments) from `variables`, recursing into
/// arrays and objects. A string that is *exactly* one placeholder is
/// replaced with a typed JSON value (number when the resolved value parses
/// as one); a placeholder embedded in a larger string is replaced as plain
/// text. Unresolved placeholders are left as the literal token.
pub fn substitute_json(value: &serde_json::Value, variables: &HashMap<String, String>) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => match exact_placeholder_name(s) {
            Some(name) => match variables.get(name) {
                Some(resolved) => json_value_for(resolved),
                None => value.clone(),
            },
            None => {
                let replaced = PLACEHOLDER_RE.replace_all(s, |caps: &regex::Captures| {
                    let token = &caps[0];
                    let name = &token[1..];
                    variables.get(name).cloned().unwrap_or_else(|| token.to_string())
                });
                serde_json::Value::String(replaced.into_owned())
            }
        },
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(|v| substitute_json(v, variables)).collect())
        }
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter().map(|(k, v)| (k.clone(), substitute_json(v, variables))).collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn identity_when_no_placeholders() {
        let sql = "SELECT * FROM users";
        assert_eq!(replace_variables(sql, &HashMap::new()), sql);
    }

    #[test]
    fn numeric_value_inserted_raw() {
        let sql = "SELECT * FROM orders WHERE user_id = $user_id";
        let vars = vars(&[("user_id", "5")]);
        assert_eq!(
            replace_variables(sql, &vars),
            "SELECT * FROM orders WHERE user_id = 5"
        );
    }

    #[test]
    fn string_value_quoted_with_doubled_internal_quotes() {
        let sql = "SELECT * FROM users WHERE name = $name";
        let vars = vars(&[("name", "O'Brien")]);
        assert_eq!(
            replace_variables(sql, &vars),
            "SELECT * FROM users WHERE name = 'O''Brien'"
        );
    }

    #[test]
    fn comma_list_becomes_in_clause() {
        let sql = "SELECT * FROM orders WHERE user_id IN ($ids)";
        let vars = vars(&[("ids", "1, 2, 3")]);
        assert_eq!(
            replace_variables(sql, &vars),
            "SELECT * FROM orders WHERE user_id IN (1, 2, 3)"
        );
    }

    #[test]
    fn mixed_comma_list_requotes_each_piece() {
        let sql = "SELECT * FROM t WHERE name IN ($names)";
        let vars = vars(&[("names", "alice, bob")]);
        assert_eq!(
            replace_variables(sql, &vars),
            "SELECT * FROM t WHERE name IN ('alice', 'bob')"
        );
    }

    #[test]
    fn unresolved_placeholder_left_unchanged() {
        let sql = "SELECT * FROM t WHERE id = $missing";
        assert_eq!(replace_variables(sql, &HashMap::new()), sql);
    }

    #[test]
    fn substitute_json_exact_match_becomes_typed_number() {
        let filter = serde_json::json!({"user_id": "$user_id"});
        let vars = vars(&[("user_id", "5")]);
        assert_eq!(substitute_json(&filter, &vars), serde_json::json!({"user_id": 5}));
    }

    #[test]
    fn substitute_json_exact_match_non_numeric_stays_string() {
        let filter = serde_json::json!({"username": "$name"});
        let vars = vars(&[("name", "johndoe")]);
        assert_eq!(substitute_json(&filter, &vars), serde_json::json!({"username": "johndoe"}));
    }

    #[test]
    fn substitute_json_recurses_into_arrays() {
        let filter = serde_json::json!({"ids": ["$a", "$b"]});
        let vars = vars(&[("a", "1"), ("b", "2")]);
        assert_eq!(substitute_json(&filter, &vars), serde_json::json!({"ids": [1, 2]}));
    }

    #[test]
    fn substitute_json_leaves_unresolved_placeholder_as_token() {
        let filter = serde_json::json!({"user_id": "$missing"});
        assert_eq!(substitute_json(&filter, &HashMap::new()), filter);
    }
}
