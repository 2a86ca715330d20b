// src/adapters/sql.rs
// Relational data source adapter plus the SQL safety validator it shares
// with the plan generator.
//
// Covers every relational SourceKind (Postgres, MySQL, SQLite, Supabase,
// StarRocks, ClickHouse, Snowflake, BigQuery) through sqlx's `Any` driver,
// the way a JDBC-like generic connection would in the source system.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{Column, Row, TypeInfo};
use std::time::Instant;

use super::DataSourceAdapter;
use crate::config::CONFIG;
use crate::error::sanitize_error;
use crate::model::request::{DataRequest, DataRequestKind};
use crate::model::schema::{ColumnSchema, SchemaPayload, TableSchema};
use crate::model::{Connection, ExecutionResult, SourceKind, SourceSchema};
use crate::summary::redact_row;

pub struct SqlAdapter {
    conn: Connection,
}

impl SqlAdapter {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    fn connection_url(&self) -> String {
        match self.conn.kind {
            SourceKind::Sqlite => {
                let path = self.conn.detail_str("file_path").unwrap_or(":memory:");
                format!("sqlite://{path}")
            }
            SourceKind::Mysql | SourceKind::Starrocks => format!(
                "mysql://{}:{}@{}:{}/{}",
                self.conn.username.as_deref().unwrap_or(""),
                self.conn.password.as_deref().unwrap_or(""),
                self.conn.host.as_deref().unwrap_or("localhost"),
                self.conn.port.unwrap_or(3306),
                self.conn.database.as_deref().unwrap_or(""),
            ),
            // Postgres-wire-compatible kinds (Postgres, Supabase, ClickHouse's
            // pg-wire mode, Snowflake/BigQuery behind a pg-compatible proxy).
            _ => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.conn.username.as_deref().unwrap_or(""),
                self.conn.password.as_deref().unwrap_or(""),
                self.conn.host.as_deref().unwrap_or("localhost"),
                self.conn.port.unwrap_or(5432),
                self.conn.database.as_deref().unwrap_or(""),
            ),
        }
    }

    async fn connect(&self) -> anyhow::Result<sqlx::AnyPool> {
        AnyPoolOptions::new()
            .max_connections(1)
            .connect(&self.connection_url())
            .await
            .map_err(|e| anyhow::anyhow!(sanitize_error(&e.to_string())))
    }

    fn list_tables_query(&self) -> &'static str {
        match self.conn.kind {
            SourceKind::Sqlite => {
                "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'"
            }
            SourceKind::Mysql | SourceKind::Starrocks => {
                "SELECT table_name AS name FROM information_schema.tables WHERE table_schema = database()"
            }
            _ => "SELECT table_name AS name FROM information_schema.tables \
                  WHERE table_schema NOT IN ('pg_catalog', 'information_schema') \
                  AND table_schema !~ '^pg_'",
        }
    }
}

#[async_trait]
impl DataSourceAdapter for SqlAdapter {
    fn id(&self) -> i64 {
        self.conn.id
    }

    fn name(&self) -> &str {
        &self.conn.name
    }

    fn kind(&self) -> SourceKind {
        self.conn.kind
    }

    async fn is_available(&self) -> bool {
        match self.connect().await {
            Ok(pool) => sqlx::query("SELECT 1").fetch_one(&pool).await.is_ok(),
            Err(_) => false,
        }
    }

    async fn extract_schema(&self) -> anyhow::Result<SourceSchema> {
        let pool = self.connect().await?;
        let table_rows = sqlx::query(self.list_tables_query()).fetch_all(&pool).await?;

        let mut tables = Vec::new();
        for row in table_rows {
            let table_name: String = row.try_get("name")?;
            let columns = self.extract_columns(&pool, &table_name).await?;
            let sample_rows = self.sample_rows(&pool, &table_name).await.unwrap_or_default();
            tables.push(TableSchema {
                name: table_name,
                columns,
                sample_rows,
            });
        }

        Ok(SourceSchema {
            source_id: self.conn.id,
            source_name: self.conn.name.clone(),
            source_kind: self.conn.kind,
            payload: SchemaPayload::Relational { tables },
        })
    }

    async fn execute(&self, request: &DataRequest) -> ExecutionResult {
        let start = Instant::now();
        let DataRequestKind::SqlQuery { sql } = &request.kind else {
            return ExecutionResult::error(
                "relational adapter received a non-SQL_QUERY request",
                elapsed_ms(start),
            );
        };

        if let ValidationResult::Invalid(reason) = validate_sql(sql) {
            return ExecutionResult::error(reason, elapsed_ms(start));
        }

        let pool = match self.connect().await {
            Ok(pool) => pool,
            Err(e) => return ExecutionResult::error(sanitize_error(&e.to_string()), elapsed_ms(start)),
        };

        let result = self.run_read_only(&pool, sql).await;
        pool.close().await;

        match result {
            Ok((rows, columns)) => ExecutionResult::ok(rows, columns, elapsed_ms(start)),
            Err(e) => ExecutionResult::error(sanitize_error(&e.to_string()), elapsed_ms(start)),
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

impl SqlAdapter {
    async fn extract_columns(
        &self,
        pool: &sqlx::AnyPool,
        table: &str,
    ) -> anyhow::Result<Vec<ColumnSchema>> {
        let query = match self.conn.kind {
            SourceKind::Sqlite => format!("PRAGMA table_info({table})"),
            _ => format!(
                "SELECT column_name AS name, data_type AS dtype, is_nullable AS nullable \
                 FROM information_schema.columns WHERE table_name = '{table}'"
            ),
        };
        let rows = sqlx::query(&query).fetch_all(pool).await?;
        let columns = rows
            .iter()
            .filter_map(|row| match self.conn.kind {
                SourceKind::Sqlite => Some(ColumnSchema {
                    name: row.try_get::<String, _>("name").ok()?,
                    data_type: row.try_get::<String, _>("type").unwrap_or_default(),
                    nullable: row.try_get::<i64, _>("notnull").unwrap_or(0) == 0,
                    primary_key: row.try_get::<i64, _>("pk").unwrap_or(0) != 0,
                }),
                _ => Some(ColumnSchema {
                    name: row.try_get::<String, _>("name").ok()?,
                    data_type: row.try_get::<String, _>("dtype").unwrap_or_default(),
                    nullable: row
                        .try_get::<String, _>("nullable")
                        .map(|s| s.eq_ignore_ascii_case("yes"))
                        .unwrap_or(true),
                    primary_key: false,
                }),
            })
            .collect();
        Ok(columns)
    }

    async fn sample_rows(
        &self,
        pool: &sqlx::AnyPool,
        table: &str,
    ) -> anyhow::Result<Vec<Map<String, Value>>> {
        let limit = CONFIG.execution.sample_row_limit;
        let query = format!("SELECT * FROM {table} LIMIT {limit}");
        let rows = sqlx::query(&query).fetch_all(pool).await?;
        Ok(rows
            .iter()
            .map(|row| {
                let mut map = any_row_to_json_map(row);
                redact_row(&mut map);
                map
            })
            .collect())
    }

    /// Opens, executes, and rolls back — read-only and auto-commit-disabled
    /// semantics via an explicit transaction that is never committed, so no
    /// query run through this adapter ever mutates state even if it somehow
    /// slipped past the safety validator. Bounded by `sql_statement_timeout_secs`
    /// so a runaway query can't hold the connection forever.
    async fn run_read_only(
        &self,
        pool: &sqlx::AnyPool,
        sql: &str,
    ) -> anyhow::Result<(Vec<Map<String, Value>>, Vec<String>)> {
        let timeout = std::time::Duration::from_secs(CONFIG.execution.sql_statement_timeout_secs);
        let mut tx = pool.begin().await?;
        let rows = tokio::time::timeout(timeout, sqlx::query(sql).fetch_all(&mut *tx))
            .await
            .map_err(|_| anyhow::anyhow!("statement timed out after {}s", CONFIG.execution.sql_statement_timeout_secs))??;
        tx.rollback().await?;

        let columns = rows
            .first()
            .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let json_rows = rows.iter().map(any_row_to_json_map).collect();
        Ok((json_rows, columns))
    }
}

fn any_row_to_json_map(row: &AnyRow) -> Map<String, Value> {
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name().to_string();
        let type_name = col.type_info().name().to_ascii_uppercase();
        let value = decode_column(row, col.ordinal(), &type_name);
        map.insert(name, value);
    }
    map
}

fn decode_column(row: &AnyRow, idx: usize, type_name: &str) -> Value {
    match type_name {
        "BOOL" | "BOOLEAN" => row
            .try_get::<bool, _>(idx)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "INT2" | "INT4" | "INT8" | "INTEGER" | "BIGINT" | "SMALLINT" | "INT" => row
            .try_get::<i64, _>(idx)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "FLOAT4" | "FLOAT8" | "REAL" | "DOUBLE" | "DOUBLE PRECISION" | "NUMERIC" | "DECIMAL" => row
            .try_get::<f64, _>(idx)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "TIMESTAMP" | "TIMESTAMPTZ" | "DATE" | "TIME" | "DATETIME" => row
            .try_get::<String, _>(idx)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "BYTEA" | "BLOB" | "BINARY" | "VARBINARY" => Value::from("[binary data]"),
        _ => row
            .try_get::<String, _>(idx)
            .map(Value::from)
            .unwrap_or(Value::Null),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(String),
}

static FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE",
    "GRANT", "REVOKE", "EXEC", "EXECUTE", "CALL", "MERGE", "REPLACE",
];

static LEADING_KEYWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(SELECT|WITH)\b").expect("valid leading keyword regex"));

static FORBIDDEN_KEYWORD_RES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    FORBIDDEN_KEYWORDS
        .iter()
        .map(|keyword| {
            let re = Regex::new(&format!(r"(?i)\b{keyword}\b")).expect("valid forbidden keyword regex");
            (*keyword, re)
        })
        .collect()
});

/// Runs twice per SQL request (generation-time and execution-time). Trims,
/// strips one trailing semicolon, rejects any forbidden keyword as a whole
/// word, then requires the root statement to parse as a `SELECT` (or
/// `WITH ... SELECT`), falling back to a leading-keyword check when parsing
/// fails.
pub fn validate_sql(sql: &str) -> ValidationResult {
    let trimmed = sql.trim();
    let trimmed = trimmed.strip_suffix(';').unwrap_or(trimmed).trim();

    for (keyword, re) in FORBIDDEN_KEYWORD_RES.iter() {
        if re.is_match(trimmed) {
            return ValidationResult::Invalid(format!(
                "only SELECT statements are allowed: found forbidden keyword '{keyword}'"
            ));
        }
    }

    use sqlparser::dialect::GenericDialect;
    use sqlparser::parser::Parser;

    match Parser::parse_sql(&GenericDialect {}, trimmed) {
        Ok(statements) => {
            let root_is_select = statements.first().map(is_select_or_with_select).unwrap_or(false);
            if root_is_select {
                ValidationResult::Valid
            } else {
                ValidationResult::Invalid(
                    "only SELECT statements are allowed: root statement is not a SELECT".to_string(),
                )
            }
        }
        Err(_) => {
            if LEADING_KEYWORD_RE.is_match(trimmed) {
                ValidationResult::Valid
            } else {
                ValidationResult::Invalid(
                    "only SELECT statements are allowed: could not parse as SELECT".to_string(),
                )
            }
        }
    }
}

fn is_select_or_with_select(stmt: &sqlparser::ast::Statement) -> bool {
    match stmt {
        sqlparser::ast::Statement::Query(query) => match query.body.as_ref() {
            sqlparser::ast::SetExpr::Select(_) => true,
            _ => matches!(query.body.as_ref(), sqlparser::ast::SetExpr::Query(_)),
        },
        _ => false,
    }
}
