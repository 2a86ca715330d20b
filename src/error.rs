// src/error.rs
// Typed API-boundary error and credential-sanitisation helpers.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::model::response::AnalyzeResponse;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("no connections resolved for this request")]
    NoConnections,

    #[error("schema extraction failed for all data sources")]
    SchemaError,

    #[error("{0}")]
    QueryGenerationFailed(String),

    #[error("request kind is not supported by this adapter")]
    InvalidRequestKind,

    #[error("query timed out: {0}")]
    QueryTimeout(String),

    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("ambiguous connection: multiple connections supplied without an explicit sourceId")]
    AmbiguousConnection,

    #[error("unknown source kind: {0}")]
    UnknownSourceKind(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::NoConnections => "NO_CONNECTIONS",
            EngineError::SchemaError => "SCHEMA_ERROR",
            EngineError::QueryGenerationFailed(_) => "QUERY_GENERATION_FAILED",
            EngineError::InvalidRequestKind => "INVALID_REQUEST_KIND",
            EngineError::QueryTimeout(_) => "QUERY_TIMEOUT",
            EngineError::ConnectionError(_) => "CONNECTION_ERROR",
            EngineError::AmbiguousConnection => "AMBIGUOUS_CONNECTION",
            EngineError::UnknownSourceKind(_) => "UNKNOWN_SOURCE_KIND",
            EngineError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn suggestion(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "Check that the request fields are well-formed.",
            EngineError::NoConnections => {
                "Verify the supplied connection IDs belong to your account."
            }
            EngineError::SchemaError => {
                "Confirm the data sources are reachable and credentials are valid."
            }
            EngineError::QueryGenerationFailed(_) => {
                "Rephrase the question or provide more specific schema hints."
            }
            EngineError::InvalidRequestKind => {
                "The generated request kind does not match the target adapter."
            }
            EngineError::QueryTimeout(_) => "The source took too long to respond; try again.",
            EngineError::ConnectionError(_) => "Check the data source's availability and credentials.",
            EngineError::AmbiguousConnection => {
                "Specify which connection this step targets via sourceId."
            }
            EngineError::UnknownSourceKind(_) => "This connection's kind is not supported.",
            EngineError::InternalError(_) => "An unexpected error occurred; please try again.",
        }
    }
}

impl From<&EngineError> for AnalyzeResponse {
    fn from(err: &EngineError) -> Self {
        AnalyzeResponse::error(err.code(), sanitize_error(&err.to_string()), err.suggestion())
    }
}

impl From<EngineError> for AnalyzeResponse {
    fn from(err: EngineError) -> Self {
        AnalyzeResponse::from(&err)
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub suggestion: String,
}

static PASSWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)password=\S+").expect("valid password redaction regex")
});

static CONN_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(jdbc|mongodb(\+srv)?|postgres(ql)?|mysql|redis|https?):\S+")
        .expect("valid connection-url redaction regex")
});

/// Replaces `password=...` and connection-string-like URLs in an error message
/// before it is allowed to cross the orchestration core's boundary.
pub fn sanitize_error(message: &str) -> String {
    let redacted = PASSWORD_RE.replace_all(message, "password=***");
    CONN_URL_RE.replace_all(&redacted, "[connection-url]").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_password_assignment() {
        let msg = "connection failed: password=hunter2 invalid";
        assert_eq!(sanitize_error(msg), "connection failed: password=*** invalid");
    }

    #[test]
    fn redacts_connection_url() {
        let msg = "could not connect to jdbc:postgresql://user:pw@host/db";
        assert_eq!(sanitize_error(msg), "could not connect to [connection-url]");
    }

    #[test]
    fn leaves_unrelated_text_alone() {
        let msg = "table 'users' does not exist";
        assert_eq!(sanitize_error(msg), msg);
    }

    #[test]
    fn error_code_and_suggestion_pair() {
        let err = EngineError::NoConnections;
        assert_eq!(err.code(), "NO_CONNECTIONS");
        assert!(err.suggestion().contains("connection IDs"));
    }
}
