mod bq_error;
mod parser;

use thiserror::Error;

pub use bq_error::{BigQueryError, SqlPosition};
pub use parser::{job_failure, parse_bq_error, ErrorContext};

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Missing parameter: query {query} is incremental but no '{field}' parameter was supplied")]
    MissingParameter { query: String, field: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid query path: {0}")]
    InvalidQueryPath(String),

    #[error("Query file not found: {0}")]
    QueryFileNotFound(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Query execution failed: {0}")]
    QueryExecution(#[from] BigQueryError),

    #[error("Storage write failed for {path}: {message}")]
    StorageWrite { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PublishError {
    pub fn storage(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        PublishError::StorageWrite {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Short, stable classification used in logs and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            PublishError::MissingParameter { .. } => "MISSING_PARAMETER",
            PublishError::InvalidParameter(_) => "INVALID_PARAMETER",
            PublishError::InvalidQueryPath(_) => "INVALID_QUERY_PATH",
            PublishError::QueryFileNotFound(_) => "QUERY_FILE_NOT_FOUND",
            PublishError::Metadata(_) | PublishError::Yaml(_) => "METADATA",
            PublishError::Config(_) => "CONFIG",
            PublishError::QueryExecution(_) => "QUERY_EXECUTION",
            PublishError::StorageWrite { .. } => "STORAGE_WRITE",
            PublishError::Io(_) => "IO",
            PublishError::Json(_) => "JSON",
        }
    }

    /// Every failure is a failed run; there is no partial-success code.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

pub type Result<T> = std::result::Result<T, PublishError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_parameter_display() {
        let err = PublishError::MissingParameter {
            query: "test.incremental_query_v1".into(),
            field: "submission_date".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("test.incremental_query_v1"));
        assert!(msg.contains("'submission_date'"));
        assert_eq!(err.kind(), "MISSING_PARAMETER");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_query_execution_from_bigquery_error() {
        let err: PublishError = BigQueryError::InvalidQuery {
            sql_preview: "SELEC 1".into(),
            message: "Syntax error".into(),
            position: None,
        }
        .into();
        assert_eq!(err.kind(), "QUERY_EXECUTION");
        assert!(err.to_string().starts_with("Query execution failed: Invalid SQL"));
    }

    #[test]
    fn test_storage_helper() {
        let err = PublishError::storage("api/v1/x", "permission denied");
        assert_eq!(err.to_string(), "Storage write failed for api/v1/x: permission denied");
        assert_eq!(err.kind(), "STORAGE_WRITE");
    }
}
