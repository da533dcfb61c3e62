use std::fmt;

/// Failures reported by the warehouse while publishing a query.
#[derive(Debug, Clone)]
pub enum BigQueryError {
    /// Application default credentials were missing or rejected.
    Credentials {
        reason: String,
    },

    InvalidQuery {
        message: String,
        position: Option<SqlPosition>,
        sql_preview: String,
    },

    /// A `@name` in the query does not agree with the supplied `--parameter`.
    ParameterMismatch {
        parameter: Option<String>,
        message: String,
    },

    /// A table or dataset does not exist. `resource` is `project.dataset[.table]`.
    NotFound {
        resource: String,
    },

    AccessDenied {
        resource: Option<String>,
        permission: Option<String>,
    },

    QuotaExceeded {
        message: String,
    },

    /// The job was accepted but finished with an error result.
    JobFailed {
        job_id: String,
        reason: Option<String>,
        message: String,
    },

    Transport {
        reason: String,
    },

    Unexpected {
        operation: String,
        message: String,
    },
}

/// 1-based position of a syntax error, from BigQuery's `[line:column]` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlPosition {
    pub line: u32,
    pub column: u32,
}

impl BigQueryError {
    pub fn error_code(&self) -> &'static str {
        match self {
            BigQueryError::Credentials { .. } => "CREDENTIALS",
            BigQueryError::InvalidQuery { .. } => "INVALID_QUERY",
            BigQueryError::ParameterMismatch { .. } => "PARAMETER_MISMATCH",
            BigQueryError::NotFound { .. } => "NOT_FOUND",
            BigQueryError::AccessDenied { .. } => "ACCESS_DENIED",
            BigQueryError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            BigQueryError::JobFailed { .. } => "JOB_FAILED",
            BigQueryError::Transport { .. } => "TRANSPORT",
            BigQueryError::Unexpected { .. } => "UNEXPECTED",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BigQueryError::NotFound { .. })
    }

    /// What to check before re-running `publish_json`.
    pub fn suggestion(&self) -> String {
        match self {
            BigQueryError::Credentials { .. } => {
                "Run `gcloud auth application-default login`, or point \
                 GOOGLE_APPLICATION_CREDENTIALS at a service account key".to_string()
            }
            BigQueryError::InvalidQuery { position: Some(pos), .. } => {
                format!("Fix query.sql near line {}, column {}", pos.line, pos.column)
            }
            BigQueryError::InvalidQuery { position: None, .. } => {
                "Run query.sql on its own with the same parameters to see the full error".to_string()
            }
            BigQueryError::ParameterMismatch { parameter, .. } => {
                let name = parameter.as_deref().unwrap_or("name");
                format!("Pass --parameter={name}:TYPE:value with the TYPE the query expects for @{name}")
            }
            BigQueryError::NotFound { resource } => {
                format!(
                    "Check that {resource} exists. Full and non-incremental exports read the \
                     query's destination table; incremental runs need the scratch dataset"
                )
            }
            BigQueryError::AccessDenied { permission, .. } => match permission {
                Some(p) => format!("Grant {p} to the publishing account"),
                None => "Check the publishing account's BigQuery roles on the project".to_string(),
            },
            BigQueryError::QuotaExceeded { .. } => {
                "Re-run the publish later; shards and the marker are rewritten in place".to_string()
            }
            BigQueryError::JobFailed { job_id, .. } => format!("Inspect the job with `bq show -j {job_id}`"),
            BigQueryError::Transport { .. } => "Check network access to bigquery.googleapis.com".to_string(),
            BigQueryError::Unexpected { .. } => "Re-run with -v for the full request log".to_string(),
        }
    }
}

impl fmt::Display for BigQueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BigQueryError::Credentials { reason } => write!(f, "No usable credentials: {reason}"),
            BigQueryError::InvalidQuery { message, position, sql_preview } => {
                write!(f, "Invalid SQL: {message}")?;
                if let Some(pos) = position {
                    write!(f, " (line {}, column {})", pos.line, pos.column)?;
                }
                if !sql_preview.is_empty() {
                    write!(f, "\n\n  {sql_preview}")?;
                }
                Ok(())
            }
            BigQueryError::ParameterMismatch { parameter: Some(p), message } => {
                write!(f, "Parameter @{p} rejected: {message}")
            }
            BigQueryError::ParameterMismatch { parameter: None, message } => {
                write!(f, "Parameter rejected: {message}")
            }
            BigQueryError::NotFound { resource } => write!(f, "Not found: {resource}"),
            BigQueryError::AccessDenied { resource, permission } => {
                write!(f, "Access denied")?;
                if let Some(r) = resource {
                    write!(f, " on {r}")?;
                }
                if let Some(p) = permission {
                    write!(f, " (missing {p})")?;
                }
                Ok(())
            }
            BigQueryError::QuotaExceeded { message } => write!(f, "Quota exceeded: {message}"),
            BigQueryError::JobFailed { job_id, reason, message } => match reason {
                Some(r) => write!(f, "Job {job_id} failed [{r}]: {message}"),
                None => write!(f, "Job {job_id} failed: {message}"),
            },
            BigQueryError::Transport { reason } => write!(f, "Could not reach BigQuery: {reason}"),
            BigQueryError::Unexpected { operation, message } => write!(f, "{operation} failed: {message}"),
        }
    }
}

impl std::error::Error for BigQueryError {}
