use gcp_bigquery_client::error::{BQError, ResponseError};
use gcp_bigquery_client::model::job_status::JobStatus;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use super::bq_error::{BigQueryError, SqlPosition};

const SQL_PREVIEW_CHARS: usize = 300;

/// Which warehouse call failed, and on what.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    operation: &'static str,
    sql: Option<String>,
    resource: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            sql: None,
            resource: None,
        }
    }

    pub fn with_sql(mut self, sql: &str) -> Self {
        let sql = sql.trim();
        self.sql = Some(match sql.char_indices().nth(SQL_PREVIEW_CHARS) {
            Some((cut, _)) => format!("{}...", &sql[..cut]),
            None => sql.to_string(),
        });
        self
    }

    pub fn with_resource(mut self, resource: impl fmt::Display) -> Self {
        self.resource = Some(resource.to_string());
        self
    }
}

pub fn parse_bq_error(error: BQError, context: ErrorContext) -> BigQueryError {
    match error {
        BQError::ResponseError { error } => classify_response(&error, context),
        BQError::RequestError(e) => BigQueryError::Transport { reason: e.to_string() },
        BQError::ConnectionPoolError(reason) => BigQueryError::Transport { reason },
        e @ (BQError::NoToken
        | BQError::AuthError(_)
        | BQError::YupAuthError(_)
        | BQError::InvalidServiceAccountKey(_)
        | BQError::InvalidServiceAccountAuthenticator(_)
        | BQError::InvalidApplicationDefaultCredentialsAuthenticator(_)) => {
            BigQueryError::Credentials { reason: e.to_string() }
        }
        other => BigQueryError::Unexpected {
            operation: context.operation.to_string(),
            message: other.to_string(),
        },
    }
}

/// A completed job whose status carries an `error_result` failed, even when
/// polling its results did not return an HTTP error.
pub fn job_failure(job_id: &str, status: Option<&JobStatus>) -> Option<BigQueryError> {
    let error = status?.error_result.as_ref()?;
    Some(BigQueryError::JobFailed {
        job_id: job_id.to_string(),
        reason: error.reason.clone(),
        message: error.message.clone().unwrap_or_else(|| "no message".to_string()),
    })
}

fn classify_response(response: &ResponseError, context: ErrorContext) -> BigQueryError {
    let status = response.error.code;
    let message = response.error.message.clone();
    let reason = response
        .error
        .errors
        .first()
        .and_then(|e| e.get("reason"))
        .map(String::as_str);

    match (reason, status) {
        (Some("invalidQuery") | Some("invalid"), _) => match parameter_name(&message) {
            Some(parameter) => BigQueryError::ParameterMismatch {
                parameter: Some(parameter),
                message,
            },
            None => BigQueryError::InvalidQuery {
                position: sql_position(&message),
                sql_preview: context.sql.unwrap_or_default(),
                message,
            },
        },
        (Some("notFound"), _) | (_, 404) => BigQueryError::NotFound {
            resource: missing_resource(&message)
                .or(context.resource)
                .unwrap_or(message),
        },
        (Some("accessDenied"), _) => BigQueryError::AccessDenied {
            permission: required_permission(&message),
            resource: context.resource,
        },
        (Some("quotaExceeded") | Some("rateLimitExceeded"), _) => BigQueryError::QuotaExceeded { message },
        (_, 401) => BigQueryError::Credentials { reason: message },
        (reason, status) => BigQueryError::Unexpected {
            operation: context.operation.to_string(),
            message: format!("HTTP {} ({}): {}", status, reason.unwrap_or("no reason"), message),
        },
    }
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

/// `Syntax error: ... at [3:15]`
fn sql_position(message: &str) -> Option<SqlPosition> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let caps = regex(&RE, r"at \[(\d+):(\d+)\]").captures(message)?;
    Some(SqlPosition {
        line: caps[1].parse().ok()?,
        column: caps[2].parse().ok()?,
    })
}

fn parameter_name(message: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)query parameter '?@?([A-Za-z_][A-Za-z0-9_]*)'?")
        .captures(message)
        .map(|caps| caps[1].to_string())
}

/// `Not found: Table proj:test.t_v1 was not found in location US` -> `proj.test.t_v1`
fn missing_resource(message: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)not found: (?:table|dataset) ([A-Za-z0-9_\-]+):([A-Za-z0-9_.\-]+)")
        .captures(message)
        .map(|caps| format!("{}.{}", &caps[1], &caps[2]))
}

fn required_permission(message: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"bigquery\.[a-zA-Z]+\.[a-zA-Z]+")
        .find(message)
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcp_bigquery_client::error::NestedResponseError;
    use gcp_bigquery_client::model::error_proto::ErrorProto;
    use std::collections::HashMap;

    fn response(code: i64, reason: &str, message: &str) -> BQError {
        BQError::ResponseError {
            error: ResponseError {
                error: NestedResponseError {
                    code,
                    errors: vec![HashMap::from([("reason".to_string(), reason.to_string())])],
                    message: message.to_string(),
                    status: String::new(),
                },
            },
        }
    }

    #[test]
    fn test_syntax_error_keeps_position_and_sql() {
        let err = parse_bq_error(
            response(400, "invalidQuery", "Syntax error: Unexpected keyword FROM at [2:9]"),
            ErrorContext::new("run_query").with_sql("SELECT a,\nFROM t;\n"),
        );

        match err {
            BigQueryError::InvalidQuery { position, sql_preview, .. } => {
                assert_eq!(position, Some(SqlPosition { line: 2, column: 9 }));
                assert_eq!(sql_preview, "SELECT a,\nFROM t;");
            }
            other => panic!("Expected InvalidQuery, got {:?}", other),
        }
    }

    #[test]
    fn test_parameter_error() {
        let err = parse_bq_error(
            response(400, "invalidQuery", "Query parameter 'submission_date' not found at [4:20]"),
            ErrorContext::new("run_query"),
        );
        match err {
            BigQueryError::ParameterMismatch { parameter, .. } => {
                assert_eq!(parameter.as_deref(), Some("submission_date"));
            }
            other => panic!("Expected ParameterMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_destination_table() {
        let err = parse_bq_error(
            response(404, "notFound", "Not found: Table proj:test.non_incremental_query_v1 was not found in location US"),
            ErrorContext::new("run_query"),
        );
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Not found: proj.test.non_incremental_query_v1");
    }

    #[test]
    fn test_not_found_falls_back_to_context() {
        let err = parse_bq_error(
            response(404, "notFound", "Resource gone"),
            ErrorContext::new("drop_table").with_resource("proj.tmp.t_v1_20200315_temp"),
        );
        assert_eq!(err.to_string(), "Not found: proj.tmp.t_v1_20200315_temp");
    }

    #[test]
    fn test_access_denied_and_quota() {
        let err = parse_bq_error(
            response(403, "accessDenied", "User does not have bigquery.tables.create permission in dataset tmp"),
            ErrorContext::new("run_query"),
        );
        match err {
            BigQueryError::AccessDenied { permission, .. } => {
                assert_eq!(permission.as_deref(), Some("bigquery.tables.create"));
            }
            other => panic!("Expected AccessDenied, got {:?}", other),
        }

        let err = parse_bq_error(
            response(403, "rateLimitExceeded", "Exceeded rate limits"),
            ErrorContext::new("run_query"),
        );
        assert_eq!(err.error_code(), "QUOTA_EXCEEDED");
    }

    #[test]
    fn test_unclassified_response_names_operation() {
        let err = parse_bq_error(
            response(503, "backendError", "Service unavailable"),
            ErrorContext::new("fetch_page"),
        );
        assert_eq!(err.error_code(), "UNEXPECTED");
        assert_eq!(err.to_string(), "fetch_page failed: HTTP 503 (backendError): Service unavailable");
    }

    #[test]
    fn test_no_token_is_a_credentials_error() {
        let err = parse_bq_error(BQError::NoToken, ErrorContext::new("client_init"));
        assert_eq!(err.error_code(), "CREDENTIALS");
    }

    #[test]
    fn test_job_failure_from_error_result() {
        let status = JobStatus {
            error_result: Some(ErrorProto {
                reason: Some("resourcesExceeded".into()),
                message: Some("Resources exceeded during query execution".into()),
                ..Default::default()
            }),
            state: Some("DONE".into()),
            ..Default::default()
        };

        match job_failure("job_1", Some(&status)) {
            Some(BigQueryError::JobFailed { job_id, reason, .. }) => {
                assert_eq!(job_id, "job_1");
                assert_eq!(reason.as_deref(), Some("resourcesExceeded"));
            }
            other => panic!("Expected JobFailed, got {:?}", other),
        }

        let done = JobStatus {
            state: Some("DONE".into()),
            ..Default::default()
        };
        assert!(job_failure("job_1", Some(&done)).is_none());
        assert!(job_failure("job_1", None).is_none());
    }

    #[test]
    fn test_sql_preview_is_truncated() {
        let sql = "SELECT ".to_string() + &"x, ".repeat(200);
        let ctx = ErrorContext::new("run_query").with_sql(&sql);
        let preview = ctx.sql.unwrap();
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), SQL_PREVIEW_CHARS + 3);
    }
}
