use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use crate::error::{PublishError, Result};

pub const QUERY_FILE: &str = "query.sql";
pub const METADATA_FILE: &str = "metadata.yaml";
pub const DEFAULT_PARTITION_FIELD: &str = "submission_date";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryIdentity {
    pub namespace: String,
    pub table: String,
    pub version: u32,
}

impl QueryIdentity {
    /// Derives the identity from `.../<namespace>/<table>_v<N>/query.sql`.
    pub fn from_query_path(path: impl AsRef<Path>) -> Result<Self> {
        static TABLE_DIR: OnceLock<Regex> = OnceLock::new();
        let table_dir = TABLE_DIR.get_or_init(|| {
            Regex::new(r"^([a-zA-Z0-9_]+)_v([0-9]+)$").expect("static regex")
        });

        let path = path.as_ref();
        let invalid = || PublishError::InvalidQueryPath(format!(
            "{} (expected .../<dataset>/<table>_v<N>/{})",
            path.display(),
            QUERY_FILE
        ));

        let file_name = path.file_name().and_then(|f| f.to_str()).ok_or_else(invalid)?;
        if file_name != QUERY_FILE {
            return Err(invalid());
        }

        let table_dir_path = path.parent().ok_or_else(invalid)?;
        let table_dir_name = table_dir_path.file_name().and_then(|f| f.to_str()).ok_or_else(invalid)?;
        let namespace = table_dir_path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|f| f.to_str())
            .filter(|ns| ns.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'))
            .ok_or_else(invalid)?;

        let caps = table_dir.captures(table_dir_name).ok_or_else(invalid)?;
        let version = caps[2].parse::<u32>().map_err(|_| invalid())?;

        Ok(Self {
            namespace: namespace.to_string(),
            table: caps[1].to_string(),
            version,
        })
    }

    /// `<table>_v<N>`, the BigQuery table name of the query's destination.
    pub fn versioned_table(&self) -> String {
        format!("{}_v{}", self.table, self.version)
    }
}

impl fmt::Display for QueryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}_v{}", self.namespace, self.table, self.version)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PartitionType {
    #[serde(alias = "HOUR")]
    Hour,
    #[default]
    #[serde(alias = "DAY")]
    Day,
    #[serde(alias = "MONTH")]
    Month,
    #[serde(alias = "YEAR")]
    Year,
}

impl PartitionType {
    /// Partition expression for a `PARTITION BY` clause over `field`.
    pub fn partition_expression(&self, field: &str) -> String {
        match self {
            PartitionType::Hour => format!("TIMESTAMP_TRUNC({}, HOUR)", field),
            PartitionType::Day => field.to_string(),
            PartitionType::Month => format!("DATE_TRUNC({}, MONTH)", field),
            PartitionType::Year => format!("DATE_TRUNC({}, YEAR)", field),
        }
    }

    /// Object path segment naming the partition that holds `value`.
    ///
    /// Accepts DATE, DATETIME and TIMESTAMP literals; timestamps with an
    /// offset are normalized to UTC. Returns `None` for anything else.
    pub fn path_segment(&self, value: &str) -> Option<String> {
        let at = parse_partition_value(value.trim())?;
        let format = match self {
            PartitionType::Hour => "%Y-%m-%dT%H",
            PartitionType::Day => "%Y-%m-%d",
            PartitionType::Month => "%Y-%m",
            PartitionType::Year => "%Y",
        };
        Some(at.format(format).to_string())
    }
}

fn parse_partition_value(value: &str) -> Option<NaiveDateTime> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.naive_utc());
    }

    let naive = value.strip_suffix(" UTC").unwrap_or(value);
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(naive, format).ok())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Labels {
    #[serde(default)]
    pub incremental: bool,
    #[serde(default)]
    pub incremental_export: Option<bool>,
    #[serde(default)]
    pub public_json: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimePartitioning {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(rename = "type", default)]
    pub partition_type: PartitionType,
    #[serde(default)]
    pub require_partition_filter: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BigQueryMetadata {
    #[serde(default)]
    pub time_partitioning: Option<TimePartitioning>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryMetadata {
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub bigquery: Option<BigQueryMetadata>,
}

impl QueryMetadata {
    pub fn is_incremental(&self) -> bool {
        self.labels.incremental
    }

    pub fn is_incremental_export(&self) -> bool {
        self.labels.incremental_export.unwrap_or(self.labels.incremental)
    }

    pub fn is_public_json(&self) -> bool {
        self.labels.public_json.unwrap_or(true)
    }

    fn time_partitioning(&self) -> Option<&TimePartitioning> {
        self.bigquery.as_ref().and_then(|bq| bq.time_partitioning.as_ref())
    }

    pub fn partition_field(&self) -> &str {
        self.time_partitioning()
            .and_then(|tp| tp.field.as_deref())
            .unwrap_or(DEFAULT_PARTITION_FIELD)
    }

    pub fn partition_type(&self) -> PartitionType {
        self.time_partitioning()
            .map(|tp| tp.partition_type)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct QueryDefinition {
    pub identity: QueryIdentity,
    pub path: PathBuf,
    pub sql: String,
    pub metadata: Option<QueryMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_path_segment() {
        assert_eq!(PartitionType::Day.path_segment("2020-03-15").as_deref(), Some("2020-03-15"));
        assert_eq!(
            PartitionType::Day.path_segment("2020-03-15 10:30:00").as_deref(),
            Some("2020-03-15")
        );
        assert_eq!(
            PartitionType::Hour.path_segment("2020-03-15T10:30:00.123").as_deref(),
            Some("2020-03-15T10")
        );
        assert_eq!(
            PartitionType::Hour.path_segment("2020-03-15T23:30:00-02:00").as_deref(),
            Some("2020-03-16T01")
        );
        assert_eq!(
            PartitionType::Day.path_segment("2020-03-15 10:30:00 UTC").as_deref(),
            Some("2020-03-15")
        );
        assert_eq!(PartitionType::Month.path_segment("2020-03-15").as_deref(), Some("2020-03"));
        assert_eq!(PartitionType::Year.path_segment("2020-03-15").as_deref(), Some("2020"));
        assert_eq!(PartitionType::Day.path_segment("yesterday"), None);
    }

    #[test]
    fn test_identity_from_query_path() {
        let id = QueryIdentity::from_query_path("sql/test/incremental_query_v1/query.sql").unwrap();
        assert_eq!(id.namespace, "test");
        assert_eq!(id.table, "incremental_query");
        assert_eq!(id.version, 1);
        assert_eq!(id.versioned_table(), "incremental_query_v1");
        assert_eq!(id.to_string(), "test.incremental_query_v1");
    }

    #[test]
    fn test_identity_multi_digit_version() {
        let id = QueryIdentity::from_query_path("/abs/telemetry/daily_active_users_v12/query.sql").unwrap();
        assert_eq!(id.namespace, "telemetry");
        assert_eq!(id.table, "daily_active_users");
        assert_eq!(id.version, 12);
    }

    #[test]
    fn test_identity_rejects_bad_paths() {
        for path in [
            "sql/test/incremental_query/query.sql",
            "sql/test/incremental_query_v1/other.sql",
            "query.sql",
            "incremental_query_v1/query.sql",
        ] {
            let err = QueryIdentity::from_query_path(path).unwrap_err();
            assert!(matches!(err, PublishError::InvalidQueryPath(_)), "{path}");
        }
    }

    #[test]
    fn test_metadata_defaults() {
        let metadata: QueryMetadata = serde_yaml::from_str("friendly_name: Test").unwrap();
        assert!(!metadata.is_incremental());
        assert!(!metadata.is_incremental_export());
        assert!(metadata.is_public_json());
        assert_eq!(metadata.partition_field(), "submission_date");
        assert_eq!(metadata.partition_type(), PartitionType::Day);
    }

    #[test]
    fn test_metadata_incremental_export_follows_incremental() {
        let yaml = "labels:\n  incremental: true\n";
        let metadata: QueryMetadata = serde_yaml::from_str(yaml).unwrap();
        assert!(metadata.is_incremental());
        assert!(metadata.is_incremental_export());

        let yaml = "labels:\n  incremental: true\n  incremental_export: false\n";
        let metadata: QueryMetadata = serde_yaml::from_str(yaml).unwrap();
        assert!(metadata.is_incremental());
        assert!(!metadata.is_incremental_export());
    }

    #[test]
    fn test_metadata_time_partitioning() {
        let yaml = r#"
labels:
  incremental: true
  review_bug: "1234"
bigquery:
  time_partitioning:
    field: d
    type: MONTH
    require_partition_filter: false
"#;
        let metadata: QueryMetadata = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(metadata.partition_field(), "d");
        assert_eq!(metadata.partition_type(), PartitionType::Month);
    }

    #[test]
    fn test_partition_expression() {
        assert_eq!(PartitionType::Day.partition_expression("d"), "d");
        assert_eq!(PartitionType::Hour.partition_expression("ts"), "TIMESTAMP_TRUNC(ts, HOUR)");
        assert_eq!(PartitionType::Month.partition_expression("d"), "DATE_TRUNC(d, MONTH)");
    }
}
