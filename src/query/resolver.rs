use tracing::info;
use crate::error::{PublishError, Result};
use super::definition::{PartitionType, QueryDefinition};
use super::parameter::Parameter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    /// One shard set per partition value.
    Incremental,
    /// A single shard set regardless of partitioning.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdHocReason {
    NoMetadata,
    NotPublic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionValue {
    pub field: String,
    pub partition_type: PartitionType,
    pub parameter: Parameter,
    segment: String,
}

impl PartitionValue {
    /// Fails when the parameter is not a date or time the partition type can
    /// name, e.g. `submission_date:STRING:yesterday`.
    pub fn new(field: impl Into<String>, partition_type: PartitionType, parameter: Parameter) -> Result<Self> {
        let field = field.into();
        let segment = partition_type.path_segment(&parameter.value).ok_or_else(|| {
            PublishError::InvalidParameter(format!(
                "'{}' does not name a partition of '{}' (expected a DATE, DATETIME or TIMESTAMP value)",
                parameter.value, field
            ))
        })?;

        Ok(Self {
            field,
            partition_type,
            parameter,
            segment,
        })
    }

    pub fn value(&self) -> &str {
        &self.parameter.value
    }

    /// `2020-03-15` for day partitions, `2020-03-15T10` for hourly ones.
    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// `2020-03-15` -> `20200315`, used in scratch table names.
    pub fn compact(&self) -> String {
        self.parameter
            .value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryMode {
    Incremental {
        partition: PartitionValue,
        export: ExportMode,
    },
    NonIncremental,
    AdHoc {
        reason: AdHocReason,
    },
}

impl QueryMode {
    pub fn is_publishable(&self) -> bool {
        !matches!(self, QueryMode::AdHoc { .. })
    }

    /// The partition path segment, present only for incremental exports.
    pub fn partition_segment(&self) -> Option<&str> {
        match self {
            QueryMode::Incremental { partition, export: ExportMode::Incremental } => {
                Some(partition.segment())
            }
            _ => None,
        }
    }

    pub fn partition(&self) -> Option<&PartitionValue> {
        match self {
            QueryMode::Incremental { partition, .. } => Some(partition),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Incremental { export: ExportMode::Incremental, .. } => "incremental",
            QueryMode::Incremental { export: ExportMode::Full, .. } => "incremental (full export)",
            QueryMode::NonIncremental => "non-incremental",
            QueryMode::AdHoc { .. } => "ad-hoc",
        }
    }
}

pub struct QueryMetadataResolver;

impl QueryMetadataResolver {
    pub fn resolve(definition: &QueryDefinition, parameters: &[Parameter]) -> Result<QueryMode> {
        let metadata = match &definition.metadata {
            Some(m) => m,
            None => {
                info!("{} has no metadata; it will not be published", definition.identity);
                return Ok(QueryMode::AdHoc { reason: AdHocReason::NoMetadata });
            }
        };

        if !metadata.is_public_json() {
            info!("{} is not labeled public_json; it will not be published", definition.identity);
            return Ok(QueryMode::AdHoc { reason: AdHocReason::NotPublic });
        }

        if !metadata.is_incremental() {
            return Ok(QueryMode::NonIncremental);
        }

        let field = metadata.partition_field();
        let parameter = parameters
            .iter()
            .find(|p| p.name == field)
            .ok_or_else(|| PublishError::MissingParameter {
                query: definition.identity.to_string(),
                field: field.to_string(),
            })?;

        let export = if metadata.is_incremental_export() {
            ExportMode::Incremental
        } else {
            ExportMode::Full
        };

        Ok(QueryMode::Incremental {
            partition: PartitionValue::new(field, metadata.partition_type(), parameter.clone())?,
            export,
        })
    }
}
