use crate::error::{PublishError, Result};
use crate::query::{ExportMode, PartitionValue, QueryDefinition, QueryIdentity, QueryMode};
use super::scratch::{ScratchConfig, ScratchTable};
use super::warehouse::TableId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// Export the query's destination table as it currently stands.
    ReadTable { table: TableId },
    /// Materialize into a time-partitioned scratch table, then read that table.
    Materialize {
        scratch: ScratchTable,
        partition_expression: String,
    },
}

#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub identity: QueryIdentity,
    pub sql: String,
    pub strategy: ExecutionStrategy,
    pub partition: Option<PartitionValue>,
}

impl ExecutionPlan {
    pub fn for_mode(
        definition: &QueryDefinition,
        mode: &QueryMode,
        scratch: &ScratchConfig,
        project: &str,
    ) -> Result<Self> {
        let strategy = match mode {
            QueryMode::Incremental { partition, export: ExportMode::Incremental } => {
                ExecutionStrategy::Materialize {
                    scratch: ScratchTable::for_run(project, scratch, &definition.identity, partition),
                    partition_expression: partition.partition_type.partition_expression(&partition.field),
                }
            }
            QueryMode::Incremental { export: ExportMode::Full, .. } | QueryMode::NonIncremental => {
                ExecutionStrategy::ReadTable {
                    table: TableId::destination(project, &definition.identity),
                }
            }
            QueryMode::AdHoc { .. } => {
                return Err(PublishError::Config(format!(
                    "{} is not publishable; no execution plan applies",
                    definition.identity
                )));
            }
        };

        Ok(Self {
            identity: definition.identity.clone(),
            sql: definition.sql.clone(),
            strategy,
            partition: mode.partition().cloned(),
        })
    }

    pub fn scratch_table(&self) -> Option<&ScratchTable> {
        match &self.strategy {
            ExecutionStrategy::Materialize { scratch, .. } => Some(scratch),
            ExecutionStrategy::ReadTable { .. } => None,
        }
    }
}
