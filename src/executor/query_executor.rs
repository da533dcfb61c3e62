use std::sync::Arc;
use tracing::info;
use crate::error::Result;
use crate::query::Parameter;
use super::plan::{ExecutionPlan, ExecutionStrategy};
use super::scratch::{sweep, ScratchTable};
use super::warehouse::{JobHandle, QueryJob, Warehouse};

pub struct QueryExecutor {
    warehouse: Arc<dyn Warehouse>,
}

impl QueryExecutor {
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self { warehouse }
    }

    /// Runs the plan to completion and returns a handle whose pages hold the
    /// rows to publish.
    pub async fn execute(&self, plan: &ExecutionPlan, parameters: &[Parameter]) -> Result<JobHandle> {
        match &plan.strategy {
            ExecutionStrategy::ReadTable { table } => {
                info!("Exporting {} from {}", plan.identity, table);
                let select = QueryJob::new(format!("SELECT * FROM {}", table.sql_ref()));
                self.warehouse.run_query(&select).await
            }
            ExecutionStrategy::Materialize { scratch, partition_expression } => {
                sweep(self.warehouse.as_ref(), &scratch.sweep_id).await;

                info!("Materializing {} into {}", plan.identity, scratch.id);
                let create_sql = build_materialize_sql(scratch, partition_expression, &plan.sql);
                let create = QueryJob::new(create_sql).with_parameters(parameters);
                self.warehouse.run_query(&create).await?;

                let select = QueryJob::new(format!("SELECT * FROM {}", scratch.id.sql_ref()));
                self.warehouse.run_query(&select).await
            }
        }
    }
}

pub fn build_materialize_sql(scratch: &ScratchTable, partition_expression: &str, sql: &str) -> String {
    format!(
        r#"CREATE TABLE {table}
PARTITION BY {partition_expression}
OPTIONS(expiration_timestamp = TIMESTAMP_ADD(CURRENT_TIMESTAMP(), INTERVAL {ttl} HOUR))
AS
{sql}"#,
        table = scratch.id.sql_ref(),
        partition_expression = partition_expression,
        ttl = scratch.ttl_hours,
        sql = sql.trim().trim_end_matches(';'),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::warehouse::TableId;

    #[test]
    fn test_build_materialize_sql() {
        let scratch = ScratchTable {
            id: TableId::new("p", "tmp", "t_v1_20200315_temp_abcd1234"),
            sweep_id: TableId::new("p", "tmp", "t_v1_20200315_temp"),
            ttl_hours: 24,
        };

        let sql = build_materialize_sql(&scratch, "submission_date", "SELECT 1 AS x;\n");
        assert!(sql.starts_with("CREATE TABLE `p.tmp.t_v1_20200315_temp_abcd1234`"));
        assert!(sql.contains("PARTITION BY submission_date"));
        assert!(sql.contains("INTERVAL 24 HOUR"));
        assert!(sql.ends_with("SELECT 1 AS x"));
    }
}
