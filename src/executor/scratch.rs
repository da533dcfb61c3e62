use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::query::{PartitionValue, QueryIdentity};
use super::warehouse::{TableId, Warehouse};

pub const DEFAULT_SCRATCH_DATASET: &str = "tmp";
pub const DEFAULT_SCRATCH_TTL_HOURS: u32 = 24;

#[derive(Debug, Clone)]
pub struct ScratchConfig {
    pub dataset: String,
    pub ttl_hours: u32,
}

impl ScratchConfig {
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            ttl_hours: DEFAULT_SCRATCH_TTL_HOURS,
        }
    }

    pub fn with_ttl(mut self, hours: u32) -> Self {
        self.ttl_hours = hours;
        self
    }
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SCRATCH_DATASET)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchTable {
    pub id: TableId,
    /// Suffix-less name shared by every run of the same query and partition.
    pub sweep_id: TableId,
    pub ttl_hours: u32,
}

impl ScratchTable {
    pub fn sweep_name(identity: &QueryIdentity, partition: &PartitionValue) -> String {
        format!("{}_{}_temp", identity.versioned_table(), partition.compact())
    }

    pub fn for_run(
        project: &str,
        config: &ScratchConfig,
        identity: &QueryIdentity,
        partition: &PartitionValue,
    ) -> Self {
        let sweep_name = Self::sweep_name(identity, partition);
        let suffix = Uuid::new_v4().simple().to_string();
        let name = format!("{}_{}", sweep_name, &suffix[..8]);

        Self {
            id: TableId::new(project, &config.dataset, name),
            sweep_id: TableId::new(project, &config.dataset, sweep_name),
            ttl_hours: config.ttl_hours,
        }
    }
}

/// Owns a scratch table for the duration of a run and drops it on release.
///
/// Cleanup is best-effort: failures are logged and never replace the run's
/// own outcome. A cleaner dropped without `release` schedules the drop on the
/// ambient tokio runtime, if there is one.
pub struct TempArtifactCleaner {
    warehouse: Arc<dyn Warehouse>,
    table: TableId,
    released: bool,
}

impl TempArtifactCleaner {
    pub fn new(warehouse: Arc<dyn Warehouse>, table: TableId) -> Self {
        Self {
            warehouse,
            table,
            released: false,
        }
    }

    pub async fn release(mut self) {
        self.released = true;
        drop_best_effort(self.warehouse.as_ref(), &self.table).await;
    }
}

impl Drop for TempArtifactCleaner {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let table = self.table.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let warehouse = self.warehouse.clone();
                warn!("Scratch table {} was not released; dropping in background", table);
                handle.spawn(async move {
                    drop_best_effort(warehouse.as_ref(), &table).await;
                });
            }
            Err(_) => {
                warn!("Scratch table {} leaked (no runtime to drop it); it expires on its own", table);
            }
        }
    }
}

async fn drop_best_effort(warehouse: &dyn Warehouse, table: &TableId) {
    match warehouse.drop_table(table).await {
        Ok(()) => info!("Removed scratch table {}", table),
        Err(e) => warn!(cleanup_warning = true, "Could not remove scratch table {}: {}", table, e),
    }
}

/// Drops a leftover table from an interrupted run, if one exists.
pub async fn sweep(warehouse: &dyn Warehouse, table: &TableId) {
    match warehouse.table_exists(table).await {
        Ok(true) => {
            info!("Sweeping leftover scratch table {}", table);
            drop_best_effort(warehouse, table).await;
        }
        Ok(false) => debug!("No leftover scratch table {}", table),
        Err(e) => debug!("Sweep of {} skipped: {}", table, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Parameter, PartitionType, ScalarType};

    fn identity() -> QueryIdentity {
        QueryIdentity {
            namespace: "test".into(),
            table: "incremental_query".into(),
            version: 1,
        }
    }

    fn partition() -> PartitionValue {
        PartitionValue::new(
            "submission_date",
            PartitionType::Day,
            Parameter::new("submission_date", ScalarType::Date, "2020-03-15"),
        )
        .unwrap()
    }

    #[test]
    fn test_sweep_name() {
        assert_eq!(
            ScratchTable::sweep_name(&identity(), &partition()),
            "incremental_query_v1_20200315_temp"
        );
    }

    #[test]
    fn test_scratch_table_is_unique_per_run() {
        let config = ScratchConfig::default();
        let a = ScratchTable::for_run("proj", &config, &identity(), &partition());
        let b = ScratchTable::for_run("proj", &config, &identity(), &partition());

        assert_ne!(a.id, b.id);
        assert_eq!(a.sweep_id, b.sweep_id);
        assert_eq!(a.id.dataset, "tmp");
        assert!(a.id.table.starts_with("incremental_query_v1_20200315_temp_"));
        assert_eq!(a.id.table.len(), "incremental_query_v1_20200315_temp_".len() + 8);
        assert_eq!(a.sweep_id.to_string(), "proj.tmp.incremental_query_v1_20200315_temp");
        assert_eq!(a.ttl_hours, 24);
    }

    #[test]
    fn test_scratch_config_overrides() {
        let config = ScratchConfig::new("scratch").with_ttl(2);
        let t = ScratchTable::for_run("proj", &config, &identity(), &partition());
        assert_eq!(t.id.dataset, "scratch");
        assert_eq!(t.ttl_hours, 2);
    }
}
