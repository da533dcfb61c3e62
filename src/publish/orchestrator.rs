use chrono::Utc;
use object_store::path::Path;
use object_store::ObjectStore;
use std::sync::Arc;
use tracing::{debug, error, info};
use crate::config::PublishConfig;
use crate::error::Result;
use crate::executor::{ExecutionPlan, QueryExecutor, TableId, TempArtifactCleaner, Warehouse};
use crate::query::{Parameter, QueryDefinition, QueryMetadataResolver, QueryMode};
use super::last_updated::LastUpdatedRecorder;
use super::layout::StorageLayout;
use super::paginator::ResultPaginator;
use super::shard_writer::{JsonShardWriter, WrittenShard};

#[derive(Debug, Clone)]
pub struct PublishReport {
    pub query: String,
    pub mode: QueryMode,
    pub shards: Vec<WrittenShard>,
    pub rows: usize,
    pub pruned: Vec<Path>,
    pub last_updated: Option<Path>,
    pub last_updated_at: Option<String>,
    pub scratch_table: Option<TableId>,
}

impl PublishReport {
    fn skipped(definition: &QueryDefinition, mode: QueryMode) -> Self {
        Self {
            query: definition.identity.to_string(),
            mode,
            shards: Vec::new(),
            rows: 0,
            pruned: Vec::new(),
            last_updated: None,
            last_updated_at: None,
            scratch_table: None,
        }
    }

    pub fn is_published(&self) -> bool {
        self.last_updated.is_some()
    }
}

struct RunOutput {
    shards: Vec<WrittenShard>,
    pruned: Vec<Path>,
    last_updated: Path,
    last_updated_at: String,
}

pub struct PublishOrchestrator {
    warehouse: Arc<dyn Warehouse>,
    store: Arc<dyn ObjectStore>,
    config: PublishConfig,
    content_headers: bool,
}

impl PublishOrchestrator {
    pub fn new(warehouse: Arc<dyn Warehouse>, store: Arc<dyn ObjectStore>, config: PublishConfig) -> Self {
        Self {
            warehouse,
            store,
            config,
            content_headers: true,
        }
    }

    /// Skips `Content-Type`/`Content-Encoding` attributes on shard objects.
    pub fn without_content_headers(mut self) -> Self {
        self.content_headers = false;
        self
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    pub async fn publish(&self, definition: &QueryDefinition, parameters: &[Parameter]) -> Result<PublishReport> {
        let mode = QueryMetadataResolver::resolve(definition, parameters)?;
        self.publish_mode(definition, parameters, mode).await
    }

    /// Publishes with an already resolved mode. The configuration is checked
    /// before the warehouse is touched. The scratch table, if any, is released
    /// on every exit path before the outcome is returned.
    pub async fn publish_mode(
        &self,
        definition: &QueryDefinition,
        parameters: &[Parameter],
        mode: QueryMode,
    ) -> Result<PublishReport> {
        if !mode.is_publishable() {
            info!("Skipping publish of {} ({})", definition.identity, mode.as_str());
            return Ok(PublishReport::skipped(definition, mode));
        }
        self.config.validate()?;

        info!("Publishing {} as {}", definition.identity, mode.as_str());
        let plan = ExecutionPlan::for_mode(
            definition,
            &mode,
            &self.config.scratch,
            self.warehouse.project_id(),
        )?;

        let scratch_table = plan.scratch_table().map(|s| s.id.clone());
        let cleaner = scratch_table
            .clone()
            .map(|table| TempArtifactCleaner::new(self.warehouse.clone(), table));

        let outcome = self.run_plan(&plan, &mode, parameters).await;

        if let Some(cleaner) = cleaner {
            cleaner.release().await;
        }

        let output = match outcome {
            Ok(output) => output,
            Err(e) => {
                error!("Publish of {} failed: {}", definition.identity, e);
                return Err(e);
            }
        };

        let rows = output.shards.iter().map(|s| s.rows).sum();
        info!(
            "Published {}: {} rows in {} shard(s)",
            definition.identity,
            rows,
            output.shards.len()
        );

        Ok(PublishReport {
            query: definition.identity.to_string(),
            mode,
            shards: output.shards,
            rows,
            pruned: output.pruned,
            last_updated: Some(output.last_updated),
            last_updated_at: Some(output.last_updated_at),
            scratch_table,
        })
    }

    async fn run_plan(&self, plan: &ExecutionPlan, mode: &QueryMode, parameters: &[Parameter]) -> Result<RunOutput> {
        let job = QueryExecutor::new(self.warehouse.clone())
            .execute(plan, parameters)
            .await?;

        let layout = StorageLayout::new(&self.config.api_version, plan.identity.clone());
        let segment = mode.partition_segment();

        let mut writer = JsonShardWriter::new(self.store.clone());
        if !self.content_headers {
            writer = writer.without_content_headers();
        }

        let mut paginator = ResultPaginator::new(
            self.warehouse.clone(),
            job,
            self.config.page_size,
            self.config.shard_limits,
        );

        let mut shards = Vec::new();
        while let Some(shard) = paginator.next_shard().await? {
            let path = layout.shard_path(segment, shard.index);
            shards.push(writer.write_shard(&path, &shard).await?);
        }
        debug!("Wrote {} shard(s) for {}", shards.len(), plan.identity);

        let pruned = writer.prune_stale(&layout.files_prefix(segment), &shards).await?;

        let marker = layout.last_updated_path(segment);
        let last_updated_at = LastUpdatedRecorder::new(self.store.clone())
            .record(&marker, Utc::now())
            .await?;

        Ok(RunOutput {
            shards,
            pruned,
            last_updated: marker,
            last_updated_at,
        })
    }
}
