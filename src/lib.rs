pub mod config;
pub mod error;
pub mod executor;
pub mod publish;
pub mod query;

pub use config::{PublishConfig, ShardLimits, Destination};
pub use error::{PublishError, BigQueryError, Result};
pub use executor::{BqClient, ExecutionPlan, ExecutionStrategy, QueryExecutor, ScratchConfig, ScratchTable, TempArtifactCleaner, Warehouse};
pub use publish::{
    PublishOrchestrator, PublishReport, ResultPaginator, ResultShard, JsonShardWriter,
    LastUpdatedRecorder, StorageLayout, gcs_store,
};
pub use query::{
    QueryDefinition, QueryIdentity, QueryMetadata, QueryLoader, QueryMetadataResolver,
    QueryMode, ExportMode, AdHocReason, Parameter, ScalarType,
};
