mod client;
mod plan;
mod query_executor;
mod rows;
mod scratch;
mod warehouse;

pub use client::BqClient;
pub use plan::{ExecutionPlan, ExecutionStrategy};
pub use query_executor::{QueryExecutor, build_materialize_sql};
pub use rows::decode_rows;
pub use scratch::{
    ScratchConfig, ScratchTable, TempArtifactCleaner, sweep,
    DEFAULT_SCRATCH_DATASET, DEFAULT_SCRATCH_TTL_HOURS,
};
pub use warehouse::{JobHandle, QueryJob, ResultPage, Row, TableId, Warehouse};
