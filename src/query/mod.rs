mod definition;
mod loader;
mod parameter;
mod resolver;

pub use definition::{
    QueryDefinition, QueryIdentity, QueryMetadata, Labels, BigQueryMetadata, TimePartitioning,
    PartitionType, QUERY_FILE, METADATA_FILE, DEFAULT_PARTITION_FIELD,
};
pub use loader::QueryLoader;
pub use parameter::{Parameter, ScalarType};
pub use resolver::{QueryMetadataResolver, QueryMode, ExportMode, AdHocReason, PartitionValue};
