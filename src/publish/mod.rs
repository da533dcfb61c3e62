mod last_updated;
mod layout;
mod orchestrator;
mod paginator;
mod shard_writer;
mod store;

pub use last_updated::{LastUpdatedRecorder, LAST_UPDATED_FORMAT};
pub use layout::{StorageLayout, shard_file_name};
pub use orchestrator::{PublishOrchestrator, PublishReport};
pub use paginator::{ResultPaginator, ResultShard, serialized_len};
pub use shard_writer::{JsonShardWriter, WrittenShard, CONTENT_ENCODING_GZIP, CONTENT_TYPE_JSON};
pub use store::gcs_store;
