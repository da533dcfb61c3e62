use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::ObjectStore;
use std::sync::Arc;
use crate::error::{PublishError, Result};

/// Cloud Storage backend for `bucket`; credentials come from the environment
/// (`GOOGLE_APPLICATION_CREDENTIALS` and friends).
pub fn gcs_store(bucket: &str) -> Result<Arc<dyn ObjectStore>> {
    let bucket = bucket.trim_start_matches("gs://").trim_end_matches('/');
    if bucket.is_empty() {
        return Err(PublishError::Config("target bucket name is empty".into()));
    }

    let store = GoogleCloudStorageBuilder::from_env()
        .with_bucket_name(bucket)
        .build()
        .map_err(|e| PublishError::Config(format!("GCS: {e}")))?;

    Ok(Arc::new(store))
}
