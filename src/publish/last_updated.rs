use bytes::Bytes;
use chrono::{DateTime, Utc};
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use std::sync::Arc;
use tracing::info;
use crate::error::{PublishError, Result};

pub const LAST_UPDATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct LastUpdatedRecorder {
    store: Arc<dyn ObjectStore>,
}

impl LastUpdatedRecorder {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn format_timestamp(at: DateTime<Utc>) -> String {
        at.format(LAST_UPDATED_FORMAT).to_string()
    }

    /// Writes `"YYYY-MM-DD HH:MM:SS"` (a JSON string) to `path` and returns
    /// the timestamp written.
    pub async fn record(&self, path: &Path, at: DateTime<Utc>) -> Result<String> {
        let timestamp = Self::format_timestamp(at);
        let body = serde_json::to_vec(&timestamp)?;

        self.store
            .put(path, PutPayload::from(Bytes::from(body)))
            .await
            .map_err(|e| PublishError::storage(path.as_ref(), e))?;

        info!("Recorded last_updated {} at {}", timestamp, path);
        Ok(timestamp)
    }
}
