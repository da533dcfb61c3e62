use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info};
use crate::error::{PublishError, Result};
use super::paginator::ResultShard;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_ENCODING_GZIP: &str = "gzip";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenShard {
    pub path: Path,
    pub rows: usize,
    pub bytes: usize,
}

pub struct JsonShardWriter {
    store: Arc<dyn ObjectStore>,
    content_headers: bool,
}

impl JsonShardWriter {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            content_headers: true,
        }
    }

    /// Stores without object attributes, for backends that reject them.
    pub fn without_content_headers(mut self) -> Self {
        self.content_headers = false;
        self
    }

    /// Newline-delimited JSON, one object per row, gzip-compressed as a whole.
    pub fn encode_shard(shard: &ResultShard) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        for row in &shard.rows {
            serde_json::to_writer(&mut encoder, row)?;
            encoder.write_all(b"\n")?;
        }
        Ok(encoder.finish()?)
    }

    fn put_options(&self) -> PutOptions {
        let mut attributes = Attributes::new();
        if self.content_headers {
            attributes.insert(Attribute::ContentType, CONTENT_TYPE_JSON.into());
            attributes.insert(Attribute::ContentEncoding, CONTENT_ENCODING_GZIP.into());
        }
        PutOptions {
            attributes,
            ..Default::default()
        }
    }

    pub async fn write_shard(&self, path: &Path, shard: &ResultShard) -> Result<WrittenShard> {
        let body = Self::encode_shard(shard)?;
        let bytes = body.len();

        self.store
            .put_opts(path, PutPayload::from(Bytes::from(body)), self.put_options())
            .await
            .map_err(|e| PublishError::storage(path.as_ref(), e))?;

        debug!("Wrote shard {} ({} rows, {} bytes) to {}", shard.index, shard.rows.len(), bytes, path);

        Ok(WrittenShard {
            path: path.clone(),
            rows: shard.rows.len(),
            bytes,
        })
    }

    /// Deletes objects directly under `prefix` that this run did not write.
    /// Nested prefixes (other partitions) are left alone.
    pub async fn prune_stale(&self, prefix: &Path, written: &[WrittenShard]) -> Result<Vec<Path>> {
        let keep: HashSet<&Path> = written.iter().map(|w| &w.path).collect();

        let listing = self.store
            .list_with_delimiter(Some(prefix))
            .await
            .map_err(|e| PublishError::storage(prefix.as_ref(), e))?;

        let mut pruned = Vec::new();
        for object in listing.objects {
            if keep.contains(&object.location) {
                continue;
            }
            self.store
                .delete(&object.location)
                .await
                .map_err(|e| PublishError::storage(object.location.as_ref(), e))?;
            pruned.push(object.location);
        }

        if !pruned.is_empty() {
            info!("Pruned {} stale object(s) under {}", pruned.len(), prefix);
        }
        Ok(pruned)
    }
}
