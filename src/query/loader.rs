use std::fs;
use std::path::Path;
use tracing::debug;
use crate::error::{PublishError, Result};
use super::definition::{QueryDefinition, QueryIdentity, QueryMetadata, METADATA_FILE};

pub struct QueryLoader;

impl QueryLoader {
    pub fn new() -> Self {
        Self
    }

    /// Loads `query.sql` and, when present, its sibling `metadata.yaml`.
    pub fn load_query(&self, query_path: impl AsRef<Path>) -> Result<QueryDefinition> {
        let query_path = query_path.as_ref();
        let identity = QueryIdentity::from_query_path(query_path)?;

        let sql = fs::read_to_string(query_path)
            .map_err(|_| PublishError::QueryFileNotFound(query_path.display().to_string()))?;

        let metadata_path = query_path
            .parent()
            .unwrap_or(Path::new("."))
            .join(METADATA_FILE);

        let metadata = if metadata_path.is_file() {
            let yaml_content = fs::read_to_string(&metadata_path)?;
            let metadata: QueryMetadata = serde_yaml::from_str(&yaml_content).map_err(|e| {
                PublishError::Metadata(format!("{}: {}", metadata_path.display(), e))
            })?;
            Some(metadata)
        } else {
            debug!("No {} next to {}", METADATA_FILE, query_path.display());
            None
        };

        Ok(QueryDefinition {
            identity,
            path: query_path.to_path_buf(),
            sql,
            metadata,
        })
    }
}

impl Default for QueryLoader {
    fn default() -> Self {
        Self::new()
    }
}
