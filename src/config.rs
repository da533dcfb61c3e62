use crate::error::{PublishError, Result};
use crate::executor::ScratchConfig;

pub const DEFAULT_API_VERSION: &str = "v1";
pub const DEFAULT_PAGE_SIZE: u32 = 10_000;
pub const DEFAULT_MAX_ROWS_PER_SHARD: usize = 1_000_000;
pub const DEFAULT_MAX_SHARD_BYTES: usize = 1024 * 1024 * 1024;

/// Shard boundaries, fixed for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardLimits {
    pub max_rows: usize,
    pub max_bytes: usize,
}

impl Default for ShardLimits {
    fn default() -> Self {
        Self {
            max_rows: DEFAULT_MAX_ROWS_PER_SHARD,
            max_bytes: DEFAULT_MAX_SHARD_BYTES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Destination {
    pub project_id: String,
    pub bucket: String,
}

#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub project_id: Option<String>,
    pub target_bucket: Option<String>,
    pub api_version: String,
    pub scratch: ScratchConfig,
    pub shard_limits: ShardLimits,
    pub page_size: u32,
}

impl PublishConfig {
    pub fn new() -> Self {
        Self {
            project_id: None,
            target_bucket: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            scratch: ScratchConfig::default(),
            shard_limits: ShardLimits::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.target_bucket = Some(bucket.into());
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_scratch(mut self, scratch: ScratchConfig) -> Self {
        self.scratch = scratch;
        self
    }

    pub fn with_shard_limits(mut self, limits: ShardLimits) -> Self {
        self.shard_limits = limits;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.shard_limits.max_rows == 0 {
            return Err(PublishError::Config("max rows per shard must be greater than 0".into()));
        }
        if self.shard_limits.max_bytes == 0 {
            return Err(PublishError::Config("max shard bytes must be greater than 0".into()));
        }
        if self.page_size == 0 {
            return Err(PublishError::Config("page size must be greater than 0".into()));
        }
        if i32::try_from(self.page_size).is_err() {
            return Err(PublishError::Config(format!(
                "page size {} exceeds the maximum of {}",
                self.page_size,
                i32::MAX
            )));
        }
        if self.api_version.is_empty() || self.api_version.contains('/') {
            return Err(PublishError::Config(format!("invalid api version '{}'", self.api_version)));
        }
        Ok(())
    }

    /// Project and bucket are only needed once a query turns out to be publishable.
    pub fn require_destination(&self) -> Result<Destination> {
        let project_id = self.project_id.clone().filter(|p| !p.is_empty())
            .ok_or_else(|| PublishError::Config("--project_id is required to publish this query".into()))?;
        let bucket = self.target_bucket.clone().filter(|b| !b.is_empty())
            .ok_or_else(|| PublishError::Config("--target_bucket is required to publish this query".into()))?;

        Ok(Destination { project_id, bucket })
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self::new()
    }
}
