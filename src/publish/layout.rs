use object_store::path::Path;
use crate::query::QueryIdentity;

const FILES_DIR: &str = "files";
const LAST_UPDATED: &str = "last_updated";

/// Object paths under `api/<version>/tables/<namespace>/<table>/v<N>/`.
///
/// Every path is a pure function of its inputs, so republishing the same
/// query and partition overwrites the same objects.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    api_version: String,
    identity: QueryIdentity,
}

impl StorageLayout {
    pub fn new(api_version: impl Into<String>, identity: QueryIdentity) -> Self {
        Self {
            api_version: api_version.into(),
            identity,
        }
    }

    pub fn table_root(&self) -> Path {
        let version = format!("v{}", self.identity.version);
        Path::from_iter([
            "api",
            self.api_version.as_str(),
            "tables",
            self.identity.namespace.as_str(),
            self.identity.table.as_str(),
            version.as_str(),
        ])
    }

    fn under(&self, dir: &str, partition: Option<&str>) -> Path {
        let base = self.table_root().child(dir);
        match partition.filter(|p| !p.is_empty()) {
            Some(partition) => base.child(partition),
            None => base,
        }
    }

    pub fn files_prefix(&self, partition: Option<&str>) -> Path {
        self.under(FILES_DIR, partition)
    }

    pub fn shard_path(&self, partition: Option<&str>, index: usize) -> Path {
        self.files_prefix(partition).child(shard_file_name(index))
    }

    pub fn last_updated_path(&self, partition: Option<&str>) -> Path {
        self.under(LAST_UPDATED, partition)
    }
}

pub fn shard_file_name(index: usize) -> String {
    format!("{:012}.json", index)
}
