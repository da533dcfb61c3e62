use async_trait::async_trait;
use std::fmt;
use crate::error::Result;
use crate::query::{Parameter, QueryIdentity};

/// A decoded result row, keyed by column name in schema order.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableId {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableId {
    pub fn new(project: impl Into<String>, dataset: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }

    /// The table a versioned query writes to: `<project>.<namespace>.<table>_v<N>`.
    pub fn destination(project: impl Into<String>, identity: &QueryIdentity) -> Self {
        Self::new(project, identity.namespace.as_str(), identity.versioned_table())
    }

    /// Backquoted reference usable in Standard SQL.
    pub fn sql_ref(&self) -> String {
        format!("`{}`", self)
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

#[derive(Debug, Clone)]
pub struct QueryJob {
    pub sql: String,
    pub parameters: Vec<Parameter>,
}

impl QueryJob {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: &[Parameter]) -> Self {
        self.parameters = parameters.to_vec();
        self
    }
}

/// A finished query job whose results can be paged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ResultPage {
    pub rows: Vec<Row>,
    pub next_page_token: Option<String>,
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    fn project_id(&self) -> &str;

    /// Submits the job and waits until it reaches a terminal state.
    async fn run_query(&self, job: &QueryJob) -> Result<JobHandle>;

    async fn fetch_page(
        &self,
        job: &JobHandle,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<ResultPage>;

    async fn drop_table(&self, table: &TableId) -> Result<()>;

    async fn table_exists(&self, table: &TableId) -> Result<bool>;
}
