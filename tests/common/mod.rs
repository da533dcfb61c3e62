#![allow(dead_code)]

use async_trait::async_trait;
use bqpublish::error::{BigQueryError, PublishError, Result};
use bqpublish::executor::{JobHandle, QueryJob, ResultPage, Row, TableId, Warehouse};
use flate2::read::GzDecoder;
use futures_util::StreamExt;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub fn fixtures_path() -> &'static Path {
    Path::new("tests/fixtures")
}

pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

#[derive(Default)]
struct State {
    queries: Vec<QueryJob>,
    tables: HashSet<TableId>,
    drop_attempts: Vec<TableId>,
    page_requests: usize,
    existence_checks: usize,
    results: HashMap<String, Vec<Row>>,
}

/// In-memory warehouse: every query returns `rows`, paged by offset tokens,
/// except `SELECT * FROM` a table seeded with `with_table_rows`.
/// `CREATE TABLE` statements register the created table so drops can be checked.
pub struct MemoryWarehouse {
    project: String,
    rows: Vec<Row>,
    table_rows: HashMap<TableId, Vec<Row>>,
    fail_when_sql_contains: Option<String>,
    state: Mutex<State>,
}

impl MemoryWarehouse {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            project: "test-project".to_string(),
            rows,
            table_rows: HashMap::new(),
            fail_when_sql_contains: None,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_table(self, table: TableId) -> Self {
        self.state.lock().unwrap().tables.insert(table);
        self
    }

    pub fn with_table_rows(mut self, table: TableId, rows: Vec<Row>) -> Self {
        self.table_rows.insert(table, rows);
        self
    }

    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_when_sql_contains = Some(needle.to_string());
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.lock().unwrap().queries.iter().map(|q| q.sql.clone()).collect()
    }

    pub fn jobs(&self) -> Vec<QueryJob> {
        self.state.lock().unwrap().queries.clone()
    }

    pub fn live_tables(&self) -> Vec<TableId> {
        self.state.lock().unwrap().tables.iter().cloned().collect()
    }

    pub fn drop_attempts(&self) -> Vec<TableId> {
        self.state.lock().unwrap().drop_attempts.clone()
    }

    pub fn page_requests(&self) -> usize {
        self.state.lock().unwrap().page_requests
    }

    pub fn call_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.queries.len() + state.drop_attempts.len() + state.page_requests + state.existence_checks
    }

    fn created_table(sql: &str) -> Option<TableId> {
        Self::table_after(sql, "CREATE TABLE `")
    }

    fn selected_table(sql: &str) -> Option<TableId> {
        Self::table_after(sql, "SELECT * FROM `")
    }

    fn table_after(sql: &str, prefix: &str) -> Option<TableId> {
        let rest = sql.trim_start().strip_prefix(prefix)?;
        let name = &rest[..rest.find('`')?];
        let parts: Vec<&str> = name.split('.').collect();
        match parts.as_slice() {
            [project, dataset, table] => Some(TableId::new(*project, *dataset, *table)),
            _ => None,
        }
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    fn project_id(&self) -> &str {
        &self.project
    }

    async fn run_query(&self, job: &QueryJob) -> Result<JobHandle> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(job.clone());

        if let Some(needle) = &self.fail_when_sql_contains {
            if job.sql.contains(needle.as_str()) {
                return Err(PublishError::QueryExecution(BigQueryError::InvalidQuery {
                    message: format!("Syntax error: Unexpected identifier \"{}\"", needle),
                    position: None,
                    sql_preview: job.sql.chars().take(100).collect(),
                }));
            }
        }

        if let Some(table) = Self::created_table(&job.sql) {
            state.tables.insert(table);
        }

        let rows = Self::selected_table(&job.sql)
            .and_then(|table| self.table_rows.get(&table))
            .unwrap_or(&self.rows)
            .clone();
        let job_id = format!("job_{}", state.queries.len());
        state.results.insert(job_id.clone(), rows);

        Ok(JobHandle {
            job_id,
            location: Some("US".to_string()),
        })
    }

    async fn fetch_page(&self, job: &JobHandle, page_token: Option<&str>, page_size: u32) -> Result<ResultPage> {
        let mut state = self.state.lock().unwrap();
        state.page_requests += 1;
        let all = &state.results[&job.job_id];

        let offset: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let end = (offset + page_size as usize).min(all.len());
        let rows = all[offset.min(end)..end].to_vec();
        let next_page_token = if end < all.len() { Some(end.to_string()) } else { None };

        Ok(ResultPage { rows, next_page_token })
    }

    async fn drop_table(&self, table: &TableId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.drop_attempts.push(table.clone());
        if state.tables.remove(table) {
            Ok(())
        } else {
            Err(PublishError::QueryExecution(BigQueryError::NotFound {
                resource: table.to_string(),
            }))
        }
    }

    async fn table_exists(&self, table: &TableId) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.existence_checks += 1;
        Ok(state.tables.contains(table))
    }
}

pub async fn list_paths(store: &Arc<dyn ObjectStore>) -> Vec<String> {
    let mut stream = store.list(None);
    let mut paths = Vec::new();
    while let Some(meta) = stream.next().await {
        paths.push(meta.unwrap().location.to_string());
    }
    paths.sort();
    paths
}

pub async fn read_gzip(store: &Arc<dyn ObjectStore>, path: &str) -> String {
    let bytes = store
        .get(&ObjectPath::from(path))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    let mut out = String::new();
    GzDecoder::new(&bytes[..]).read_to_string(&mut out).unwrap();
    out
}

pub async fn read_plain(store: &Arc<dyn ObjectStore>, path: &str) -> String {
    let bytes = store
        .get(&ObjectPath::from(path))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn ndjson_rows(body: &str) -> Vec<Value> {
    body.lines().map(|l| serde_json::from_str(l).unwrap()).collect()
}
