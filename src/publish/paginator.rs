use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;
use crate::config::ShardLimits;
use crate::error::Result;
use crate::executor::{JobHandle, Row, Warehouse};

#[derive(Debug, Clone)]
pub struct ResultShard {
    pub index: usize,
    pub rows: Vec<Row>,
}

enum Cursor {
    Start,
    Token(String),
    Done,
}

/// Reads a finished job page by page and regroups its rows into shards.
///
/// Shards come out in source order with indices `0, 1, 2, ...`; once
/// `next_shard` returns `None` the paginator is spent.
pub struct ResultPaginator {
    warehouse: Arc<dyn Warehouse>,
    job: JobHandle,
    page_size: u32,
    limits: ShardLimits,
    cursor: Cursor,
    buffer: VecDeque<Row>,
    next_index: usize,
}

impl ResultPaginator {
    pub fn new(warehouse: Arc<dyn Warehouse>, job: JobHandle, page_size: u32, limits: ShardLimits) -> Self {
        Self {
            warehouse,
            job,
            page_size,
            limits,
            cursor: Cursor::Start,
            buffer: VecDeque::new(),
            next_index: 0,
        }
    }

    async fn fill_buffer(&mut self) -> Result<bool> {
        while self.buffer.is_empty() {
            let token = match &self.cursor {
                Cursor::Done => return Ok(false),
                Cursor::Start => None,
                Cursor::Token(t) => Some(t.as_str()),
            };

            let page = self.warehouse.fetch_page(&self.job, token, self.page_size).await?;
            debug!("Fetched page of {} rows for job {}", page.rows.len(), self.job.job_id);

            self.cursor = match page.next_page_token {
                Some(t) => Cursor::Token(t),
                None => Cursor::Done,
            };
            self.buffer.extend(page.rows);
        }
        Ok(true)
    }

    pub async fn next_shard(&mut self) -> Result<Option<ResultShard>> {
        let mut rows = Vec::new();
        let mut bytes = 0usize;

        while rows.len() < self.limits.max_rows {
            if !self.fill_buffer().await? {
                break;
            }

            let Some(row) = self.buffer.front() else {
                break;
            };
            let size = serialized_len(row)?;
            if !rows.is_empty() && bytes + size > self.limits.max_bytes {
                break;
            }

            bytes += size;
            if let Some(row) = self.buffer.pop_front() {
                rows.push(row);
            }
        }

        if rows.is_empty() {
            return Ok(None);
        }

        let shard = ResultShard {
            index: self.next_index,
            rows,
        };
        self.next_index += 1;
        Ok(Some(shard))
    }
}

/// Size of the row as one NDJSON line, newline included.
pub fn serialized_len(row: &Row) -> Result<usize> {
    Ok(serde_json::to_vec(row)?.len() + 1)
}
