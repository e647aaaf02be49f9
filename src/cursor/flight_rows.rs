//! Row cursor over Arrow record batches.

use std::collections::VecDeque;
use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use tracing::warn;

use crate::context::QueryContext;
use crate::error::{ClientError, ClientResult};
use crate::flight::{BatchReader, Endpoint, EndpointRouter};
use crate::normalize::arrow::value_at;
use crate::value::Value;

/// Iterates the rows of one or more endpoint streams.
///
/// At most one batch is held: the current batch is dropped before the next
/// one is pulled.
pub struct FlightRows {
    columns: Vec<String>,
    reader: Option<BatchReader>,
    remaining: VecDeque<Endpoint>,
    router: Option<Arc<EndpointRouter>>,
    batch: Option<RecordBatch>,
    row: usize,
    ctx: QueryContext,
    expected_rows: Option<u64>,
    rows_seen: u64,
    done: bool,
}

impl FlightRows {
    /// Cursor over `reader`, reading under `ctx`. Closing the cursor cancels
    /// `ctx`.
    pub fn new(reader: BatchReader, ctx: QueryContext) -> Self {
        let columns = reader
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        Self {
            columns,
            reader: Some(reader),
            remaining: VecDeque::new(),
            router: None,
            batch: None,
            row: 0,
            ctx,
            expected_rows: None,
            rows_seen: 0,
            done: false,
        }
    }

    /// Continue with `remaining` endpoints once the current reader is done.
    pub(crate) fn with_remaining(
        mut self,
        router: Arc<EndpointRouter>,
        remaining: Vec<Endpoint>,
    ) -> Self {
        self.router = Some(router);
        self.remaining = remaining.into();
        self
    }

    /// Row count the coordinator reported, checked when the cursor ends.
    pub(crate) fn expect_rows(mut self, total: Option<u64>) -> Self {
        self.expected_rows = total;
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_row(&self) -> bool {
        self.batch.is_some()
    }

    pub async fn next(&mut self) -> ClientResult<bool> {
        if self.done {
            return Ok(false);
        }

        if let Some(batch) = &self.batch {
            if self.row + 1 < batch.num_rows() {
                self.row += 1;
                self.rows_seen += 1;
                return Ok(true);
            }
        }
        self.batch = None;

        loop {
            match self.pull().await {
                Ok(Some(batch)) if batch.num_rows() == 0 => continue,
                Ok(Some(batch)) => {
                    self.batch = Some(batch);
                    self.row = 0;
                    self.rows_seen += 1;
                    return Ok(true);
                }
                Ok(None) => {
                    self.check_row_count();
                    self.finish();
                    return Ok(false);
                }
                Err(e) => {
                    self.finish();
                    return Err(e);
                }
            }
        }
    }

    async fn pull(&mut self) -> ClientResult<Option<RecordBatch>> {
        loop {
            if let Some(reader) = self.reader.as_mut() {
                let next = self
                    .ctx
                    .run(async { reader.next_batch().await.transpose() })
                    .await?;
                match next {
                    Some(batch) => return Ok(Some(batch)),
                    None => self.reader = None,
                }
            }

            let Some(endpoint) = self.remaining.pop_front() else {
                return Ok(None);
            };
            let Some(router) = self.router.clone() else {
                return Ok(None);
            };
            self.reader = Some(self.ctx.run(router.do_get(&endpoint)).await?);
        }
    }

    fn check_row_count(&self) {
        if let Some(expected) = self.expected_rows {
            if self.rows_seen < expected {
                warn!(
                    expected,
                    received = self.rows_seen,
                    "flight result ended with fewer rows than the coordinator reported"
                );
            }
        }
    }

    /// Normalized value of column `index` in the current row.
    pub fn value(&self, index: usize) -> ClientResult<Value> {
        let batch = self.batch.as_ref().ok_or(ClientError::NoCurrentRow)?;
        let column = self.columns.get(index).ok_or(ClientError::ScanArity {
            expected: self.columns.len(),
            actual: index + 1,
        })?;
        value_at(batch.column(index).as_ref(), self.row, column)
    }

    fn finish(&mut self) {
        self.batch = None;
        self.reader = None;
        self.remaining.clear();
        self.done = true;
        self.ctx.cancel();
    }

    /// Idempotent. Safe before the first `next`.
    pub fn close(&mut self) {
        self.finish();
    }
}

impl Drop for FlightRows {
    fn drop(&mut self) {
        self.ctx.cancel();
    }
}
