//! Row cursor over a MySQL protocol result.
//!
//! The result borrows its connection, so a background task owns both and
//! forwards rows over a bounded channel. Closing the cursor cancels the task,
//! which drops the connection back into the pool.

use mysql_async::prelude::{Protocol, Queryable};
use mysql_async::{Column, Conn, Params, QueryResult, Row, Value as MyValue};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::context::QueryContext;
use crate::error::{ClientError, ClientResult};
use crate::normalize::mysql::from_mysql;
use crate::schema::{Schema, TypeCode};
use crate::value::Value;

/// Rows buffered between the reader task and the cursor.
const ROW_BUFFER: usize = 256;

pub struct SqlRows {
    columns: Vec<String>,
    codes: Vec<TypeCode>,
    rx: mpsc::Receiver<ClientResult<Row>>,
    current: Option<Row>,
    ctx: QueryContext,
    done: bool,
}

impl SqlRows {
    /// Run `sql` on `conn` and return the result schema with a cursor.
    ///
    /// `ctx` belongs to the cursor: closing the cursor cancels it.
    pub(crate) async fn open(
        conn: Conn,
        sql: String,
        params: Params,
        ctx: QueryContext,
    ) -> ClientResult<(Schema, SqlRows)> {
        let (meta_tx, meta_rx) = oneshot::channel();
        let (row_tx, row_rx) = mpsc::channel(ROW_BUFFER);
        tokio::spawn(stream_rows(
            conn,
            sql,
            params,
            ctx.token().clone(),
            meta_tx,
            row_tx,
        ));

        let columns = ctx
            .run(async {
                meta_rx
                    .await
                    .map_err(|_| ClientError::Closed("row stream"))?
            })
            .await;
        let columns = match columns {
            Ok(columns) => columns,
            Err(e) => {
                ctx.cancel();
                return Err(e);
            }
        };

        let schema = Schema::from_mysql(&columns);
        let rows = SqlRows {
            columns: schema.names().map(str::to_string).collect(),
            codes: schema.fields.iter().map(|f| f.code).collect(),
            rx: row_rx,
            current: None,
            ctx,
            done: false,
        };
        Ok((schema, rows))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_row(&self) -> bool {
        self.current.is_some()
    }

    pub async fn next(&mut self) -> ClientResult<bool> {
        if self.done {
            return Ok(false);
        }
        self.current = None;

        let rx = &mut self.rx;
        match self.ctx.run(async { Ok(rx.recv().await) }).await {
            Ok(Some(Ok(row))) => {
                self.current = Some(row);
                Ok(true)
            }
            Ok(None) => {
                self.finish();
                Ok(false)
            }
            Ok(Some(Err(e))) | Err(e) => {
                self.finish();
                Err(e)
            }
        }
    }

    /// Normalized value of column `index` in the current row.
    pub fn value(&self, index: usize) -> ClientResult<Value> {
        let row = self.current.as_ref().ok_or(ClientError::NoCurrentRow)?;
        let (column, code) = self
            .columns
            .get(index)
            .zip(self.codes.get(index))
            .ok_or(ClientError::ScanArity {
                expected: self.columns.len(),
                actual: index + 1,
            })?;
        let raw = row.as_ref(index).cloned().unwrap_or(MyValue::NULL);
        from_mysql(raw, *code, column)
    }

    fn finish(&mut self) {
        self.current = None;
        self.done = true;
        self.ctx.cancel();
        self.rx.close();
    }

    /// Idempotent. Safe before the first `next`.
    pub fn close(&mut self) {
        self.finish();
    }
}

impl Drop for SqlRows {
    fn drop(&mut self) {
        self.ctx.cancel();
    }
}

async fn stream_rows(
    mut conn: Conn,
    sql: String,
    params: Params,
    token: CancellationToken,
    meta: oneshot::Sender<ClientResult<Vec<Column>>>,
    rows: mpsc::Sender<ClientResult<Row>>,
) {
    match params {
        Params::Empty => match conn.query_iter(sql).await {
            Ok(result) => forward(result, token, meta, rows).await,
            Err(e) => {
                let _ = meta.send(Err(ClientError::classify_mysql(e)));
            }
        },
        params => match conn.exec_iter(sql, params).await {
            Ok(result) => forward(result, token, meta, rows).await,
            Err(e) => {
                let _ = meta.send(Err(ClientError::classify_mysql(e)));
            }
        },
    }
}

async fn forward<P: Protocol>(
    mut result: QueryResult<'_, 'static, P>,
    token: CancellationToken,
    meta: oneshot::Sender<ClientResult<Vec<Column>>>,
    rows: mpsc::Sender<ClientResult<Row>>,
) {
    let columns = result
        .columns()
        .map(|columns| columns.to_vec())
        .unwrap_or_default();
    if meta.send(Ok(columns)).is_err() {
        return;
    }

    loop {
        let next = tokio::select! {
            _ = token.cancelled() => return,
            next = result.next() => next,
        };
        let item = match next {
            Ok(Some(row)) => Ok(row),
            Ok(None) => return,
            Err(e) => Err(ClientError::classify_mysql(e)),
        };
        let last = item.is_err();
        tokio::select! {
            _ = token.cancelled() => return,
            sent = rows.send(item) => {
                if sent.is_err() || last {
                    return;
                }
            }
        }
    }
}
