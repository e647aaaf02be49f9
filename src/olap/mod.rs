//! Connection facade over both transports.
//!
//! A [`Connection`] owns the MySQL pool and, when configured, the Flight
//! path. Each query is routed by [`select_transport`]: bound arguments need
//! the MySQL protocol, everything else goes over Flight when it is available.

pub mod bulk;
pub mod sql;
pub mod transport;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

pub use bulk::BulkPath;
pub use sql::{quote_ident, SqlPath};
pub use transport::{select_transport, Transport};

use crate::config::{ConnectionConfig, PoolSettings, TransportKind};
use crate::context::QueryContext;
use crate::cursor::Rows;
use crate::error::{ClientError, ClientResult, TransportPath};
use crate::schema::Schema;
use crate::value::{ScanDest, Value};

/// A SQL statement with positional arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub query: String,
    pub args: Vec<Value>,
    /// Only plan the statement (`EXPLAIN`), never run it.
    pub dry_run: bool,
}

impl Statement {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Append one positional argument.
    pub fn bind(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

type Cleanup = Box<dyn FnOnce() + Send>;

/// Schema and rows of one query.
///
/// Closing the result releases what the query holds on the cluster. A
/// result that is dropped without `close` is closed on drop.
pub struct QueryResult {
    pub schema: Schema,
    pub rows: Rows,
    cleanup: Option<Cleanup>,
}

impl QueryResult {
    pub fn new(schema: Schema, rows: Rows) -> Self {
        Self {
            schema,
            rows,
            cleanup: None,
        }
    }

    /// No columns, no rows.
    pub fn empty() -> Self {
        Self::new(Schema::empty(), Rows::Empty)
    }

    /// Run `cleanup` exactly once, when the result is closed.
    pub fn with_cleanup(mut self, cleanup: impl FnOnce() + Send + 'static) -> Self {
        self.cleanup = Some(Box::new(cleanup));
        self
    }

    pub async fn next(&mut self) -> ClientResult<bool> {
        self.rows.next().await
    }

    pub fn scan(&self, dest: &mut [&mut dyn ScanDest]) -> ClientResult<()> {
        self.rows.scan(dest)
    }

    pub fn map_scan(&self, dest: &mut HashMap<String, Value>) -> ClientResult<()> {
        self.rows.map_scan(dest)
    }

    /// Idempotent.
    pub fn close(&mut self) {
        self.rows.close();
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

impl Drop for QueryResult {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResult")
            .field("schema", &self.schema)
            .field("columns", &self.rows.columns())
            .field("cleanup", &self.cleanup.is_some())
            .finish()
    }
}

/// Handle to a cluster. Cheap to clone; clones share pools and the governor.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    config: ConnectionConfig,
    sql: SqlPath,
    bulk: Option<BulkPath>,
    closed: AtomicBool,
}

impl Connection {
    /// Open a connection with default pool settings.
    pub async fn open(config: ConnectionConfig) -> ClientResult<Self> {
        Self::open_with(config, &PoolSettings::default(), &QueryContext::new()).await
    }

    /// Validate `config`, check the MySQL protocol with a ping and, for the
    /// Flight transport, connect the coordinator and run the self-check.
    pub async fn open_with(
        config: ConnectionConfig,
        settings: &PoolSettings,
        ctx: &QueryContext,
    ) -> ClientResult<Self> {
        config.validate()?;
        let sql = SqlPath::new(&config, settings)?;
        if let Err(e) = sql.ping(ctx).await {
            let _ = sql.close().await;
            return Err(match e {
                ClientError::Cancelled | ClientError::DeadlineExceeded => e,
                other => ClientError::Connectivity {
                    path: TransportPath::Sql,
                    message: other.to_string(),
                },
            });
        }

        let bulk = match config.transport {
            TransportKind::Flight => match BulkPath::connect(&config, ctx).await {
                Ok(bulk) => Some(bulk),
                Err(e) => {
                    let _ = sql.close().await;
                    return Err(e);
                }
            },
            TransportKind::Mysql => None,
        };

        debug!(transport = config.transport.as_str(), "connection open");
        Ok(Self::from_parts(config, sql, bulk))
    }

    /// Assemble a connection from already built paths, skipping every check.
    pub fn from_parts(config: ConnectionConfig, sql: SqlPath, bulk: Option<BulkPath>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                sql,
                bulk,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    pub fn bulk(&self) -> Option<&BulkPath> {
        self.inner.bulk.as_ref()
    }

    /// Transport a query with `args` would use.
    pub fn transport_for(&self, args: &[Value]) -> Transport {
        select_transport(args, self.inner.bulk.is_some())
    }

    fn ensure_open(&self) -> ClientResult<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(ClientError::Closed("connection"));
        }
        Ok(())
    }

    /// Run a query and return a cursor over its rows.
    pub async fn query(&self, ctx: &QueryContext, stmt: &Statement) -> ClientResult<QueryResult> {
        self.ensure_open()?;
        let query_id = Uuid::new_v4().to_string();
        let transport = self.transport_for(&stmt.args);
        if self.inner.config.log_queries {
            info!(
                query_id = %query_id,
                sql = %stmt.query,
                args = ?stmt.args,
                transport = ?transport,
                dry_run = stmt.dry_run,
                "query"
            );
        }

        if stmt.dry_run {
            let explain = format!("EXPLAIN {}", stmt.query);
            self.inner.sql.exec(ctx, &explain, &stmt.args).await?;
            return Ok(QueryResult::empty());
        }

        match (transport, &self.inner.bulk) {
            (Transport::Flight, Some(bulk)) => bulk.query(ctx, &stmt.query, &query_id).await,
            _ => {
                let (schema, rows) = self.inner.sql.query(ctx, &stmt.query, &stmt.args).await?;
                Ok(QueryResult::new(schema, rows))
            }
        }
    }

    /// Result schema of `sql` without fetching any row.
    pub async fn query_schema(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[Value],
    ) -> ClientResult<Schema> {
        let stmt = Statement::new(schema_query(sql)).with_args(args.to_vec());
        let mut result = self.query(ctx, &stmt).await?;
        result.close();
        Ok(std::mem::replace(&mut result.schema, Schema::empty()))
    }

    /// Run a statement for its side effects, always over the MySQL protocol.
    pub async fn exec(&self, ctx: &QueryContext, stmt: &Statement) -> ClientResult<()> {
        self.ensure_open()?;
        if self.inner.config.log_queries {
            info!(sql = %stmt.query, args = ?stmt.args, dry_run = stmt.dry_run, "exec");
        }
        if stmt.dry_run {
            let explain = format!("EXPLAIN {}", stmt.query);
            return self.inner.sql.exec(ctx, &explain, &stmt.args).await;
        }
        self.inner.sql.exec(ctx, &stmt.query, &stmt.args).await
    }

    pub async fn ping(&self, ctx: &QueryContext) -> ClientResult<()> {
        self.ensure_open()?;
        self.inner.sql.ping(ctx).await
    }

    /// Close the Flight clients and the MySQL pool. Idempotent.
    pub async fn close(&self) -> ClientResult<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(bulk) = &self.inner.bulk {
            bulk.close().await;
        }
        self.inner.sql.close().await
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("transport", &self.inner.config.transport)
            .field("bulk", &self.inner.bulk.is_some())
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .finish()
    }
}

/// Wrap `sql` so it plans normally but returns no rows.
pub fn schema_query(sql: &str) -> String {
    format!(
        "SELECT * FROM ({}) AS _schema_query LIMIT 0",
        sql.trim().trim_end_matches(';')
    )
}
