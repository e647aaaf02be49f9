//! MySQL protocol path.

use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder, Pool, PoolConstraints, PoolOpts, SslOpts};
use tracing::debug;

use crate::config::{ConnectionConfig, ConnectionError, PoolSettings};
use crate::context::QueryContext;
use crate::cursor::{Rows, SqlRows};
use crate::error::{ClientError, ClientResult};
use crate::normalize::mysql::to_params;
use crate::schema::Schema;
use crate::value::Value;

/// Pooled MySQL protocol connections to the coordinator.
pub struct SqlPath {
    pool: Pool,
    /// External catalog and the database inside it, switched to on every
    /// checked-out connection.
    catalog: Option<String>,
    database: Option<String>,
}

impl SqlPath {
    /// Build the pool. No connection is made until first use.
    pub fn new(config: &ConnectionConfig, settings: &PoolSettings) -> ClientResult<Self> {
        let endpoint = config.endpoint()?;
        let invalid = |e: crate::config::SettingsError| ConnectionError::InvalidConfig(e.to_string());

        let constraints = PoolConstraints::new(settings.min_conns, settings.max_conns).ok_or_else(
            || {
                ConnectionError::InvalidConfig(format!(
                    "pool bounds {}..{} are invalid",
                    settings.min_conns, settings.max_conns
                ))
            },
        )?;
        let pool_opts = PoolOpts::default()
            .with_constraints(constraints)
            .with_inactive_connection_ttl(settings.idle_timeout().map_err(invalid)?)
            .with_abs_conn_ttl(Some(settings.max_lifetime().map_err(invalid)?));

        let catalog = config.external_catalog().map(str::to_string);
        // Databases of an external catalog only resolve after SET CATALOG.
        let (db_name, database) = match catalog {
            Some(_) => (None, endpoint.database),
            None => (endpoint.database, None),
        };

        let mut opts = OptsBuilder::default()
            .ip_or_hostname(endpoint.host)
            .tcp_port(endpoint.port)
            .user(Some(endpoint.username).filter(|u| !u.is_empty()))
            .pass(Some(endpoint.password).filter(|p| !p.is_empty()))
            .db_name(db_name)
            .prefer_socket(false)
            .pool_opts(pool_opts);
        if config.ssl {
            opts = opts.ssl_opts(SslOpts::default().with_danger_accept_invalid_certs(true));
        }

        Ok(Self {
            pool: Pool::new(opts),
            catalog,
            database,
        })
    }

    async fn conn(&self) -> ClientResult<Conn> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(ClientError::classify_mysql)?;

        if let Some(catalog) = &self.catalog {
            conn.query_drop(format!("SET CATALOG {}", quote_ident(catalog)))
                .await
                .map_err(ClientError::classify_mysql)?;
            if let Some(database) = &self.database {
                conn.query_drop(format!("USE {}", quote_ident(database)))
                    .await
                    .map_err(ClientError::classify_mysql)?;
            }
        }
        Ok(conn)
    }

    /// Run a query and stream its rows.
    pub async fn query(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[Value],
    ) -> ClientResult<(Schema, Rows)> {
        let conn = ctx.run(self.conn()).await?;
        let (schema, rows) =
            SqlRows::open(conn, sql.to_string(), to_params(args), ctx.child()).await?;
        Ok((schema, Rows::Sql(rows)))
    }

    /// Run a statement, discarding any result.
    pub async fn exec(&self, ctx: &QueryContext, sql: &str, args: &[Value]) -> ClientResult<()> {
        let mut conn = ctx.run(self.conn()).await?;
        ctx.run(async {
            let result = if args.is_empty() {
                conn.query_drop(sql).await
            } else {
                conn.exec_drop(sql, to_params(args)).await
            };
            result.map_err(ClientError::classify_mysql)
        })
        .await
    }

    pub async fn ping(&self, ctx: &QueryContext) -> ClientResult<()> {
        let mut conn = ctx.run(self.conn()).await?;
        ctx.run(async { conn.ping().await.map_err(ClientError::classify_mysql) })
            .await
    }

    /// Disconnect every pooled connection.
    pub async fn close(&self) -> ClientResult<()> {
        debug!("closing mysql pool");
        self.pool
            .clone()
            .disconnect()
            .await
            .map_err(ClientError::classify_mysql)
    }
}

/// Quote an identifier with backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
