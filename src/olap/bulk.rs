//! Arrow Flight SQL path.

use std::sync::Arc;

use tracing::{debug, warn};

use super::QueryResult;
use crate::config::ConnectionConfig;
use crate::context::QueryContext;
use crate::cursor::{FlightRows, Rows};
use crate::error::{ClientError, ClientResult, TransportPath};
use crate::flight::{
    BulkClient, BulkConnector, EndpointRouter, FlightAuth, FlightConnector, FlightSqlClient,
    WorkerPool,
};
use crate::governor::Governor;
use crate::schema::Schema;

/// Statement used to verify both the planning and the data path.
const SELF_CHECK_SQL: &str = "SELECT 1";

/// Coordinator client, worker routing and the query governor.
pub struct BulkPath {
    coordinator: Arc<dyn BulkClient>,
    router: Arc<EndpointRouter>,
    governor: Governor,
}

impl BulkPath {
    /// Connect and authenticate to the coordinator, then run the self-check.
    pub async fn connect(config: &ConnectionConfig, ctx: &QueryContext) -> ClientResult<Self> {
        let uri = config.flight_uri()?;
        let endpoint = config.endpoint()?;
        let auth = FlightAuth::Basic {
            username: endpoint.username,
            password: endpoint.password,
        };

        let coordinator = ctx
            .run(FlightSqlClient::connect(&uri, &auth))
            .await
            .map_err(|e| connectivity(TransportPath::FlightPlan, e))?;
        let worker_auth = coordinator.token().map(FlightAuth::Bearer).unwrap_or(auth);
        let connector = Arc::new(FlightConnector::new(config.ssl, worker_auth));

        let path = Self::from_parts(
            Arc::new(coordinator),
            connector,
            config.flight_override.clone(),
            config.flight_concurrency(),
        );
        if let Err(e) = path.self_check(ctx).await {
            path.close().await;
            return Err(e);
        }
        debug!(uri = %uri, "flight path ready");
        Ok(path)
    }

    /// Assemble a path from existing clients without any network check.
    pub fn from_parts(
        coordinator: Arc<dyn BulkClient>,
        connector: Arc<dyn BulkConnector>,
        flight_override: Option<String>,
        max_queries: usize,
    ) -> Self {
        let pool = Arc::new(WorkerPool::new(connector));
        let router = Arc::new(EndpointRouter::new(
            coordinator.clone(),
            pool,
            flight_override,
        ));
        Self {
            coordinator,
            router,
            governor: Governor::new(max_queries),
        }
    }

    pub fn governor(&self) -> &Governor {
        &self.governor
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        self.router.pool()
    }

    /// Plan `SELECT 1` and drain its first endpoint.
    ///
    /// A coordinator that plans but whose result cannot be fetched usually
    /// means worker Flight ports are unreachable from this client; that case
    /// gets its own error.
    pub async fn self_check(&self, ctx: &QueryContext) -> ClientResult<()> {
        let ticket = ctx
            .run(self.coordinator.execute(SELF_CHECK_SQL))
            .await
            .map_err(|e| connectivity(TransportPath::FlightPlan, e))?;

        let Some(endpoint) = ticket.endpoints.first() else {
            return Ok(());
        };

        let drain = async {
            let mut reader = self.router.do_get(endpoint).await?;
            while let Some(batch) = reader.next_batch().await {
                batch?;
            }
            Ok(())
        };
        ctx.run(drain).await.map_err(|e| match e {
            ClientError::Cancelled | ClientError::DeadlineExceeded => e,
            other => {
                warn!(error = %other, "flight data path self-check failed");
                ClientError::DataPathUnreachable {
                    message: other.to_string(),
                }
            }
        })
    }

    /// Run `sql` over Flight.
    ///
    /// Waiting for a governor slot follows `ctx` in full. Planning and
    /// reading run under a detached context: the caller's deadline does not
    /// apply, its cancellation does. The slot is held by the returned result
    /// and released when it is closed; a ticket without endpoints releases it
    /// immediately.
    pub async fn query(
        &self,
        ctx: &QueryContext,
        sql: &str,
        query_id: &str,
    ) -> ClientResult<QueryResult> {
        let permit = self.governor.acquire(ctx).await?;

        // Stops the watcher if this future is dropped or returns early.
        let detached = ctx.detached();
        let guard = detached.token().clone().drop_guard();

        let ticket = detached
            .run(self.coordinator.execute(sql))
            .await
            .map_err(|e| ClientError::classify_planning(query_id, e))?;

        let total_records = ticket.total_records;
        let mut endpoints = ticket.endpoints.into_iter();
        let Some(first) = endpoints.next() else {
            debug!(query_id, "flight query returned no endpoints");
            return Ok(QueryResult::empty());
        };

        let reader = detached.run(self.router.do_get(&first)).await?;
        let schema = Schema::from_arrow(&reader.schema())?;
        let rows = FlightRows::new(reader, detached)
            .with_remaining(self.router.clone(), endpoints.collect())
            .expect_rows(total_records);
        guard.disarm();
        Ok(QueryResult::new(schema, Rows::Flight(rows)).with_cleanup(move || drop(permit)))
    }

    /// Reject new queries, close every worker client, then the coordinator.
    pub async fn close(&self) {
        self.governor.close();
        self.router.pool().close_all().await;
        self.coordinator.close().await;
    }
}

fn connectivity(path: TransportPath, err: ClientError) -> ClientError {
    match err {
        ClientError::Cancelled | ClientError::DeadlineExceeded => err,
        other => ClientError::Connectivity {
            path,
            message: other.to_string(),
        },
    }
}
