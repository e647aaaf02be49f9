//! Routes endpoint fetches to the coordinator or a pooled worker client.

use std::sync::Arc;

use tracing::debug;

use super::client::BulkClient;
use super::pool::WorkerPool;
use super::reader::BatchReader;
use super::ticket::Endpoint;
use crate::error::{ClientError, ClientResult};

/// Address reported for fetches served by the coordinator.
pub const COORDINATOR_ADDR: &str = "coordinator";

pub struct EndpointRouter {
    coordinator: Arc<dyn BulkClient>,
    pool: Arc<WorkerPool>,
    flight_override: Option<String>,
}

impl EndpointRouter {
    /// `flight_override`, when set, replaces every worker address (for
    /// workers advertising addresses unreachable from the client).
    pub fn new(
        coordinator: Arc<dyn BulkClient>,
        pool: Arc<WorkerPool>,
        flight_override: Option<String>,
    ) -> Self {
        Self {
            coordinator,
            pool,
            flight_override,
        }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Open the result stream for `endpoint`.
    ///
    /// A failed worker fetch evicts that worker's client before returning
    /// the error, so the next query reconnects.
    pub async fn do_get(&self, endpoint: &Endpoint) -> ClientResult<BatchReader> {
        let addr = match endpoint.worker_addr()? {
            Some(advertised) => self.flight_override.clone().unwrap_or(advertised),
            None => {
                return self
                    .coordinator
                    .fetch(&endpoint.ticket)
                    .await
                    .map_err(|e| ClientError::fetch(COORDINATOR_ADDR, e));
            }
        };

        let client = self
            .pool
            .get_or_create(&addr)
            .await
            .map_err(|e| ClientError::fetch(&addr, e))?;

        debug!(addr = %addr, "fetching endpoint from worker");
        match client.fetch(&endpoint.ticket).await {
            Ok(reader) => Ok(reader),
            Err(e) => {
                self.pool.evict(&addr, &client).await;
                Err(ClientError::fetch(addr, e))
            }
        }
    }
}
