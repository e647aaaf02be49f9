//! Bounds the number of in-flight bulk queries.
//!
//! The coordinator keeps a Flight session per query until its result is
//! drained, so an unbounded number of open results exhausts its connection
//! ceiling. Each bulk query holds one [`GovernorPermit`] from planning until
//! the caller closes the result.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::context::QueryContext;
use crate::error::{ClientError, ClientResult};

/// Counting semaphore shared by all queries on a connection.
#[derive(Debug, Clone)]
pub struct Governor {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One held slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct GovernorPermit {
    _permit: OwnedSemaphorePermit,
}

impl Governor {
    /// A governor admitting at most `max` queries (at least one).
    pub fn new(max: usize) -> Self {
        let capacity = max.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of free slots.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a slot. Fails with `Cancelled` (holding nothing) when the
    /// context is cancelled first.
    pub async fn acquire(&self, ctx: &QueryContext) -> ClientResult<GovernorPermit> {
        if let Ok(permit) = self.semaphore.clone().try_acquire_owned() {
            return Ok(GovernorPermit { _permit: permit });
        }

        debug!(capacity = self.capacity, "waiting for a flight query slot");
        let semaphore = self.semaphore.clone();
        let permit = ctx
            .run(async move {
                semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| ClientError::Closed("connection"))
            })
            .await?;
        Ok(GovernorPermit { _permit: permit })
    }

    /// Reject all current and future waiters.
    pub fn close(&self) {
        self.semaphore.close();
    }
}
