//! Per-query cancellation and deadlines.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, ClientResult};

/// Cancellation scope for one call.
///
/// Cloning shares the same token: cancelling any clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing token, e.g. one owned by a request handler.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Add a deadline `timeout` from now. An earlier existing deadline wins.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A context without the deadline that still follows cancellation.
    ///
    /// Bulk results outlive the call that produced them, so the cursor runs
    /// under a detached context: the caller's deadline no longer applies, but
    /// cancelling the caller still aborts in-flight reads. A watcher task
    /// forwards the caller's cancellation and exits once either side is
    /// cancelled. Cancelling the detached context does not reach the caller.
    ///
    /// Must be called from within a tokio runtime.
    pub fn detached(&self) -> QueryContext {
        let parent = self.token.clone();
        let token = CancellationToken::new();
        let watched = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = parent.cancelled() => watched.cancel(),
                _ = watched.cancelled() => {}
            }
        });
        Self {
            token,
            deadline: None,
        }
    }

    /// A context sharing this one's deadline whose cancellation does not
    /// reach this one.
    pub fn child(&self) -> QueryContext {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Run `fut` until it completes, the context is cancelled, or the
    /// deadline passes.
    pub async fn run<T, F>(&self, fut: F) -> ClientResult<T>
    where
        F: Future<Output = ClientResult<T>>,
    {
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ClientError::Cancelled),
            _ = expired => Err(ClientError::DeadlineExceeded),
            result = fut => result,
        }
    }
}
