//! Cache of worker clients keyed by address.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::client::{BulkClient, BulkConnector};
use crate::error::ClientResult;

/// Worker clients, at most one per `host:port`.
///
/// Workers are discovered per query from ticket locations, so entries are
/// created on first use and kept until a fetch against that address fails or
/// the connection shuts down. One lock guards lookups, construction and
/// eviction, so concurrent queries to a new worker build a single client.
pub struct WorkerPool {
    connector: Arc<dyn BulkConnector>,
    clients: Mutex<HashMap<String, Arc<dyn BulkClient>>>,
}

impl WorkerPool {
    pub fn new(connector: Arc<dyn BulkConnector>) -> Self {
        Self {
            connector,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached client for `addr`, connecting one if needed.
    ///
    /// A failed connection is returned to the caller and not cached.
    pub async fn get_or_create(&self, addr: &str) -> ClientResult<Arc<dyn BulkClient>> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(addr) {
            return Ok(client.clone());
        }

        debug!(addr, "connecting to flight worker");
        let client = self.connector.connect(addr).await?;
        clients.insert(addr.to_string(), client.clone());
        Ok(client)
    }

    /// Close and remove `failed` if it is still the cached client for `addr`.
    ///
    /// A client that another query already replaced is left alone.
    pub async fn evict(&self, addr: &str, failed: &Arc<dyn BulkClient>) {
        let removed = {
            let mut clients = self.clients.lock().await;
            match clients.get(addr) {
                Some(current) if same_client(current, failed) => clients.remove(addr),
                _ => None,
            }
        };

        if let Some(client) = removed {
            warn!(addr, "evicting flight worker client after fetch failure");
            client.close().await;
        }
    }

    /// Close every cached client and empty the pool.
    pub async fn close_all(&self) {
        let drained: Vec<_> = self.clients.lock().await.drain().collect();
        for (addr, client) in drained {
            debug!(addr, "closing flight worker client");
            client.close().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }

    pub async fn contains(&self, addr: &str) -> bool {
        self.clients.lock().await.contains_key(addr)
    }
}

fn same_client(a: &Arc<dyn BulkClient>, b: &Arc<dyn BulkClient>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
