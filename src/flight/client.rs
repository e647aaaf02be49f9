//! Flight SQL clients for the coordinator and the workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arrow_flight::sql::client::FlightSqlServiceClient;
use arrow_flight::Ticket;
use async_trait::async_trait;
use bytes::Bytes;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint as ChannelEndpoint};
use tracing::debug;

use super::reader::BatchReader;
use super::ticket::QueryTicket;
use crate::error::{ClientError, ClientResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// A node speaking the bulk protocol.
#[async_trait]
pub trait BulkClient: Send + Sync {
    /// Plan `sql` and return where to fetch its result.
    async fn execute(&self, sql: &str) -> ClientResult<QueryTicket>;

    /// Open the result stream for one endpoint ticket.
    async fn fetch(&self, ticket: &Bytes) -> ClientResult<BatchReader>;

    /// Release the connection. Later calls fail with `Closed`.
    async fn close(&self);
}

/// Builds clients for worker addresses.
#[async_trait]
pub trait BulkConnector: Send + Sync {
    async fn connect(&self, addr: &str) -> ClientResult<Arc<dyn BulkClient>>;
}

/// Credentials presented to Flight services.
#[derive(Clone, Default)]
pub enum FlightAuth {
    #[default]
    None,
    /// Username and password exchanged for a token by handshake.
    Basic { username: String, password: String },
    /// A token obtained by an earlier handshake.
    Bearer(String),
}

impl std::fmt::Debug for FlightAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlightAuth::None => f.write_str("None"),
            FlightAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            FlightAuth::Bearer(_) => f.write_str("Bearer(..)"),
        }
    }
}

/// Flight SQL client over one gRPC channel.
///
/// Calls clone the underlying client, so concurrent queries share the
/// channel without locking.
#[derive(Debug)]
pub struct FlightSqlClient {
    uri: String,
    inner: FlightSqlServiceClient<Channel>,
    closed: AtomicBool,
}

impl FlightSqlClient {
    /// Connect to `uri` (`http://host:port` or `https://host:port`) and
    /// authenticate.
    pub async fn connect(uri: &str, auth: &FlightAuth) -> ClientResult<Self> {
        let mut endpoint = ChannelEndpoint::from_shared(uri.to_string())
            .map_err(|_| ClientError::InvalidLocation(uri.to_string()))?
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_keepalive(Some(KEEPALIVE_INTERVAL));
        if uri.starts_with("https://") {
            endpoint = endpoint.tls_config(ClientTlsConfig::new().with_webpki_roots())?;
        }

        let channel = endpoint.connect().await?;
        let mut inner = FlightSqlServiceClient::new(channel);
        match auth {
            FlightAuth::None => {}
            FlightAuth::Basic { username, password } => {
                inner.handshake(username, password).await?;
            }
            FlightAuth::Bearer(token) => inner.set_token(token.clone()),
        }

        debug!(uri, "flight client connected");
        Ok(Self {
            uri: uri.to_string(),
            inner,
            closed: AtomicBool::new(false),
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Bearer token from the handshake, reused by worker clients.
    pub fn token(&self) -> Option<String> {
        self.inner.token().cloned()
    }

    fn client(&self) -> ClientResult<FlightSqlServiceClient<Channel>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::Closed("flight client"));
        }
        Ok(self.inner.clone())
    }
}

#[async_trait]
impl BulkClient for FlightSqlClient {
    async fn execute(&self, sql: &str) -> ClientResult<QueryTicket> {
        let mut client = self.client()?;
        let info = client.execute(sql.to_string(), None).await?;
        Ok(QueryTicket::from(info))
    }

    async fn fetch(&self, ticket: &Bytes) -> ClientResult<BatchReader> {
        let mut client = self.client()?;
        let stream = client.do_get(Ticket::new(ticket.clone())).await?;
        BatchReader::from_flight(stream).await
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(uri = %self.uri, "flight client closed");
        }
    }
}

/// Connects worker clients with the coordinator's TLS and auth settings.
#[derive(Debug, Clone)]
pub struct FlightConnector {
    tls: bool,
    auth: FlightAuth,
}

impl FlightConnector {
    pub fn new(tls: bool, auth: FlightAuth) -> Self {
        Self { tls, auth }
    }

    /// URI for a worker `host:port`.
    pub fn uri(&self, addr: &str) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{addr}")
    }
}

#[async_trait]
impl BulkConnector for FlightConnector {
    async fn connect(&self, addr: &str) -> ClientResult<Arc<dyn BulkClient>> {
        let client = FlightSqlClient::connect(&self.uri(addr), &self.auth).await?;
        Ok(Arc::new(client))
    }
}
