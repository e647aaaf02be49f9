//! Query tickets and their endpoints.

use arrow_flight::FlightInfo;
use bytes::Bytes;
use url::Url;

use crate::error::{ClientError, ClientResult};

/// Location scheme asking the client to fetch over the connection that
/// planned the query.
const REUSE_CONNECTION_SCHEME: &str = "arrow-flight-reuse-connection";

/// One piece of a query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Opaque fetch ticket.
    pub ticket: Bytes,
    /// Location URIs, e.g. `grpc://10.0.0.1:9408`.
    pub locations: Vec<String>,
}

impl Endpoint {
    pub fn new(ticket: impl Into<Bytes>, locations: Vec<String>) -> Self {
        Self {
            ticket: ticket.into(),
            locations,
        }
    }

    /// An endpoint served by the coordinator itself.
    pub fn coordinator(ticket: impl Into<Bytes>) -> Self {
        Self::new(ticket, Vec::new())
    }

    /// `host:port` of the worker serving this endpoint, `None` when the
    /// coordinator serves it.
    pub fn worker_addr(&self) -> ClientResult<Option<String>> {
        match self.locations.first() {
            None => Ok(None),
            Some(uri) => location_addr(uri),
        }
    }
}

/// Planned query: zero or more endpoints to fetch in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTicket {
    pub endpoints: Vec<Endpoint>,
    /// Row count reported by the coordinator, when known.
    pub total_records: Option<u64>,
}

impl QueryTicket {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints,
            total_records: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl From<FlightInfo> for QueryTicket {
    fn from(info: FlightInfo) -> Self {
        let endpoints = info
            .endpoint
            .into_iter()
            .map(|ep| Endpoint {
                ticket: ep.ticket.map(|t| t.ticket).unwrap_or_default(),
                locations: ep.location.into_iter().map(|l| l.uri).collect(),
            })
            .collect();
        Self {
            endpoints,
            total_records: u64::try_from(info.total_records).ok(),
        }
    }
}

/// Parse a location URI into `host:port`.
pub fn location_addr(uri: &str) -> ClientResult<Option<String>> {
    let url = Url::parse(uri).map_err(|_| ClientError::InvalidLocation(uri.to_string()))?;
    if url.scheme() == REUSE_CONNECTION_SCHEME {
        return Ok(None);
    }
    let host = url
        .host_str()
        .ok_or_else(|| ClientError::InvalidLocation(uri.to_string()))?;
    let port = url
        .port()
        .ok_or_else(|| ClientError::InvalidLocation(uri.to_string()))?;
    Ok(Some(format!("{host}:{port}")))
}
