//! Client error types.

use arrow::datatypes::DataType;
use thiserror::Error;

use crate::config::ConnectionError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Which transport path a connectivity failure was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportPath {
    /// MySQL protocol connection to the coordinator.
    Sql,
    /// Flight SQL planning calls (`GetFlightInfo`) against the coordinator.
    FlightPlan,
    /// Flight `DoGet` against the coordinator or a worker.
    FlightData,
}

impl std::fmt::Display for TransportPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportPath::Sql => f.write_str("mysql protocol"),
            TransportPath::FlightPlan => f.write_str("arrow flight planning"),
            TransportPath::FlightData => f.write_str("arrow flight data"),
        }
    }
}

/// Errors that can occur while talking to the cluster.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Invalid or conflicting connection settings.
    #[error("configuration error: {0}")]
    Config(#[from] ConnectionError),

    /// The coordinator could not be reached on the given path.
    #[error("cannot reach coordinator over {path}: {message}")]
    Connectivity {
        path: TransportPath,
        message: String,
    },

    /// Planning succeeded but fetching the result failed during the
    /// connectivity self-check.
    #[error(
        "arrow flight data path unreachable ({message}); the coordinator accepted the query \
         but its result could not be fetched. Check that backend Flight ports are reachable \
         from this client or set `flight_override`"
    )]
    DataPathUnreachable { message: String },

    /// The coordinator rejected the statement.
    #[error("query {query_id} failed: {message}")]
    Planning { query_id: String, message: String },

    /// Fetching a result stream from a specific node failed.
    #[error("fetch from {addr} failed: {source}")]
    Fetch {
        addr: String,
        #[source]
        source: Box<ClientError>,
    },

    /// The coordinator refused the request because its connection ceiling
    /// was reached.
    #[error("coordinator connection limit reached: {0}")]
    ResourceLimit(String),

    /// A column uses a physical type the normalizer does not know.
    #[error("unsupported type {data_type} for column {column:?}")]
    UnsupportedType { column: String, data_type: String },

    /// A value cannot be represented in its normalized shape.
    #[error("value out of range for column {column:?}: {value}")]
    ValueOutOfRange { column: String, value: String },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// The caller's deadline passed before the operation finished.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Scan called without a current row.
    #[error("no current row")]
    NoCurrentRow,

    /// Scan called with the wrong number of destinations.
    #[error("expected {expected} columns, got {actual} scan targets")]
    ScanArity { expected: usize, actual: usize },

    /// A value could not be assigned to the scan destination.
    #[error("scan column {index} ({column}): cannot assign {value} to {target}")]
    ScanType {
        index: usize,
        column: String,
        value: String,
        target: &'static str,
    },

    /// Operation on a closed connection or result.
    #[error("{0} is closed")]
    Closed(&'static str),

    /// Malformed endpoint location.
    #[error("invalid location {0:?}")]
    InvalidLocation(String),

    /// MySQL protocol error.
    #[error("mysql: {0}")]
    MySql(#[from] mysql_async::Error),

    /// Arrow / Flight error.
    #[error("arrow: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// gRPC transport error.
    #[error("transport: {0}")]
    Transport(#[from] tonic::transport::Error),
}

/// MySQL server error code: too many connections.
const ER_CON_COUNT_ERROR: u16 = 1040;
/// MySQL server error code: user has exceeded max_user_connections.
const ER_TOO_MANY_USER_CONNECTIONS: u16 = 1203;

impl ClientError {
    pub(crate) fn unsupported(column: impl Into<String>, data_type: &DataType) -> Self {
        Self::UnsupportedType {
            column: column.into(),
            data_type: data_type.to_string(),
        }
    }

    pub(crate) fn fetch(addr: impl Into<String>, source: ClientError) -> Self {
        Self::Fetch {
            addr: addr.into(),
            source: Box::new(source),
        }
    }

    /// Classify an error returned by the coordinator while planning.
    ///
    /// Connection ceiling errors become [`ClientError::ResourceLimit`], anything
    /// else is reported verbatim as a planning error.
    pub(crate) fn classify_planning(query_id: &str, err: ClientError) -> Self {
        match err {
            ClientError::ResourceLimit(_)
            | ClientError::Cancelled
            | ClientError::DeadlineExceeded => err,
            ClientError::Arrow(e) => {
                let message = e.to_string();
                if is_connection_ceiling(&message) {
                    ClientError::ResourceLimit(message)
                } else {
                    ClientError::Planning {
                        query_id: query_id.to_string(),
                        message,
                    }
                }
            }
            other => ClientError::Planning {
                query_id: query_id.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Classify a MySQL error, surfacing the connection ceiling distinctly.
    pub(crate) fn classify_mysql(err: mysql_async::Error) -> Self {
        if let mysql_async::Error::Server(server) = &err {
            if server.code == ER_CON_COUNT_ERROR || server.code == ER_TOO_MANY_USER_CONNECTIONS {
                return ClientError::ResourceLimit(server.message.clone());
            }
        }
        ClientError::MySql(err)
    }

    /// Check if this error is caused by the caller cancelling.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled | Self::DeadlineExceeded => true,
            Self::Fetch { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Check if retrying later may succeed. Retry policy belongs to the caller.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::ResourceLimit(_) | Self::Fetch { .. } | Self::Connectivity { .. }
        )
    }
}

/// Flight status messages surfaced when the FE runs out of connections.
fn is_connection_ceiling(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("resource exhausted")
        || lower.contains("resourceexhausted")
        || lower.contains("too many connections")
        || lower.contains("reach limit of connections")
}
