//! Configuration module for rockstream.
//!
//! Handles connection configuration, environment variables, and settings.

mod connection;
mod settings;

pub use connection::{
    split_host_port, ConnectionConfig, ConnectionError, ResolvedEndpoint, TransportKind,
    DEFAULT_CATALOG, DEFAULT_FLIGHT_PORT, DEFAULT_MAX_FLIGHT_QUERIES, DEFAULT_MYSQL_PORT,
};
pub use settings::{expand_env_vars, parse_duration, PoolSettings, Settings, SettingsError};
