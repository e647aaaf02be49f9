//! # rockstream
//!
//! A dual-transport query client for StarRocks-style OLAP clusters.
//!
//! ## Architecture
//!
//! Queries reach the cluster either over the MySQL protocol (row at a time,
//! supports bound parameters) or over Arrow Flight SQL (columnar, served by
//! the backends that hold the data). Both paths end in the same cursor:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              Connection::query(ctx, stmt)                │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [select_transport]
//!          ┌───────────────┴────────────────┐
//!          ▼                                ▼
//! ┌──────────────────┐          ┌──────────────────────────┐
//! │  SqlPath (mysql) │          │ Governor → coordinator   │
//! │  pooled conns    │          │ execute → EndpointRouter │
//! └──────────────────┘          │ → WorkerPool → do_get    │
//!          │                    └──────────────────────────┘
//!          ▼                                ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │         Rows (Sql | Flight | Empty) + normalize          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ```ignore
//! use rockstream::{Connection, ConnectionConfig, QueryContext, Statement};
//!
//! let conn = Connection::open(ConnectionConfig::new("fe.internal").with_flight(9408)).await?;
//! let ctx = QueryContext::new();
//! let mut result = conn.query(&ctx, &Statement::new("SELECT id, name FROM users")).await?;
//! while result.next().await? {
//!     let (mut id, mut name) = (0i64, String::new());
//!     result.scan(&mut [&mut id, &mut name])?;
//! }
//! result.close();
//! conn.close().await?;
//! ```

pub mod config;
pub mod context;
pub mod cursor;
pub mod error;
pub mod flight;
pub mod governor;
pub mod normalize;
pub mod olap;
pub mod schema;
pub mod value;

pub use config::{ConnectionConfig, PoolSettings, Settings, TransportKind};
pub use context::QueryContext;
pub use cursor::Rows;
pub use error::{ClientError, ClientResult, TransportPath};
pub use governor::{Governor, GovernorPermit};
pub use olap::{select_transport, Connection, QueryResult, Statement, Transport};
pub use schema::{Field, Schema, TypeCode};
pub use value::{FromValue, ScanDest, Value};
