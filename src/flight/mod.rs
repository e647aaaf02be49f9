//! Bulk protocol (Arrow Flight SQL).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Coordinator (FlightSqlClient)             │
//! │   execute(sql) ──► QueryTicket { endpoints: [Endpoint, ..] } │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       EndpointRouter                         │
//! │   no location ──► coordinator.fetch(ticket)                  │
//! │   location    ──► flight_override or host:port               │
//! │                   └─► WorkerPool::get_or_create(addr)        │
//! │                       └─► worker.fetch(ticket)               │
//! │                           (evict on failure)                 │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//!                     BatchReader (RecordBatch stream)
//! ```

mod client;
mod pool;
mod reader;
mod router;
mod ticket;

pub use client::{BulkClient, BulkConnector, FlightAuth, FlightConnector, FlightSqlClient};
pub use pool::WorkerPool;
pub use reader::BatchReader;
pub use router::{EndpointRouter, COORDINATOR_ADDR};
pub use ticket::{location_addr, Endpoint, QueryTicket};
