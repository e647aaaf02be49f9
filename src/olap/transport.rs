//! Transport selection.

use crate::value::Value;

/// Protocol used for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// MySQL protocol through the coordinator.
    Sql,
    /// Arrow Flight SQL.
    Flight,
}

/// Pick the protocol for a query.
///
/// Flight SQL has no parameter binding, so any bound argument forces the
/// MySQL protocol.
pub fn select_transport(args: &[Value], bulk_available: bool) -> Transport {
    if !args.is_empty() || !bulk_available {
        Transport::Sql
    } else {
        Transport::Flight
    }
}
