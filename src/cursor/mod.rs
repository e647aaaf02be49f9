//! Unified row cursor.
//!
//! [`Rows`] hides which transport produced a result. Values are normalized
//! lazily, when a row is scanned.

mod flight_rows;
mod sql_rows;

use std::collections::HashMap;

pub use flight_rows::FlightRows;
pub use sql_rows::SqlRows;

use crate::error::{ClientError, ClientResult};
use crate::value::{assign_column, ScanDest, Value};

/// Forward-only cursor over a query result.
///
/// ```ignore
/// let mut result = conn.query(&ctx, &Statement::new("SELECT id, name FROM users")).await?;
/// while result.rows.next().await? {
///     let (mut id, mut name) = (0i64, String::new());
///     result.rows.scan(&mut [&mut id, &mut name])?;
/// }
/// result.close();
/// ```
pub enum Rows {
    Sql(SqlRows),
    Flight(FlightRows),
    /// A result without columns or rows.
    Empty,
}

impl Rows {
    pub fn columns(&self) -> &[String] {
        match self {
            Rows::Sql(rows) => rows.columns(),
            Rows::Flight(rows) => rows.columns(),
            Rows::Empty => &[],
        }
    }

    /// Advance to the next row.
    ///
    /// Returns `Ok(false)` once exhausted. A transport failure is returned
    /// once as `Err`; the cursor is terminal afterwards.
    pub async fn next(&mut self) -> ClientResult<bool> {
        match self {
            Rows::Sql(rows) => rows.next().await,
            Rows::Flight(rows) => rows.next().await,
            Rows::Empty => Ok(false),
        }
    }

    fn has_row(&self) -> bool {
        match self {
            Rows::Sql(rows) => rows.has_row(),
            Rows::Flight(rows) => rows.has_row(),
            Rows::Empty => false,
        }
    }

    fn value(&self, index: usize) -> ClientResult<Value> {
        match self {
            Rows::Sql(rows) => rows.value(index),
            Rows::Flight(rows) => rows.value(index),
            Rows::Empty => Err(ClientError::NoCurrentRow),
        }
    }

    /// Copy the current row into `dest`, one destination per column.
    pub fn scan(&self, dest: &mut [&mut dyn ScanDest]) -> ClientResult<()> {
        if !self.has_row() {
            return Err(ClientError::NoCurrentRow);
        }
        let columns = self.columns();
        if dest.len() != columns.len() {
            return Err(ClientError::ScanArity {
                expected: columns.len(),
                actual: dest.len(),
            });
        }
        for (index, (slot, column)) in dest.iter_mut().zip(columns).enumerate() {
            assign_column(&mut **slot, index, column, self.value(index)?)?;
        }
        Ok(())
    }

    /// Copy the current row into `dest`, keyed by column name.
    pub fn map_scan(&self, dest: &mut HashMap<String, Value>) -> ClientResult<()> {
        if !self.has_row() {
            return Err(ClientError::NoCurrentRow);
        }
        for (index, column) in self.columns().iter().enumerate() {
            dest.insert(column.clone(), self.value(index)?);
        }
        Ok(())
    }

    /// The current row as values in column order.
    pub fn values(&self) -> ClientResult<Vec<Value>> {
        if !self.has_row() {
            return Err(ClientError::NoCurrentRow);
        }
        (0..self.columns().len()).map(|i| self.value(i)).collect()
    }

    /// Idempotent. Safe before the first `next`.
    pub fn close(&mut self) {
        match self {
            Rows::Sql(rows) => rows.close(),
            Rows::Flight(rows) => rows.close(),
            Rows::Empty => {}
        }
    }
}
