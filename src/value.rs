//! Normalized values shared by both transports.
//!
//! Whatever protocol served a query, a scanned cell is one of these shapes:
//! small integers are widened to `Int16`, floats to `Float64`, decimals and
//! dates are strings, timestamps are UTC instants.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ClientError, ClientResult};

/// A single normalized cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the variant, used in scan errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "bool",
            Value::Int16(_) => "i16",
            Value::Int32(_) => "i32",
            Value::Int64(_) => "i64",
            Value::Float64(_) => "f64",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
        }
    }

    /// Widen any integer variant to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int16(v) => Some(i64::from(*v)),
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

macro_rules! impl_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::$variant(v.into())
            }
        })*
    };
}

impl_from!(
    bool => Bool,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f64 => Float64,
    String => String,
    &str => String,
    Vec<u8> => Bytes,
    DateTime<Utc> => Timestamp,
);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Why a value could not be assigned to a scan destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignError {
    pub target: &'static str,
}

/// A destination for [`crate::Rows::scan`].
///
/// Implemented for [`Value`] (receives the raw normalized value), for the
/// natural concrete type of each variant, and for `Option<T>` of those.
/// Integers widen losslessly; narrowing and NULL into a non-`Option`
/// destination are errors.
pub trait ScanDest {
    fn assign(&mut self, value: Value) -> Result<(), AssignError>;
}

impl ScanDest for Value {
    fn assign(&mut self, value: Value) -> Result<(), AssignError> {
        *self = value;
        Ok(())
    }
}

/// Conversion from a normalized value into a concrete Rust type.
pub trait FromValue: Sized {
    const TARGET: &'static str;

    fn from_value(value: Value) -> Option<Self>;
}

impl FromValue for bool {
    const TARGET: &'static str = "bool";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl FromValue for i16 {
    const TARGET: &'static str = "i16";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Int16(v) => Some(v),
            _ => None,
        }
    }
}

impl FromValue for i32 {
    const TARGET: &'static str = "i32";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Int16(v) => Some(i32::from(v)),
            Value::Int32(v) => Some(v),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    const TARGET: &'static str = "i64";

    fn from_value(value: Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FromValue for f64 {
    const TARGET: &'static str = "f64";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Float64(v) => Some(v),
            _ => None,
        }
    }
}

impl FromValue for String {
    const TARGET: &'static str = "String";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl FromValue for Vec<u8> {
    const TARGET: &'static str = "Vec<u8>";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bytes(b) => Some(b),
            Value::String(s) => Some(s.into_bytes()),
            _ => None,
        }
    }
}

impl FromValue for DateTime<Utc> {
    const TARGET: &'static str = "DateTime<Utc>";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Timestamp(t) => Some(t),
            _ => None,
        }
    }
}

macro_rules! impl_scan_dest {
    ($($t:ty),*) => {
        $(
            impl ScanDest for $t {
                fn assign(&mut self, value: Value) -> Result<(), AssignError> {
                    *self = <$t>::from_value(value)
                        .ok_or(AssignError { target: <$t as FromValue>::TARGET })?;
                    Ok(())
                }
            }

            impl ScanDest for Option<$t> {
                fn assign(&mut self, value: Value) -> Result<(), AssignError> {
                    if value.is_null() {
                        *self = None;
                        return Ok(());
                    }
                    *self = Some(<$t>::from_value(value)
                        .ok_or(AssignError { target: <$t as FromValue>::TARGET })?);
                    Ok(())
                }
            }
        )*
    };
}

impl_scan_dest!(bool, i16, i32, i64, f64, String, Vec<u8>, DateTime<Utc>);

/// Assign `value` to `dest`, reporting the column on failure.
pub(crate) fn assign_column(
    dest: &mut dyn ScanDest,
    index: usize,
    column: &str,
    value: Value,
) -> ClientResult<()> {
    let kind = value.kind();
    dest.assign(value).map_err(|e| ClientError::ScanType {
        index,
        column: column.to_string(),
        value: kind.to_string(),
        target: e.target,
    })
}
