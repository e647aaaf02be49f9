//! Type normalization.
//!
//! Both transports deliver the same logical column in different physical
//! shapes: the row protocol sends text (or typed binary-protocol values), the
//! bulk protocol sends Arrow arrays. This module maps each of them onto
//! [`Value`](crate::Value) so a scanned cell looks the same whichever path
//! served it.
//!
//! | Logical type      | Arrow                          | MySQL                  | Value       |
//! |-------------------|--------------------------------|------------------------|-------------|
//! | boolean           | Boolean                        | TINYINT(1), BIT        | `Bool`      |
//! | tinyint/smallint  | Int8, Int16, UInt8             | TINY, SHORT, YEAR      | `Int16`     |
//! | int               | Int32, UInt16                  | LONG, INT24            | `Int32`     |
//! | bigint            | Int64, UInt32, UInt64          | LONGLONG               | `Int64`     |
//! | largeint          | (string)                       | LONGLONG UNSIGNED      | `String`    |
//! | float/double      | Float16, Float32, Float64      | FLOAT, DOUBLE          | `Float64`   |
//! | decimal           | Decimal128, Decimal256         | (NEW)DECIMAL           | `String`    |
//! | char/varchar/json | Utf8, LargeUtf8, Utf8View      | string types, JSON     | `String`    |
//! | binary            | Binary, FixedSizeBinary, ...   | binary charset strings | `Bytes`     |
//! | date              | Date32, Date64                 | DATE                   | `String`    |
//! | datetime          | Timestamp(unit, tz)            | DATETIME, TIMESTAMP    | `Timestamp` |
//! | time              | Time32, Time64                 | TIME                   | `String`    |
//! | array/map/struct  | List, Map, Struct              | string                 | `String`    |

pub mod arrow;
pub mod mysql;

/// Format used for dates on both paths.
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format used for timestamps rendered inside complex values.
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
