//! Result schemas.
//!
//! Both transports describe their columns with the same [`TypeCode`]s, so a
//! caller inspecting a [`Schema`] cannot tell which protocol produced it.

use arrow::datatypes::{DataType, Schema as ArrowSchema};
use mysql_async::consts::{ColumnFlags, ColumnType};
use mysql_async::Column;
use serde::Serialize;

use crate::error::{ClientError, ClientResult};

/// MySQL character set id for binary data.
pub(crate) const BINARY_CHARSET: u16 = 63;

/// Logical column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeCode {
    Unspecified,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    /// LARGEINT; scanned as a decimal string.
    Int128,
    Float32,
    Float64,
    Decimal,
    String,
    Bytes,
    Date,
    Timestamp,
    Time,
    Json,
    Array,
    Map,
    Struct,
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub code: TypeCode,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, code: TypeCode, nullable: bool) -> Self {
        Self {
            name: name.into(),
            code,
            nullable,
        }
    }
}

/// Ordered list of result columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Convert an Arrow schema, failing on the first column whose type the
    /// normalizer cannot read.
    pub fn from_arrow(schema: &ArrowSchema) -> ClientResult<Self> {
        let fields = schema
            .fields()
            .iter()
            .map(|f| {
                let code = arrow_type_code(f.data_type())
                    .ok_or_else(|| ClientError::unsupported(f.name(), f.data_type()))?;
                Ok(Field::new(f.name(), code, f.is_nullable()))
            })
            .collect::<ClientResult<Vec<_>>>()?;
        Ok(Self { fields })
    }

    /// Convert MySQL result columns.
    pub fn from_mysql(columns: &[Column]) -> Self {
        let fields = columns
            .iter()
            .map(|c| {
                Field::new(
                    c.name_str().into_owned(),
                    mysql_type_code(c),
                    !c.flags().contains(ColumnFlags::NOT_NULL_FLAG),
                )
            })
            .collect();
        Self { fields }
    }
}

/// Type code for an Arrow data type, `None` when unsupported.
pub fn arrow_type_code(dt: &DataType) -> Option<TypeCode> {
    let code = match dt {
        DataType::Null => TypeCode::Unspecified,
        DataType::Boolean => TypeCode::Bool,
        DataType::Int8 | DataType::UInt8 => TypeCode::Int8,
        DataType::Int16 => TypeCode::Int16,
        DataType::UInt16 | DataType::Int32 => TypeCode::Int32,
        DataType::UInt32 | DataType::Int64 | DataType::UInt64 => TypeCode::Int64,
        DataType::Float16 | DataType::Float32 => TypeCode::Float32,
        DataType::Float64 => TypeCode::Float64,
        DataType::Decimal128(..) | DataType::Decimal256(..) => TypeCode::Decimal,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => TypeCode::String,
        DataType::Binary
        | DataType::LargeBinary
        | DataType::BinaryView
        | DataType::FixedSizeBinary(_) => TypeCode::Bytes,
        DataType::Date32 | DataType::Date64 => TypeCode::Date,
        DataType::Timestamp(..) => TypeCode::Timestamp,
        DataType::Time32(_) | DataType::Time64(_) => TypeCode::Time,
        DataType::List(_) | DataType::LargeList(_) | DataType::FixedSizeList(..) => {
            TypeCode::Array
        }
        DataType::Map(..) => TypeCode::Map,
        DataType::Struct(_) => TypeCode::Struct,
        _ => return None,
    };
    Some(code)
}

/// Type code for a MySQL protocol column.
pub fn mysql_type_code(column: &Column) -> TypeCode {
    let unsigned = column.flags().contains(ColumnFlags::UNSIGNED_FLAG);
    let binary = column.character_set() == BINARY_CHARSET;

    match column.column_type() {
        ColumnType::MYSQL_TYPE_NULL => TypeCode::Unspecified,
        ColumnType::MYSQL_TYPE_BIT => TypeCode::Bool,
        // BOOLEAN columns are reported as TINYINT(1). A column declared
        // TINYINT(1) is indistinguishable here and reads as Bool, while
        // Flight reports it as Int8.
        ColumnType::MYSQL_TYPE_TINY if column.column_length() == 1 => TypeCode::Bool,
        ColumnType::MYSQL_TYPE_TINY => TypeCode::Int8,
        ColumnType::MYSQL_TYPE_SHORT | ColumnType::MYSQL_TYPE_YEAR => TypeCode::Int16,
        ColumnType::MYSQL_TYPE_LONG | ColumnType::MYSQL_TYPE_INT24 => TypeCode::Int32,
        ColumnType::MYSQL_TYPE_LONGLONG if unsigned => TypeCode::Int128,
        ColumnType::MYSQL_TYPE_LONGLONG => TypeCode::Int64,
        ColumnType::MYSQL_TYPE_FLOAT => TypeCode::Float32,
        ColumnType::MYSQL_TYPE_DOUBLE => TypeCode::Float64,
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => TypeCode::Decimal,
        ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE => TypeCode::Date,
        ColumnType::MYSQL_TYPE_DATETIME
        | ColumnType::MYSQL_TYPE_DATETIME2
        | ColumnType::MYSQL_TYPE_TIMESTAMP
        | ColumnType::MYSQL_TYPE_TIMESTAMP2 => TypeCode::Timestamp,
        ColumnType::MYSQL_TYPE_TIME | ColumnType::MYSQL_TYPE_TIME2 => TypeCode::Time,
        ColumnType::MYSQL_TYPE_JSON => TypeCode::Json,
        ColumnType::MYSQL_TYPE_VARCHAR
        | ColumnType::MYSQL_TYPE_VAR_STRING
        | ColumnType::MYSQL_TYPE_STRING
        | ColumnType::MYSQL_TYPE_TINY_BLOB
        | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
        | ColumnType::MYSQL_TYPE_LONG_BLOB
        | ColumnType::MYSQL_TYPE_BLOB
            if binary =>
        {
            TypeCode::Bytes
        }
        ColumnType::MYSQL_TYPE_VARCHAR
        | ColumnType::MYSQL_TYPE_VAR_STRING
        | ColumnType::MYSQL_TYPE_STRING
        | ColumnType::MYSQL_TYPE_TINY_BLOB
        | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
        | ColumnType::MYSQL_TYPE_LONG_BLOB
        | ColumnType::MYSQL_TYPE_BLOB
        | ColumnType::MYSQL_TYPE_ENUM
        | ColumnType::MYSQL_TYPE_SET => TypeCode::String,
        _ => TypeCode::Unspecified,
    }
}
