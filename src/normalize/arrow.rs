//! Arrow array values to [`Value`].

use arrow::array::{Array, AsArray};
use arrow::datatypes::{
    DataType, Date32Type, Date64Type, Decimal128Type, Decimal256Type, DecimalType, Float16Type,
    Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, Time32MillisecondType,
    Time32SecondType, Time64MicrosecondType, Time64NanosecondType, TimeUnit,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow::temporal_conversions::{
    date32_to_datetime, date64_to_datetime, time32ms_to_time, time32s_to_time,
    time64ns_to_time, time64us_to_time, timestamp_ms_to_datetime, timestamp_ns_to_datetime,
    timestamp_s_to_datetime, timestamp_us_to_datetime,
};
use chrono::{NaiveDateTime, NaiveTime};

use super::{DATETIME_FORMAT, DATE_FORMAT};
use crate::error::{ClientError, ClientResult};
use crate::value::Value;

/// Extract the value at `row` of `array`, normalized.
///
/// `column` names the column in errors.
pub fn value_at(array: &dyn Array, row: usize, column: &str) -> ClientResult<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }

    let value = match array.data_type() {
        DataType::Null => Value::Null,
        DataType::Boolean => Value::Bool(array.as_boolean().value(row)),

        DataType::Int8 => Value::Int16(i16::from(array.as_primitive::<Int8Type>().value(row))),
        DataType::UInt8 => Value::Int16(i16::from(array.as_primitive::<UInt8Type>().value(row))),
        DataType::Int16 => Value::Int16(array.as_primitive::<Int16Type>().value(row)),
        DataType::UInt16 => {
            Value::Int32(i32::from(array.as_primitive::<UInt16Type>().value(row)))
        }
        DataType::Int32 => Value::Int32(array.as_primitive::<Int32Type>().value(row)),
        DataType::UInt32 => {
            Value::Int64(i64::from(array.as_primitive::<UInt32Type>().value(row)))
        }
        DataType::Int64 => Value::Int64(array.as_primitive::<Int64Type>().value(row)),
        DataType::UInt64 => {
            let v = array.as_primitive::<UInt64Type>().value(row);
            Value::Int64(i64::try_from(v).map_err(|_| out_of_range(column, v))?)
        }

        DataType::Float16 => Value::Float64(array.as_primitive::<Float16Type>().value(row).to_f64()),
        DataType::Float32 => {
            Value::Float64(f64::from(array.as_primitive::<Float32Type>().value(row)))
        }
        DataType::Float64 => Value::Float64(array.as_primitive::<Float64Type>().value(row)),

        DataType::Decimal128(precision, scale) => Value::String(Decimal128Type::format_decimal(
            array.as_primitive::<Decimal128Type>().value(row),
            *precision,
            *scale,
        )),
        DataType::Decimal256(precision, scale) => Value::String(Decimal256Type::format_decimal(
            array.as_primitive::<Decimal256Type>().value(row),
            *precision,
            *scale,
        )),

        DataType::Utf8 => Value::String(array.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::String(array.as_string::<i64>().value(row).to_string()),
        DataType::Utf8View => Value::String(array.as_string_view().value(row).to_string()),

        DataType::Binary => Value::Bytes(array.as_binary::<i32>().value(row).to_vec()),
        DataType::LargeBinary => Value::Bytes(array.as_binary::<i64>().value(row).to_vec()),
        DataType::BinaryView => Value::Bytes(array.as_binary_view().value(row).to_vec()),
        DataType::FixedSizeBinary(_) => {
            Value::Bytes(array.as_fixed_size_binary().value(row).to_vec())
        }

        DataType::Date32 => {
            let days = array.as_primitive::<Date32Type>().value(row);
            let dt = date32_to_datetime(days).ok_or_else(|| out_of_range(column, days))?;
            Value::String(dt.format(DATE_FORMAT).to_string())
        }
        DataType::Date64 => {
            let millis = array.as_primitive::<Date64Type>().value(row);
            let dt = date64_to_datetime(millis).ok_or_else(|| out_of_range(column, millis))?;
            Value::String(dt.format(DATE_FORMAT).to_string())
        }

        // Arrow timestamps are UTC instants; the zone is display metadata.
        DataType::Timestamp(unit, _) => {
            Value::Timestamp(timestamp_at(array, row, unit, column)?.and_utc())
        }

        DataType::Time32(_) | DataType::Time64(_) => {
            Value::String(time_at(array, row, column)?.to_string())
        }

        DataType::List(_)
        | DataType::LargeList(_)
        | DataType::FixedSizeList(..)
        | DataType::Map(..)
        | DataType::Struct(_) => {
            let mut out = String::new();
            render(array, row, column, &mut out)?;
            Value::String(out)
        }

        other => return Err(ClientError::unsupported(column, other)),
    };

    Ok(value)
}

fn timestamp_at(
    array: &dyn Array,
    row: usize,
    unit: &TimeUnit,
    column: &str,
) -> ClientResult<NaiveDateTime> {
    let (raw, dt) = match unit {
        TimeUnit::Second => {
            let v = array.as_primitive::<TimestampSecondType>().value(row);
            (v, timestamp_s_to_datetime(v))
        }
        TimeUnit::Millisecond => {
            let v = array.as_primitive::<TimestampMillisecondType>().value(row);
            (v, timestamp_ms_to_datetime(v))
        }
        TimeUnit::Microsecond => {
            let v = array.as_primitive::<TimestampMicrosecondType>().value(row);
            (v, timestamp_us_to_datetime(v))
        }
        TimeUnit::Nanosecond => {
            let v = array.as_primitive::<TimestampNanosecondType>().value(row);
            (v, timestamp_ns_to_datetime(v))
        }
    };
    dt.ok_or_else(|| out_of_range(column, raw))
}

fn time_at(array: &dyn Array, row: usize, column: &str) -> ClientResult<NaiveTime> {
    let (raw, time) = match array.data_type() {
        DataType::Time32(TimeUnit::Second) => {
            let v = array.as_primitive::<Time32SecondType>().value(row);
            (i64::from(v), time32s_to_time(v))
        }
        DataType::Time32(TimeUnit::Millisecond) => {
            let v = array.as_primitive::<Time32MillisecondType>().value(row);
            (i64::from(v), time32ms_to_time(v))
        }
        DataType::Time64(TimeUnit::Microsecond) => {
            let v = array.as_primitive::<Time64MicrosecondType>().value(row);
            (v, time64us_to_time(v))
        }
        DataType::Time64(TimeUnit::Nanosecond) => {
            let v = array.as_primitive::<Time64NanosecondType>().value(row);
            (v, time64ns_to_time(v))
        }
        other => return Err(ClientError::unsupported(column, other)),
    };
    time.ok_or_else(|| out_of_range(column, raw))
}

/// Render a cell as the JSON-like text the row protocol returns for complex
/// columns: `[1,2]`, `{"a":1}`, `{"k":"v"}`.
fn render(array: &dyn Array, row: usize, column: &str, out: &mut String) -> ClientResult<()> {
    if array.is_null(row) {
        out.push_str("null");
        return Ok(());
    }

    match array.data_type() {
        DataType::List(_) => render_list(array.as_list::<i32>().value(row).as_ref(), column, out),
        DataType::LargeList(_) => {
            render_list(array.as_list::<i64>().value(row).as_ref(), column, out)
        }
        DataType::FixedSizeList(..) => {
            render_list(array.as_fixed_size_list().value(row).as_ref(), column, out)
        }
        DataType::Struct(_) => {
            let fields = array.as_struct();
            out.push('{');
            for (i, (name, child)) in fields
                .column_names()
                .into_iter()
                .zip(fields.columns())
                .enumerate()
            {
                if i > 0 {
                    out.push(',');
                }
                push_quoted(name, out);
                out.push(':');
                render(child.as_ref(), row, column, out)?;
            }
            out.push('}');
            Ok(())
        }
        DataType::Map(..) => {
            let entries = array.as_map().value(row);
            let (keys, values) = (entries.column(0), entries.column(1));
            out.push('{');
            for i in 0..entries.len() {
                if i > 0 {
                    out.push(',');
                }
                render(keys.as_ref(), i, column, out)?;
                out.push(':');
                render(values.as_ref(), i, column, out)?;
            }
            out.push('}');
            Ok(())
        }
        // Decimals print as bare numbers.
        DataType::Decimal128(..) | DataType::Decimal256(..) => {
            if let Value::String(s) = value_at(array, row, column)? {
                out.push_str(&s);
            }
            Ok(())
        }
        _ => {
            push_scalar(value_at(array, row, column)?, out);
            Ok(())
        }
    }
}

fn render_list(items: &dyn Array, column: &str, out: &mut String) -> ClientResult<()> {
    out.push('[');
    for i in 0..items.len() {
        if i > 0 {
            out.push(',');
        }
        render(items, i, column, out)?;
    }
    out.push(']');
    Ok(())
}

fn push_scalar(value: Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if b { "true" } else { "false" }),
        Value::Int16(v) => out.push_str(&v.to_string()),
        Value::Int32(v) => out.push_str(&v.to_string()),
        Value::Int64(v) => out.push_str(&v.to_string()),
        Value::Float64(v) => out.push_str(&v.to_string()),
        Value::String(s) => push_quoted(&s, out),
        Value::Bytes(b) => push_quoted(&String::from_utf8_lossy(&b), out),
        Value::Timestamp(t) => push_quoted(&t.format(DATETIME_FORMAT).to_string(), out),
    }
}

fn push_quoted(s: &str, out: &mut String) {
    out.push_str(&serde_json::Value::from(s).to_string());
}

fn out_of_range(column: &str, value: impl ToString) -> ClientError {
    ClientError::ValueOutOfRange {
        column: column.to_string(),
        value: value.to_string(),
    }
}
