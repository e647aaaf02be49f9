//! MySQL protocol values to [`Value`] and back.
//!
//! Handles both the text protocol (every cell arrives as bytes) and the
//! binary protocol used for prepared statements (typed cells).

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use mysql_async::{Params, Value as MyValue};

use super::{DATETIME_FORMAT, DATE_FORMAT};
use crate::error::{ClientError, ClientResult};
use crate::schema::TypeCode;
use crate::value::Value;

/// Normalize a cell of a column with the given type code.
pub fn from_mysql(value: MyValue, code: TypeCode, column: &str) -> ClientResult<Value> {
    match value {
        MyValue::NULL => Ok(Value::Null),
        MyValue::Bytes(bytes) => from_text(bytes, code, column),
        MyValue::Int(v) => from_int(i128::from(v), code, column),
        MyValue::UInt(v) => from_int(i128::from(v), code, column),
        MyValue::Float(v) => Ok(Value::Float64(f64::from(v))),
        MyValue::Double(v) => Ok(Value::Float64(v)),
        MyValue::Date(year, month, day, hour, minute, second, micros) => {
            let date = NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
                .ok_or_else(|| out_of_range(column, format!("{year:04}-{month:02}-{day:02}")))?;
            if code == TypeCode::Date {
                return Ok(Value::String(date.format(DATE_FORMAT).to_string()));
            }
            let dt = date
                .and_hms_micro_opt(
                    u32::from(hour),
                    u32::from(minute),
                    u32::from(second),
                    micros,
                )
                .ok_or_else(|| {
                    out_of_range(column, format!("{hour:02}:{minute:02}:{second:02}.{micros}"))
                })?;
            Ok(Value::Timestamp(dt.and_utc()))
        }
        MyValue::Time(negative, days, hours, minutes, seconds, micros) => {
            Ok(Value::String(format_duration_time(
                negative, days, hours, minutes, seconds, micros,
            )))
        }
    }
}

fn from_int(v: i128, code: TypeCode, column: &str) -> ClientResult<Value> {
    let value = match code {
        TypeCode::Bool => Value::Bool(v != 0),
        TypeCode::Int8 | TypeCode::Int16 => {
            Value::Int16(i16::try_from(v).map_err(|_| out_of_range(column, v))?)
        }
        TypeCode::Int32 => Value::Int32(i32::try_from(v).map_err(|_| out_of_range(column, v))?),
        TypeCode::Int128 | TypeCode::Decimal | TypeCode::String => Value::String(v.to_string()),
        _ => Value::Int64(i64::try_from(v).map_err(|_| out_of_range(column, v))?),
    };
    Ok(value)
}

fn from_text(bytes: Vec<u8>, code: TypeCode, column: &str) -> ClientResult<Value> {
    match code {
        TypeCode::Bytes => return Ok(Value::Bytes(bytes)),
        // BIT arrives as raw bits, TINYINT(1) as ASCII digits.
        TypeCode::Bool => {
            let truthy = if bytes.iter().all(u8::is_ascii_digit) && !bytes.is_empty() {
                bytes.iter().any(|b| *b != b'0')
            } else {
                bytes.iter().any(|b| *b != 0)
            };
            return Ok(Value::Bool(truthy));
        }
        _ => {}
    }

    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    };

    let value = match code {
        TypeCode::Int8 | TypeCode::Int16 => Value::Int16(parse(&text, column)?),
        TypeCode::Int32 => Value::Int32(parse(&text, column)?),
        TypeCode::Int64 => Value::Int64(parse(&text, column)?),
        // FLOAT is widened from single precision so it matches Arrow Float32.
        TypeCode::Float32 => Value::Float64(f64::from(parse::<f32>(&text, column)?)),
        TypeCode::Float64 => Value::Float64(parse(&text, column)?),
        TypeCode::Date => match NaiveDate::parse_from_str(&text, DATE_FORMAT) {
            Ok(d) => Value::String(d.format(DATE_FORMAT).to_string()),
            Err(_) => Value::String(text),
        },
        TypeCode::Timestamp => {
            let dt = NaiveDateTime::parse_from_str(&text, DATETIME_FORMAT)
                .map_err(|_| out_of_range(column, &text))?;
            Value::Timestamp(dt.and_utc())
        }
        // Durations outside a single day stay as the server wrote them.
        TypeCode::Time => match NaiveTime::parse_from_str(&text, "%H:%M:%S%.f") {
            Ok(t) => Value::String(t.to_string()),
            Err(_) => Value::String(text),
        },
        _ => Value::String(text),
    };
    Ok(value)
}

fn parse<T: std::str::FromStr>(text: &str, column: &str) -> ClientResult<T> {
    text.trim().parse().map_err(|_| out_of_range(column, text))
}

fn format_duration_time(
    negative: bool,
    days: u32,
    hours: u8,
    minutes: u8,
    seconds: u8,
    micros: u32,
) -> String {
    let total_hours = days * 24 + u32::from(hours);
    if !negative && total_hours < 24 {
        if let Some(t) = NaiveTime::from_hms_micro_opt(
            total_hours,
            u32::from(minutes),
            u32::from(seconds),
            micros,
        ) {
            return t.to_string();
        }
    }

    let sign = if negative { "-" } else { "" };
    let mut out = format!("{sign}{total_hours:02}:{minutes:02}:{seconds:02}");
    if micros > 0 {
        out.push_str(&format!(".{micros:06}"));
    }
    out
}

/// Convert a bound argument to its MySQL wire value.
pub fn to_mysql(value: &Value) -> MyValue {
    match value {
        Value::Null => MyValue::NULL,
        Value::Bool(b) => MyValue::Int(i64::from(*b)),
        Value::Int16(v) => MyValue::Int(i64::from(*v)),
        Value::Int32(v) => MyValue::Int(i64::from(*v)),
        Value::Int64(v) => MyValue::Int(*v),
        Value::Float64(v) => MyValue::Double(*v),
        Value::String(s) => MyValue::Bytes(s.clone().into_bytes()),
        Value::Bytes(b) => MyValue::Bytes(b.clone()),
        Value::Timestamp(t) => {
            let t = t.naive_utc();
            MyValue::Date(
                u16::try_from(t.year()).unwrap_or(0),
                t.month() as u8,
                t.day() as u8,
                t.hour() as u8,
                t.minute() as u8,
                t.second() as u8,
                t.nanosecond() / 1_000,
            )
        }
    }
}

/// Positional parameters for a statement.
pub fn to_params(args: &[Value]) -> Params {
    if args.is_empty() {
        Params::Empty
    } else {
        Params::Positional(args.iter().map(to_mysql).collect())
    }
}

fn out_of_range(column: &str, value: impl ToString) -> ClientError {
    ClientError::ValueOutOfRange {
        column: column.to_string(),
        value: value.to_string(),
    }
}
