//! Both transports normalize the same logical value to the same `Value`.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BinaryArray, BooleanArray, Date32Array, Decimal128Array, Float32Array,
    Float64Array, Int16Array, Int32Array, Int64Array, Int8Array, ListArray, NullArray,
    StringArray, Time64MicrosecondArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field as ArrowField, Int32Type, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use mysql_async::consts::{ColumnFlags, ColumnType};
use mysql_async::{Column, Value as MyValue};

use rockstream::normalize::arrow::value_at;
use rockstream::normalize::mysql::from_mysql;
use rockstream::schema::arrow_type_code;
use rockstream::{Schema, TypeCode, Value};

fn text(s: &str) -> MyValue {
    MyValue::Bytes(s.as_bytes().to_vec())
}

struct Case {
    name: &'static str,
    arrow: ArrayRef,
    mysql: Vec<MyValue>,
    code: TypeCode,
    expected: Value,
}

fn cases() -> Vec<Case> {
    let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    let ts = date.and_hms_micro_opt(8, 30, 0, 250_000).unwrap().and_utc();

    vec![
        Case {
            name: "bool",
            arrow: Arc::new(BooleanArray::from(vec![true])),
            mysql: vec![text("1"), MyValue::Int(1)],
            code: TypeCode::Bool,
            expected: Value::Bool(true),
        },
        Case {
            name: "tinyint",
            arrow: Arc::new(Int8Array::from(vec![-7i8])),
            mysql: vec![text("-7"), MyValue::Int(-7)],
            code: TypeCode::Int8,
            expected: Value::Int16(-7),
        },
        Case {
            name: "smallint",
            arrow: Arc::new(Int16Array::from(vec![1200i16])),
            mysql: vec![text("1200"), MyValue::Int(1200)],
            code: TypeCode::Int16,
            expected: Value::Int16(1200),
        },
        Case {
            name: "int",
            arrow: Arc::new(Int32Array::from(vec![70_000])),
            mysql: vec![text("70000"), MyValue::Int(70_000)],
            code: TypeCode::Int32,
            expected: Value::Int32(70_000),
        },
        Case {
            name: "bigint",
            arrow: Arc::new(Int64Array::from(vec![-5_000_000_000i64])),
            mysql: vec![text("-5000000000"), MyValue::Int(-5_000_000_000)],
            code: TypeCode::Int64,
            expected: Value::Int64(-5_000_000_000),
        },
        Case {
            name: "float",
            arrow: Arc::new(Float32Array::from(vec![0.1f32])),
            mysql: vec![text("0.1"), MyValue::Float(0.1)],
            code: TypeCode::Float32,
            expected: Value::Float64(f64::from(0.1f32)),
        },
        Case {
            name: "double",
            arrow: Arc::new(Float64Array::from(vec![2.5])),
            mysql: vec![text("2.5"), MyValue::Double(2.5)],
            code: TypeCode::Float64,
            expected: Value::Float64(2.5),
        },
        Case {
            name: "decimal",
            arrow: Arc::new(
                Decimal128Array::from(vec![12_345i128])
                    .with_precision_and_scale(10, 2)
                    .unwrap(),
            ),
            mysql: vec![text("123.45")],
            code: TypeCode::Decimal,
            expected: Value::String("123.45".to_string()),
        },
        Case {
            name: "varchar",
            arrow: Arc::new(StringArray::from(vec!["héllo"])),
            mysql: vec![text("héllo")],
            code: TypeCode::String,
            expected: Value::String("héllo".to_string()),
        },
        Case {
            name: "varbinary",
            arrow: Arc::new(BinaryArray::from(vec![&[0u8, 159, 146, 150][..]])),
            mysql: vec![MyValue::Bytes(vec![0, 159, 146, 150])],
            code: TypeCode::Bytes,
            expected: Value::Bytes(vec![0, 159, 146, 150]),
        },
        Case {
            name: "date",
            arrow: Arc::new(Date32Array::from(vec![
                (date - epoch).num_days() as i32
            ])),
            mysql: vec![text("2024-03-09"), MyValue::Date(2024, 3, 9, 0, 0, 0, 0)],
            code: TypeCode::Date,
            expected: Value::String("2024-03-09".to_string()),
        },
        Case {
            name: "datetime",
            arrow: Arc::new(TimestampMicrosecondArray::from(vec![ts.timestamp_micros()])),
            mysql: vec![
                text("2024-03-09 08:30:00.250000"),
                MyValue::Date(2024, 3, 9, 8, 30, 0, 250_000),
            ],
            code: TypeCode::Timestamp,
            expected: Value::Timestamp(ts),
        },
        Case {
            name: "time",
            arrow: Arc::new(Time64MicrosecondArray::from(vec![45_296_500_000i64])),
            mysql: vec![
                text("12:34:56.500000"),
                MyValue::Time(false, 0, 12, 34, 56, 500_000),
            ],
            code: TypeCode::Time,
            expected: Value::String("12:34:56.500".to_string()),
        },
        Case {
            name: "array",
            arrow: Arc::new(ListArray::from_iter_primitive::<Int32Type, _, _>(vec![
                Some(vec![Some(1), None, Some(3)]),
            ])),
            mysql: vec![text("[1,null,3]")],
            code: TypeCode::Array,
            expected: Value::String("[1,null,3]".to_string()),
        },
        Case {
            name: "null",
            arrow: Arc::new(NullArray::new(1)),
            mysql: vec![MyValue::NULL],
            code: TypeCode::Unspecified,
            expected: Value::Null,
        },
    ]
}

#[test]
fn test_transports_agree() {
    for case in cases() {
        let from_arrow = value_at(case.arrow.as_ref(), 0, case.name).unwrap();
        assert_eq!(from_arrow, case.expected, "arrow {}", case.name);

        for raw in case.mysql {
            let from_row = from_mysql(raw.clone(), case.code, case.name).unwrap();
            assert_eq!(from_row, case.expected, "mysql {} {:?}", case.name, raw);
        }
    }
}

#[test]
fn test_schema_codes_agree_with_row_codes() {
    for case in cases() {
        let code = arrow_type_code(case.arrow.data_type()).unwrap();
        assert_eq!(code, case.code, "{}", case.name);
    }
}

#[test]
fn test_nulls_agree() {
    let arrow: ArrayRef = Arc::new(Int32Array::from(vec![None::<i32>]));
    assert_eq!(value_at(arrow.as_ref(), 0, "a").unwrap(), Value::Null);
    assert_eq!(
        from_mysql(MyValue::NULL, TypeCode::Int32, "a").unwrap(),
        Value::Null
    );
}

/// `SELECT ?, ?, ?, ?, ?` over the binary protocol returns the same row as
/// the literal query over Flight.
#[test]
fn test_parameterized_row_matches_flight_row() {
    let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();

    let arrow_schema = Arc::new(ArrowSchema::new(vec![
        ArrowField::new("id", DataType::Int32, false),
        ArrowField::new("region", DataType::Utf8, true),
        ArrowField::new("day", DataType::Date32, true),
        ArrowField::new("amount", DataType::Decimal128(10, 2), true),
        ArrowField::new("active", DataType::Boolean, true),
    ]));
    let batch = RecordBatch::try_new(
        arrow_schema.clone(),
        vec![
            Arc::new(Int32Array::from(vec![7])),
            Arc::new(StringArray::from(vec!["north"])),
            Arc::new(Date32Array::from(vec![(date - epoch).num_days() as i32])),
            Arc::new(
                Decimal128Array::from(vec![12_345i128])
                    .with_precision_and_scale(10, 2)
                    .unwrap(),
            ),
            Arc::new(BooleanArray::from(vec![true])),
        ],
    )
    .unwrap();

    let columns = vec![
        Column::new(ColumnType::MYSQL_TYPE_LONG)
            .with_name(b"id")
            .with_flags(ColumnFlags::NOT_NULL_FLAG),
        Column::new(ColumnType::MYSQL_TYPE_VAR_STRING)
            .with_name(b"region")
            .with_character_set(33),
        Column::new(ColumnType::MYSQL_TYPE_DATE).with_name(b"day"),
        Column::new(ColumnType::MYSQL_TYPE_NEWDECIMAL).with_name(b"amount"),
        Column::new(ColumnType::MYSQL_TYPE_TINY)
            .with_name(b"active")
            .with_column_length(1),
    ];
    let binary_row = vec![
        MyValue::Int(7),
        MyValue::Bytes(b"north".to_vec()),
        MyValue::Date(2024, 3, 9, 0, 0, 0, 0),
        MyValue::Bytes(b"123.45".to_vec()),
        MyValue::Int(1),
    ];

    let flight_schema = Schema::from_arrow(&arrow_schema).unwrap();
    let row_schema = Schema::from_mysql(&columns);
    assert_eq!(row_schema, flight_schema);

    for (i, raw) in binary_row.into_iter().enumerate() {
        let field = &row_schema.fields[i];
        let from_flight = value_at(batch.column(i).as_ref(), 0, &field.name).unwrap();
        let from_row = from_mysql(raw, field.code, &field.name).unwrap();
        assert_eq!(from_row, from_flight, "column {}", field.name);
    }
}
