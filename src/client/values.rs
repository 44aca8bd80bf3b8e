//! Conversions between JSON values and PostgreSQL wire values.
//!
//! Parameter literals carry no SQL type. Each value is sent in text format
//! with an unknown type, so the server parses it for whatever type its
//! placeholder resolves to. Rows come back as JSON maps.

use std::error::Error;

use bytes::{BufMut, BytesMut};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tokio_postgres::types::{to_sql_checked, Format, IsNull, ToSql, Type};
use tokio_postgres::SimpleQueryRow;

use super::Row;

type BoxError = Box<dyn Error + Sync + Send>;

/// A parameter value sent as text for the server to interpret
#[derive(Debug)]
pub struct SqlParam<'a>(pub &'a Value);

impl ToSql for SqlParam<'_> {
    fn to_sql(&self, _ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match param_text(self.0) {
            Some(text) => {
                out.put_slice(text.as_bytes());
                Ok(IsNull::No)
            },
            None => Ok(IsNull::Yes),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    to_sql_checked!();
}

/// Text form of a parameter value. `None` is SQL `NULL`; sequences and
/// mappings are sent as JSON text.
pub fn param_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Decode a row returned by the extended query protocol.
pub fn typed_row(row: &tokio_postgres::Row) -> Row {
    let mut map = Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = column_value(row, idx, column.type_()).unwrap_or_else(|e| {
            log::debug!(
                "Cannot decode column '{}' ({}): {}",
                column.name(),
                column.type_(),
                e
            );
            Value::Null
        });
        map.insert(column.name().to_string(), value);
    }
    map
}

fn column_value(
    row: &tokio_postgres::Row,
    idx: usize,
    ty: &Type,
) -> Result<Value, tokio_postgres::Error> {
    fn opt<T>(value: Option<T>, f: impl FnOnce(T) -> Value) -> Value {
        value.map_or(Value::Null, f)
    }

    Ok(match *ty {
        Type::BOOL => opt(row.try_get::<_, Option<bool>>(idx)?, Value::Bool),
        Type::INT2 => opt(row.try_get::<_, Option<i16>>(idx)?, Value::from),
        Type::INT4 => opt(row.try_get::<_, Option<i32>>(idx)?, Value::from),
        Type::INT8 => opt(row.try_get::<_, Option<i64>>(idx)?, Value::from),
        Type::FLOAT4 => opt(row.try_get::<_, Option<f32>>(idx)?, |v| {
            Value::from(f64::from(v))
        }),
        Type::FLOAT8 => opt(row.try_get::<_, Option<f64>>(idx)?, Value::from),
        Type::NUMERIC => opt(row.try_get::<_, Option<Decimal>>(idx)?, |d| {
            Value::String(d.to_string())
        }),
        Type::DATE => opt(row.try_get::<_, Option<NaiveDate>>(idx)?, |d| {
            Value::String(d.to_string())
        }),
        Type::TIMESTAMP => opt(row.try_get::<_, Option<NaiveDateTime>>(idx)?, |ts| {
            Value::String(ts.to_string())
        }),
        Type::TIMESTAMPTZ => opt(row.try_get::<_, Option<DateTime<Utc>>>(idx)?, |ts| {
            Value::String(ts.to_rfc3339())
        }),
        Type::JSON | Type::JSONB => opt(row.try_get::<_, Option<Value>>(idx)?, |v| v),
        _ => opt(row.try_get::<_, Option<String>>(idx)?, Value::String),
    })
}

/// Decode a row returned by the simple query protocol (all values are text).
pub fn simple_row(row: &SimpleQueryRow) -> Row {
    let mut map = Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = row
            .get(idx)
            .map_or(Value::Null, |text| Value::String(text.to_string()));
        map.insert(column.name().to_string(), value);
    }
    map
}
