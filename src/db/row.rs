//! Decode driver rows into `Record`s with plain JSON scalars (numbers, strings, null).

use crate::record::Record;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use sqlx::mysql::MySqlRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn mysql_record(row: &MySqlRow) -> Record {
    row.columns()
        .iter()
        .map(|col| (col.name().to_string(), mysql_cell(row, col.ordinal())))
        .collect()
}

fn mysql_cell(row: &MySqlRow, i: usize) -> Value {
    match row.try_get_raw(i) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(_) => return Value::Null,
    }
    if let Ok(n) = row.try_get::<i64, _>(i) {
        return Value::from(n);
    }
    if let Ok(n) = row.try_get::<u64, _>(i) {
        return Value::from(n);
    }
    if let Ok(b) = row.try_get::<bool, _>(i) {
        return Value::from(i64::from(b));
    }
    if let Ok(n) = row.try_get::<f64, _>(i) {
        return float(n);
    }
    if let Ok(n) = row.try_get::<f32, _>(i) {
        return float(f64::from(n));
    }
    if let Ok(d) = row.try_get::<NaiveDateTime, _>(i) {
        return Value::String(d.format(DATETIME_FORMAT).to_string());
    }
    if let Ok(d) = row.try_get::<DateTime<Utc>, _>(i) {
        return Value::String(d.format(DATETIME_FORMAT).to_string());
    }
    if let Ok(d) = row.try_get::<NaiveDate, _>(i) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(t) = row.try_get::<NaiveTime, _>(i) {
        return Value::String(t.format("%H:%M:%S").to_string());
    }
    if let Ok(s) = row.try_get::<String, _>(i) {
        return Value::String(s);
    }
    // JSON columns come back as the document text, the way the schema stores them.
    if let Ok(v) = row.try_get::<serde_json::Value, _>(i) {
        return Value::String(v.to_string());
    }
    if let Ok(bytes) = row.try_get::<Vec<u8>, _>(i) {
        return Value::String(String::from_utf8_lossy(&bytes).into_owned());
    }
    // DECIMAL and friends travel as text on the wire.
    match row.try_get_unchecked::<String, _>(i) {
        Ok(s) => Value::String(s),
        Err(e) => {
            tracing::warn!(column = i, error = %e, "undecodable column value");
            Value::Null
        }
    }
}

pub fn sqlite_record(row: &SqliteRow) -> Record {
    row.columns()
        .iter()
        .map(|col| (col.name().to_string(), sqlite_cell(row, col.ordinal())))
        .collect()
}

/// SQLite values carry their storage class at runtime; decode by that rather than by the
/// declared column type.
fn sqlite_cell(row: &SqliteRow, i: usize) -> Value {
    let class = match row.try_get_raw(i) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Value::Null,
    };
    let decoded = match class.as_str() {
        "INTEGER" | "BOOLEAN" => row.try_get_unchecked::<i64, _>(i).map(Value::from),
        "REAL" => row.try_get_unchecked::<f64, _>(i).map(float),
        "BLOB" => row
            .try_get_unchecked::<Vec<u8>, _>(i)
            .map(|b| Value::String(String::from_utf8_lossy(&b).into_owned())),
        _ => row.try_get_unchecked::<String, _>(i).map(Value::String),
    };
    decoded.unwrap_or_else(|e| {
        tracing::warn!(column = i, error = %e, "undecodable column value");
        Value::Null
    })
}

fn float(n: f64) -> Value {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
