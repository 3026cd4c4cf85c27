//! Statement parameters: positional or named, converted from JSON values to types sqlx can bind.

use crate::record::Record;
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::mysql::{MySql, MySqlTypeInfo};
use sqlx::sqlite::{Sqlite, SqliteTypeInfo};
use sqlx::{Database, Type};
use std::borrow::Cow;

/// Parameters for one statement: positional `?` values, or `:name` values rewritten to
/// positional placeholders before execution.
#[derive(Clone, Debug, Default)]
pub enum Params {
    #[default]
    None,
    Positional(Vec<Value>),
    Named(Record),
}

impl From<Vec<Value>> for Params {
    fn from(v: Vec<Value>) -> Self {
        Params::Positional(v)
    }
}

impl<const N: usize> From<[Value; N]> for Params {
    fn from(v: [Value; N]) -> Self {
        Params::Positional(v.into())
    }
}

impl From<&[Value]> for Params {
    fn from(v: &[Value]) -> Self {
        Params::Positional(v.to_vec())
    }
}

impl From<Record> for Params {
    fn from(r: Record) -> Self {
        Params::Named(r)
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Params::None
    }
}

/// Resolve `params` against `sql`: positional values pass through, named placeholders are
/// replaced by `?` in order of appearance (a name may repeat). Text inside quotes is left alone.
pub fn prepare(sql: &str, params: Params) -> Result<(Cow<'_, str>, Vec<Value>), String> {
    match params {
        Params::None => Ok((Cow::Borrowed(sql), Vec::new())),
        Params::Positional(values) => Ok((Cow::Borrowed(sql), values)),
        Params::Named(record) => {
            let mut out = String::with_capacity(sql.len());
            let mut values = Vec::new();
            let mut quote: Option<char> = None;
            let mut chars = sql.char_indices().peekable();
            let mut prev: Option<char> = None;
            while let Some((i, c)) = chars.next() {
                if let Some(q) = quote {
                    out.push(c);
                    if c == q {
                        quote = None;
                    }
                    prev = Some(c);
                    continue;
                }
                match c {
                    '\'' | '"' | '`' => {
                        quote = Some(c);
                        out.push(c);
                    }
                    ':' if prev != Some(':')
                        && matches!(chars.peek(), Some((_, n)) if n.is_ascii_alphabetic() || *n == '_') =>
                    {
                        let start = i + 1;
                        let mut end = start;
                        while let Some((j, n)) = chars.peek() {
                            if n.is_ascii_alphanumeric() || *n == '_' {
                                end = j + n.len_utf8();
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        let name = &sql[start..end];
                        let value = record
                            .get(name)
                            .cloned()
                            .ok_or_else(|| format!("missing value for named parameter :{}", name))?;
                        values.push(value);
                        out.push('?');
                    }
                    _ => out.push(c),
                }
                prev = Some(c);
            }
            Ok((Cow::Owned(out), values))
        }
    }
}

/// A value that can be bound to a MySQL or SQLite statement. Converts from serde_json::Value.
#[derive(Clone, Debug, PartialEq)]
pub enum BindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
}

impl BindValue {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => BindValue::Null,
            Value::Bool(b) => BindValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    BindValue::I64(i)
                } else if let Some(f) = n.as_f64() {
                    BindValue::F64(f)
                } else {
                    BindValue::String(n.to_string())
                }
            }
            Value::String(s) => BindValue::String(s.clone()),
            // JSON columns take the serialized document.
            Value::Array(_) | Value::Object(_) => BindValue::String(v.to_string()),
        }
    }
}

impl<'q> Encode<'q, MySql> for BindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <MySql as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            BindValue::Null => IsNull::Yes,
            BindValue::Bool(b) => <bool as Encode<MySql>>::encode_by_ref(b, buf)?,
            BindValue::I64(n) => <i64 as Encode<MySql>>::encode_by_ref(n, buf)?,
            BindValue::F64(n) => <f64 as Encode<MySql>>::encode_by_ref(n, buf)?,
            BindValue::String(s) => <String as Encode<MySql>>::encode_by_ref(s, buf)?,
        })
    }

    fn produces(&self) -> Option<MySqlTypeInfo> {
        Some(match self {
            BindValue::Null | BindValue::String(_) => <str as Type<MySql>>::type_info(),
            BindValue::Bool(_) => <bool as Type<MySql>>::type_info(),
            BindValue::I64(_) => <i64 as Type<MySql>>::type_info(),
            BindValue::F64(_) => <f64 as Type<MySql>>::type_info(),
        })
    }
}

impl Type<MySql> for BindValue {
    fn type_info() -> MySqlTypeInfo {
        <str as Type<MySql>>::type_info()
    }
}

impl<'q> Encode<'q, Sqlite> for BindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            BindValue::Null => <Option<i64> as Encode<Sqlite>>::encode_by_ref(&None, buf)?,
            BindValue::Bool(b) => <bool as Encode<Sqlite>>::encode_by_ref(b, buf)?,
            BindValue::I64(n) => <i64 as Encode<Sqlite>>::encode_by_ref(n, buf)?,
            BindValue::F64(n) => <f64 as Encode<Sqlite>>::encode_by_ref(n, buf)?,
            BindValue::String(s) => <String as Encode<Sqlite>>::encode_by_ref(s, buf)?,
        })
    }
}

impl Type<Sqlite> for BindValue {
    fn type_info() -> SqliteTypeInfo {
        <str as Type<Sqlite>>::type_info()
    }
}
