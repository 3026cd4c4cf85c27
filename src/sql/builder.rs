//! Fluent builder for one SELECT, INSERT, UPDATE or DELETE at a time. SQL text is assembled
//! from caller-supplied identifiers and conditions; values only ever travel as parameters.

use crate::db::Database;
use crate::error::DbError;
use crate::record::Record;
use serde_json::Value;

/// Empty parameter list for conditions without placeholders.
pub const NO_PARAMS: [Value; 0] = [];

/// Quote a column name for MySQL and SQLite (both accept backticks).
fn quoted(s: &str) -> String {
    format!("`{}`", s.replace('`', "``"))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    fn keyword(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
        }
    }
}

/// SQL text plus positional parameters, in placeholder order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn reset(&mut self, sql: String) {
        self.sql = sql;
        self.params.clear();
    }

    fn push_params<I, V>(&mut self, params: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.params.extend(params.into_iter().map(Into::into));
    }
}

pub struct QueryBuilder<'db> {
    db: &'db mut Database,
    buf: QueryBuf,
    has_where: bool,
    last_insert_id: Option<String>,
    row_count: u64,
}

impl Database {
    /// Start a query builder on this gateway.
    pub fn query(&mut self) -> QueryBuilder<'_> {
        QueryBuilder::new(self)
    }
}

impl<'db> QueryBuilder<'db> {
    pub fn new(db: &'db mut Database) -> Self {
        QueryBuilder {
            db,
            buf: QueryBuf::default(),
            has_where: false,
            last_insert_id: None,
            row_count: 0,
        }
    }

    fn begin(&mut self, sql: String) -> &mut Self {
        self.buf.reset(sql);
        self.has_where = false;
        self
    }

    /// Start a SELECT of `columns` (raw list, e.g. `"*"` or `"c.id, c.name"`).
    pub fn select(&mut self, columns: &str) -> &mut Self {
        self.begin(format!("SELECT {}", columns))
    }

    pub fn insert(&mut self, table: &str) -> &mut Self {
        self.begin(format!("INSERT INTO {}", table))
    }

    pub fn update(&mut self, table: &str) -> &mut Self {
        self.begin(format!("UPDATE {}", table))
    }

    pub fn delete(&mut self, table: &str) -> &mut Self {
        self.begin(format!("DELETE FROM {}", table))
    }

    pub fn from(&mut self, table: &str) -> &mut Self {
        self.buf.sql.push_str(&format!(" FROM {}", table));
        self
    }

    pub fn from_as(&mut self, table: &str, alias: &str) -> &mut Self {
        self.buf.sql.push_str(&format!(" FROM {} {}", table, alias));
        self
    }

    /// Append a join; `condition` is raw SQL.
    pub fn join_with(&mut self, kind: JoinKind, table: &str, condition: &str) -> &mut Self {
        self.buf
            .sql
            .push_str(&format!(" {} JOIN {} ON {}", kind.keyword(), table, condition));
        self
    }

    pub fn join(&mut self, table: &str, condition: &str) -> &mut Self {
        self.join_with(JoinKind::Inner, table, condition)
    }

    pub fn left_join(&mut self, table: &str, condition: &str) -> &mut Self {
        self.join_with(JoinKind::Left, table, condition)
    }

    pub fn right_join(&mut self, table: &str, condition: &str) -> &mut Self {
        self.join_with(JoinKind::Right, table, condition)
    }

    /// `WHERE` on the first condition, `AND` afterwards. `params` bind to the `?`s in
    /// `condition`, in order.
    pub fn and_where<I, V>(&mut self, condition: &str, params: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push_condition("AND", condition, params)
    }

    /// `WHERE` on the first condition, `OR` afterwards.
    pub fn or_where<I, V>(&mut self, condition: &str, params: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push_condition("OR", condition, params)
    }

    fn push_condition<I, V>(&mut self, joiner: &str, condition: &str, params: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let keyword = if self.has_where { joiner } else { "WHERE" };
        self.buf.sql.push_str(&format!(" {} {}", keyword, condition));
        self.buf.push_params(params);
        self.has_where = true;
        self
    }

    pub fn order_by(&mut self, clause: &str) -> &mut Self {
        self.buf.sql.push_str(&format!(" ORDER BY {}", clause));
        self
    }

    pub fn group_by(&mut self, columns: &str) -> &mut Self {
        self.buf.sql.push_str(&format!(" GROUP BY {}", columns));
        self
    }

    pub fn having<I, V>(&mut self, condition: &str, params: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.buf.sql.push_str(&format!(" HAVING {}", condition));
        self.buf.push_params(params);
        self
    }

    /// `LIMIT n`, or `LIMIT offset, n` when `offset > 0`.
    pub fn limit(&mut self, n: u64, offset: u64) -> &mut Self {
        if offset > 0 {
            self.buf.sql.push_str(&format!(" LIMIT {}, {}", offset, n));
        } else {
            self.buf.sql.push_str(&format!(" LIMIT {}", n));
        }
        self
    }

    /// Column list and placeholders for an INSERT, in the record's key order.
    pub fn values(&mut self, record: &Record) -> &mut Self {
        let columns: Vec<String> = record.keys().map(|k| quoted(k)).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        self.buf.sql.push_str(&format!(
            " ({}) VALUES ({})",
            columns.join(", "),
            placeholders
        ));
        self.buf.push_params(record.values().cloned());
        self
    }

    /// `SET col = ?` pairs for an UPDATE, in the record's key order.
    pub fn set(&mut self, record: &Record) -> &mut Self {
        let pairs: Vec<String> = record.keys().map(|k| format!("{} = ?", quoted(k))).collect();
        self.buf.sql.push_str(&format!(" SET {}", pairs.join(", ")));
        self.buf.push_params(record.values().cloned());
        self
    }

    pub fn sql(&self) -> &str {
        &self.buf.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.buf.params
    }

    /// Id recorded by the last INSERT run through `execute`.
    pub fn last_insert_id(&self) -> Option<&str> {
        self.last_insert_id.as_deref()
    }

    /// Rows returned or affected by the last terminal call.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// All rows of the current statement.
    pub async fn fetch(&mut self) -> Result<Vec<Record>, DbError> {
        let stmt = self
            .db
            .execute(&self.buf.sql, self.buf.params.clone())
            .await?;
        self.row_count = stmt.row_count();
        Ok(stmt.fetch_all())
    }

    pub async fn fetch_one(&mut self) -> Result<Option<Record>, DbError> {
        let mut stmt = self
            .db
            .execute(&self.buf.sql, self.buf.params.clone())
            .await?;
        self.row_count = stmt.row_count();
        Ok(stmt.fetch_one())
    }

    /// First column of the first row.
    pub async fn fetch_value(&mut self) -> Result<Option<Value>, DbError> {
        Ok(self
            .fetch_one()
            .await?
            .and_then(|row| row.first_value().cloned()))
    }

    /// Run a write statement; returns the affected-row count.
    pub async fn execute(&mut self) -> Result<u64, DbError> {
        let stmt = self
            .db
            .execute(&self.buf.sql, self.buf.params.clone())
            .await?;
        self.row_count = stmt.row_count();
        if self.buf.sql.trim_start().to_ascii_uppercase().starts_with("INSERT") {
            self.last_insert_id = Some(self.db.last_insert_id().to_string());
        }
        Ok(self.row_count)
    }
}
