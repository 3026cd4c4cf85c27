//! Database gateway: one live connection per instance, parameterized execution, buffered
//! statements, transactions and query logging.

pub mod params;
pub mod row;

pub use params::{BindValue, Params};

use crate::config::{ConnectionConfig, Driver, LoggingConfig};
use crate::error::DbError;
use crate::record::Record;
use serde_json::Value;
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlConnection, MySqlPool, MySqlPoolOptions};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::collections::VecDeque;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::Level;

/// Shared connection pool for the configured driver. The only database object shared across
/// requests; each request checks out its own connection through `Database::from_pool`.
#[derive(Clone, Debug)]
pub enum DbPool {
    Mysql(MySqlPool),
    Sqlite(SqlitePool),
}

impl DbPool {
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, DbError> {
        let max = config.options.max_connections.max(1);
        let pool = match config.driver {
            Driver::Mysql => {
                let pool = MySqlPoolOptions::new()
                    .max_connections(max)
                    .connect_with(mysql_options(config)?)
                    .await
                    .map_err(connection_error)?;
                DbPool::Mysql(pool)
            }
            Driver::Sqlite => {
                let mut opts = SqlitePoolOptions::new().max_connections(max);
                if is_memory(config) {
                    // Every connection to :memory: is a separate database; keep the one alive.
                    opts = opts.max_connections(1).idle_timeout(None).max_lifetime(None);
                }
                let pool = opts
                    .connect_with(sqlite_options(config)?)
                    .await
                    .map_err(connection_error)?;
                DbPool::Sqlite(pool)
            }
        };
        tracing::info!(driver = config.driver.as_str(), database = %config.database, "database pool ready");
        Ok(pool)
    }

    pub fn driver(&self) -> Driver {
        match self {
            DbPool::Mysql(_) => Driver::Mysql,
            DbPool::Sqlite(_) => Driver::Sqlite,
        }
    }

    async fn checkout(&self) -> Result<Live, DbError> {
        Ok(match self {
            DbPool::Mysql(p) => Live::Mysql(Handle::Pooled(p.acquire().await.map_err(connection_error)?)),
            DbPool::Sqlite(p) => Live::Sqlite(Handle::Pooled(p.acquire().await.map_err(connection_error)?)),
        })
    }

    pub async fn close(&self) {
        match self {
            DbPool::Mysql(p) => p.close().await,
            DbPool::Sqlite(p) => p.close().await,
        }
    }
}

fn is_memory(config: &ConnectionConfig) -> bool {
    config.database == ":memory:" || config.database == "sqlite::memory:"
}

fn connection_error(e: sqlx::Error) -> DbError {
    DbError::Connection { message: e.to_string() }
}

fn mysql_options(config: &ConnectionConfig) -> Result<MySqlConnectOptions, DbError> {
    let mut opts = MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.username)
        .database(&config.database)
        .charset(&config.charset)
        .collation(&config.collation);
    if !config.password.is_empty() {
        opts = opts.password(&config.password);
    }
    if let Some(mode) = &config.options.ssl_mode {
        opts = opts.ssl_mode(mode.parse().map_err(connection_error)?);
    }
    Ok(opts)
}

fn sqlite_options(config: &ConnectionConfig) -> Result<SqliteConnectOptions, DbError> {
    let opts = if is_memory(config) {
        SqliteConnectOptions::from_str("sqlite::memory:").map_err(connection_error)?
    } else {
        SqliteConnectOptions::new()
            .filename(&config.database)
            .create_if_missing(config.options.create_if_missing)
    };
    Ok(opts.foreign_keys(config.options.foreign_keys))
}

/// A connection the gateway owns outright or has checked out of a pool.
enum Handle<DB: sqlx::Database> {
    Owned(DB::Connection),
    Pooled(PoolConnection<DB>),
}

impl<DB: sqlx::Database> Handle<DB> {
    fn conn(&mut self) -> &mut DB::Connection {
        match self {
            Handle::Owned(c) => c,
            Handle::Pooled(c) => &mut **c,
        }
    }
}

enum Live {
    Mysql(Handle<MySql>),
    Sqlite(Handle<Sqlite>),
}

enum Source {
    Config(ConnectionConfig),
    Pool(DbPool),
}

/// Result of one executed statement. Rows are buffered, so the handle stays valid after the
/// gateway runs other statements.
#[derive(Debug, Default)]
pub struct Statement {
    rows: VecDeque<Record>,
    row_count: u64,
}

impl Statement {
    /// Next row, or `None` once exhausted.
    pub fn fetch_one(&mut self) -> Option<Record> {
        self.rows.pop_front()
    }

    /// All remaining rows.
    pub fn fetch_all(self) -> Vec<Record> {
        self.rows.into()
    }

    /// Rows returned (queries) or affected (writes).
    pub fn row_count(&self) -> u64 {
        self.row_count
    }
}

struct Outcome {
    rows: Vec<Record>,
    row_count: u64,
    last_insert_id: Option<String>,
}

pub struct Database {
    source: Source,
    live: Option<Live>,
    logging: LoggingConfig,
    row_count: u64,
    last_insert_id: String,
    in_transaction: bool,
}

impl Database {
    /// Gateway that opens its own connection from `config` on first use.
    pub fn new(config: ConnectionConfig, logging: LoggingConfig) -> Self {
        Self::with_source(Source::Config(config), logging)
    }

    /// Gateway that checks one connection out of `pool` on first use and holds it until drop.
    pub fn from_pool(pool: DbPool, logging: LoggingConfig) -> Self {
        Self::with_source(Source::Pool(pool), logging)
    }

    fn with_source(source: Source, logging: LoggingConfig) -> Self {
        Database {
            source,
            live: None,
            logging,
            row_count: 0,
            last_insert_id: "0".into(),
            in_transaction: false,
        }
    }

    pub fn driver(&self) -> Driver {
        match &self.source {
            Source::Config(c) => c.driver,
            Source::Pool(p) => p.driver(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.live.is_some()
    }

    /// Open the live connection now. No retry on failure.
    pub async fn connect(&mut self) -> Result<(), DbError> {
        self.live().await.map(|_| ())
    }

    async fn live(&mut self) -> Result<&mut Live, DbError> {
        if self.live.is_none() {
            let live = match &self.source {
                Source::Config(config) => open(config).await,
                Source::Pool(pool) => pool.checkout().await,
            };
            match live {
                Ok(live) => self.live = Some(live),
                Err(e) => {
                    tracing::error!(error = %e, "database connection failed");
                    return Err(e);
                }
            }
        }
        self.live.as_mut().ok_or_else(|| DbError::Connection {
            message: "connection unavailable".into(),
        })
    }

    /// Run one statement with bound `params` and buffer its result.
    pub async fn execute(&mut self, sql: &str, params: impl Into<Params>) -> Result<Statement, DbError> {
        let (sql, values) = match params::prepare(sql, params.into()) {
            Ok(prepared) => prepared,
            Err(message) => {
                tracing::error!(sql = %sql, error = %message, "query preparation failed");
                return Err(DbError::Query {
                    sql: sql.to_string(),
                    source: sqlx::Error::Encode(message.into()),
                });
            }
        };
        let binds: Vec<BindValue> = values.iter().map(BindValue::from_json).collect();
        let returns_rows = returns_rows(&sql);

        let started = Instant::now();
        let result = match self.live().await? {
            Live::Mysql(h) => run_mysql(h.conn(), &sql, binds, returns_rows).await,
            Live::Sqlite(h) => run_sqlite(h.conn(), &sql, binds, returns_rows).await,
        };
        let elapsed = started.elapsed();

        match result {
            Ok(outcome) => {
                self.log_query(&sql, &values, elapsed);
                self.row_count = outcome.row_count;
                if let Some(id) = outcome.last_insert_id {
                    self.last_insert_id = id;
                }
                Ok(Statement {
                    rows: outcome.rows.into(),
                    row_count: outcome.row_count,
                })
            }
            Err(source) => {
                tracing::error!(sql = %sql, params = ?values, error = %source, "query execution failed");
                Err(DbError::Query {
                    sql: sql.into_owned(),
                    source,
                })
            }
        }
    }

    /// Rows returned or affected by the most recent statement.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Id generated by the most recent insert, as text.
    pub fn last_insert_id(&self) -> &str {
        &self.last_insert_id
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub async fn begin_transaction(&mut self) -> Result<(), DbError> {
        if self.in_transaction {
            return Err(DbError::Transaction("a transaction is already active".into()));
        }
        let sql = match self.driver() {
            Driver::Mysql => "START TRANSACTION",
            Driver::Sqlite => "BEGIN",
        };
        self.raw(sql).await?;
        self.in_transaction = true;
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<(), DbError> {
        if !self.in_transaction {
            return Err(DbError::Transaction("no active transaction to commit".into()));
        }
        self.raw("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    pub async fn rollback(&mut self) -> Result<(), DbError> {
        if !self.in_transaction {
            return Err(DbError::Transaction("no active transaction to roll back".into()));
        }
        self.raw("ROLLBACK").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn raw(&mut self, sql: &'static str) -> Result<(), DbError> {
        let result = match self.live().await? {
            Live::Mysql(h) => raw_mysql(h.conn(), sql).await,
            Live::Sqlite(h) => raw_sqlite(h.conn(), sql).await,
        };
        result.map_err(|source| {
            tracing::error!(sql, error = %source, "transaction statement failed");
            DbError::Query {
                sql: sql.to_string(),
                source,
            }
        })
    }

    fn log_query(&self, sql: &str, params: &[Value], elapsed: Duration) {
        match query_level(&self.logging, elapsed) {
            Level::WARN => {
                tracing::warn!(sql = %sql, params = ?params, elapsed = ?elapsed, "slow query")
            }
            Level::INFO => tracing::info!(sql = %sql, params = ?params, elapsed = ?elapsed, "query"),
            _ => tracing::debug!(sql = %sql, params = ?params, "query"),
        }
    }
}

/// `DEBUG` unless query logging is on; then `WARN` above the slow threshold, else `INFO`.
fn query_level(logging: &LoggingConfig, elapsed: Duration) -> Level {
    if !logging.logs_queries() {
        Level::DEBUG
    } else if elapsed.as_secs_f64() > logging.slow_query_threshold {
        Level::WARN
    } else {
        Level::INFO
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if !self.in_transaction {
            return;
        }
        tracing::warn!("database gateway dropped inside an open transaction; discarding connection");
        match &mut self.live {
            Some(Live::Mysql(Handle::Pooled(c))) => c.close_on_drop(),
            Some(Live::Sqlite(Handle::Pooled(c))) => c.close_on_drop(),
            _ => {}
        }
    }
}

async fn open(config: &ConnectionConfig) -> Result<Live, DbError> {
    Ok(match config.driver {
        Driver::Mysql => {
            let conn = mysql_options(config)?.connect().await.map_err(connection_error)?;
            Live::Mysql(Handle::Owned(conn))
        }
        Driver::Sqlite => {
            let conn = sqlite_options(config)?.connect().await.map_err(connection_error)?;
            Live::Sqlite(Handle::Owned(conn))
        }
    })
}

/// Whether a statement produces a result set rather than an affected-row count.
fn returns_rows(sql: &str) -> bool {
    let head: String = skip_leading_comments(sql)
        .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    matches!(
        head.as_str(),
        "SELECT" | "WITH" | "SHOW" | "PRAGMA" | "EXPLAIN" | "DESCRIBE" | "DESC" | "VALUES"
    ) || sql.to_ascii_uppercase().contains(" RETURNING ")
}

/// Strips leading whitespace and `--` / `/* */` comments.
fn skip_leading_comments(mut sql: &str) -> &str {
    loop {
        sql = sql.trim_start();
        if let Some(rest) = sql.strip_prefix("--") {
            sql = rest.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(rest) = sql.strip_prefix("/*") {
            sql = rest.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            return sql;
        }
    }
}

async fn raw_mysql(conn: &mut MySqlConnection, sql: &'static str) -> Result<(), sqlx::Error> {
    sqlx::Executor::execute(&mut *conn, sqlx::raw_sql(sql)).await.map(|_| ())
}

async fn raw_sqlite(conn: &mut SqliteConnection, sql: &'static str) -> Result<(), sqlx::Error> {
    sqlx::Executor::execute(&mut *conn, sqlx::raw_sql(sql)).await.map(|_| ())
}

async fn run_mysql(
    conn: &mut MySqlConnection,
    sql: &str,
    binds: Vec<BindValue>,
    returns_rows: bool,
) -> Result<Outcome, sqlx::Error> {
    let mut query = sqlx::query::<MySql>(sql);
    for b in binds {
        query = query.bind(b);
    }
    if returns_rows {
        let rows = query.fetch_all(&mut *conn).await?;
        let rows: Vec<Record> = rows.iter().map(row::mysql_record).collect();
        Ok(Outcome {
            row_count: rows.len() as u64,
            rows,
            last_insert_id: None,
        })
    } else {
        let done = query.execute(&mut *conn).await?;
        Ok(Outcome {
            rows: Vec::new(),
            row_count: done.rows_affected(),
            last_insert_id: Some(done.last_insert_id().to_string()),
        })
    }
}

async fn run_sqlite(
    conn: &mut SqliteConnection,
    sql: &str,
    binds: Vec<BindValue>,
    returns_rows: bool,
) -> Result<Outcome, sqlx::Error> {
    let mut query = sqlx::query::<Sqlite>(sql);
    for b in binds {
        query = query.bind(b);
    }
    if returns_rows {
        let rows = query.fetch_all(&mut *conn).await?;
        let rows: Vec<Record> = rows.iter().map(row::sqlite_record).collect();
        Ok(Outcome {
            row_count: rows.len() as u64,
            rows,
            last_insert_id: None,
        })
    } else {
        let done = query.execute(&mut *conn).await?;
        Ok(Outcome {
            rows: Vec::new(),
            row_count: done.rows_affected(),
            last_insert_id: Some(done.last_insert_rowid().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use serde_json::json;

    async fn scratch() -> Database {
        let mut db = testing::memory_db();
        db.execute(
            "CREATE TABLE scratch (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL UNIQUE, qty INTEGER, price REAL, note TEXT)",
            (),
        )
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn connects_lazily() {
        let mut db = testing::memory_db();
        assert!(!db.is_connected());
        db.connect().await.unwrap();
        assert!(db.is_connected());
    }

    #[tokio::test]
    async fn missing_sqlite_file_is_a_connection_error() {
        let mut config = ConnectionConfig::sqlite_memory();
        config.database = "/nonexistent-dir/certiflow.db".into();
        config.options.create_if_missing = false;
        let mut db = Database::new(config, LoggingConfig::default());
        let err = db.execute("SELECT 1", ()).await.unwrap_err();
        assert!(matches!(err, DbError::Connection { .. }));
    }

    #[tokio::test]
    async fn insert_reports_id_and_count() {
        let mut db = scratch().await;
        let stmt = db
            .execute("INSERT INTO scratch (name, qty) VALUES (?, ?)", vec![json!("a"), json!(3)])
            .await
            .unwrap();
        assert_eq!(stmt.row_count(), 1);
        assert_eq!(db.row_count(), 1);
        assert_eq!(db.last_insert_id(), "1");

        db.execute("INSERT INTO scratch (name) VALUES (?)", vec![json!("b")])
            .await
            .unwrap();
        assert_eq!(db.last_insert_id(), "2");
    }

    #[tokio::test]
    async fn named_params_bind_values() {
        let mut db = scratch().await;
        let row = Record::new().with("name", "fuse").with("qty", 2).with("price", 1.5);
        db.execute(
            "INSERT INTO scratch (name, qty, price) VALUES (:name, :qty, :price)",
            row,
        )
        .await
        .unwrap();

        let mut stmt = db
            .execute(
                "SELECT name, qty, price, note FROM scratch WHERE name = :name",
                Record::new().with("name", "fuse"),
            )
            .await
            .unwrap();
        let found = stmt.fetch_one().unwrap();
        assert_eq!(found.get("name"), Some(&json!("fuse")));
        assert_eq!(found.get("qty"), Some(&json!(2)));
        assert_eq!(found.get("price"), Some(&json!(1.5)));
        assert_eq!(found.get("note"), Some(&json!(null)));
        assert!(stmt.fetch_one().is_none());
    }

    #[tokio::test]
    async fn values_are_bound_not_interpolated() {
        let mut db = scratch().await;
        let hostile = "x'); DROP TABLE scratch; --";
        db.execute("INSERT INTO scratch (name) VALUES (?)", vec![json!(hostile)])
            .await
            .unwrap();
        let rows = db
            .execute("SELECT name FROM scratch", ())
            .await
            .unwrap()
            .fetch_all();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("name"), Some(hostile));
    }

    #[tokio::test]
    async fn statements_survive_later_execute() {
        let mut db = scratch().await;
        for name in ["a", "b"] {
            db.execute("INSERT INTO scratch (name) VALUES (?)", vec![json!(name)])
                .await
                .unwrap();
        }
        let first = db.execute("SELECT name FROM scratch ORDER BY id", ()).await.unwrap();
        let _second = db.execute("SELECT COUNT(*) AS n FROM scratch", ()).await.unwrap();
        assert_eq!(first.row_count(), 2);
        assert_eq!(first.fetch_all().len(), 2);
    }

    #[tokio::test]
    async fn constraint_violation_is_query_error_with_sql() {
        let mut db = scratch().await;
        let sql = "INSERT INTO scratch (name) VALUES (?)";
        db.execute(sql, vec![json!("dup")]).await.unwrap();
        let err = db.execute(sql, vec![json!("dup")]).await.unwrap_err();
        assert_eq!(err.sql(), Some(sql));
    }

    #[tokio::test]
    async fn missing_named_value_is_query_error() {
        let mut db = scratch().await;
        let err = db
            .execute("SELECT * FROM scratch WHERE id = :id", Record::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Query { .. }));
    }

    #[tokio::test]
    async fn rollback_discards_and_commit_keeps() {
        let mut db = scratch().await;
        db.begin_transaction().await.unwrap();
        db.execute("INSERT INTO scratch (name) VALUES ('gone')", ()).await.unwrap();
        db.rollback().await.unwrap();

        db.begin_transaction().await.unwrap();
        db.execute("INSERT INTO scratch (name) VALUES ('kept')", ()).await.unwrap();
        db.commit().await.unwrap();

        let rows = db.execute("SELECT name FROM scratch", ()).await.unwrap().fetch_all();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("name"), Some("kept"));
    }

    #[tokio::test]
    async fn transactions_do_not_nest() {
        let mut db = scratch().await;
        assert!(matches!(db.commit().await, Err(DbError::Transaction(_))));
        assert!(matches!(db.rollback().await, Err(DbError::Transaction(_))));
        db.begin_transaction().await.unwrap();
        assert!(matches!(db.begin_transaction().await, Err(DbError::Transaction(_))));
        assert!(db.in_transaction());
        db.rollback().await.unwrap();
        assert!(!db.in_transaction());
    }

    #[tokio::test]
    async fn pooled_gateways_share_the_memory_database() {
        let pool = testing::memory_pool().await;
        {
            let mut db = Database::from_pool(pool.clone(), LoggingConfig::default());
            db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)", ()).await.unwrap();
            db.execute("INSERT INTO t (id) VALUES (7)", ()).await.unwrap();
        }
        let mut db = Database::from_pool(pool, LoggingConfig::default());
        let row = db.execute("SELECT id FROM t", ()).await.unwrap().fetch_one().unwrap();
        assert_eq!(row.get_i64("id"), Some(7));
    }

    #[test]
    fn detects_result_set_statements() {
        assert!(returns_rows("  select 1"));
        assert!(returns_rows("(SELECT 1) UNION (SELECT 2)"));
        assert!(returns_rows("WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(returns_rows("DELETE FROM t WHERE id = 1 RETURNING id"));
        assert!(!returns_rows("INSERT INTO t (a) VALUES (1)"));
        assert!(!returns_rows("UPDATE t SET a = 1"));
        assert!(returns_rows("-- latest first\nSELECT * FROM t"));
        assert!(returns_rows("/* report */ /* v2 */ SELECT 1"));
        assert!(!returns_rows("-- cleanup\n  DELETE FROM t"));
        assert!(!returns_rows("-- only a comment"));
    }

    #[tokio::test]
    async fn commented_select_keeps_its_rows() {
        let mut db = testing::memory_db();
        let mut stmt = db.execute("-- health check\nSELECT 1 AS ok", ()).await.unwrap();
        assert_eq!(stmt.fetch_one().and_then(|r| r.get_i64("ok")), Some(1));
    }

    #[test]
    fn query_level_follows_logging_config() {
        let fast = Duration::from_millis(10);
        let slow = Duration::from_secs(2);

        let off = LoggingConfig::default();
        assert_eq!(query_level(&off, fast), Level::DEBUG);
        assert_eq!(query_level(&off, slow), Level::DEBUG);

        let queries_only = LoggingConfig {
            enabled: false,
            log_queries: true,
            ..LoggingConfig::default()
        };
        assert_eq!(query_level(&queries_only, slow), Level::DEBUG);

        let on = LoggingConfig {
            enabled: true,
            log_queries: true,
            slow_query_threshold: 1.0,
        };
        assert_eq!(query_level(&on, fast), Level::INFO);
        assert_eq!(query_level(&on, Duration::from_secs(1)), Level::INFO);
        assert_eq!(query_level(&on, slow), Level::WARN);
    }
}
