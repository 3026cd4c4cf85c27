//! Configuration types: application settings, database connections, query logging, server.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Fallback prefix for certificate reference numbers when the settings table has none.
    #[serde(default = "default_certificate_prefix")]
    pub certificate_prefix: String,
}

impl AppSettings {
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            name: default_app_name(),
            version: default_version(),
            url: String::new(),
            environment: Environment::default(),
            debug: false,
            timezone: default_timezone(),
            locale: default_locale(),
            certificate_prefix: default_certificate_prefix(),
        }
    }
}

fn default_app_name() -> String {
    "CertiFlow".into()
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").into()
}

fn default_timezone() -> String {
    "Europe/London".into()
}

fn default_locale() -> String {
    "en_GB".into()
}

fn default_certificate_prefix() -> String {
    "GE-".into()
}

/// Database driver behind a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    Mysql,
    Sqlite,
}

impl Driver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Mysql => "mysql",
            Driver::Sqlite => "sqlite",
        }
    }
}

impl std::str::FromStr for Driver {
    type Err = crate::error::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Driver::Mysql),
            "sqlite" => Ok(Driver::Sqlite),
            other => Err(crate::error::ConfigError::UnsupportedDriver(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionOptions {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// SQLite: create the database file when missing.
    #[serde(default = "default_true")]
    pub create_if_missing: bool,
    /// SQLite: enforce foreign keys.
    #[serde(default = "default_true")]
    pub foreign_keys: bool,
    /// MySQL: `disabled`, `preferred`, `required`, `verify_ca` or `verify_identity`.
    #[serde(default)]
    pub ssl_mode: Option<String>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        ConnectionOptions {
            max_connections: default_max_connections(),
            create_if_missing: true,
            foreign_keys: true,
            ssl_mode: None,
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

/// Parameters for one named connection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub driver: Driver,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Schema name for MySQL; file path or `:memory:` for SQLite.
    pub database: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_charset")]
    pub charset: String,
    #[serde(default = "default_collation")]
    pub collation: String,
    #[serde(default)]
    pub options: ConnectionOptions,
}

impl ConnectionConfig {
    /// In-memory SQLite connection, used by tests and `check-db --sqlite`.
    pub fn sqlite_memory() -> Self {
        ConnectionConfig {
            driver: Driver::Sqlite,
            host: String::new(),
            port: 0,
            database: ":memory:".into(),
            username: String::new(),
            password: String::new(),
            charset: default_charset(),
            collation: default_collation(),
            options: ConnectionOptions {
                max_connections: 1,
                ..ConnectionOptions::default()
            },
        }
    }
}

fn default_host() -> String {
    "localhost".into()
}

fn default_port() -> u16 {
    3306
}

fn default_charset() -> String {
    "utf8mb4".into()
}

fn default_collation() -> String {
    "utf8mb4_unicode_ci".into()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub log_queries: bool,
    /// Seconds; statements slower than this are logged as slow.
    #[serde(default = "default_slow_query_threshold")]
    pub slow_query_threshold: f64,
}

impl LoggingConfig {
    pub fn logs_queries(&self) -> bool {
        self.enabled && self.log_queries
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            enabled: false,
            log_queries: false,
            slow_query_threshold: default_slow_query_threshold(),
        }
    }
}

fn default_slow_query_threshold() -> f64 {
    1.0
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Name of the active connection in `connections`.
    pub default: String,
    pub connections: HashMap<String, ConnectionConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DatabaseConfig {
    pub fn connection(&self, name: &str) -> Option<&ConnectionConfig> {
        self.connections.get(name)
    }

    /// The active connection. Present once the config passed `validate`.
    pub fn active(&self) -> Result<&ConnectionConfig, crate::error::ConfigError> {
        self.connection(&self.default)
            .ok_or_else(|| crate::error::ConfigError::MissingConnection(self.default.clone()))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Maximum accepted request body, in bytes.
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: default_bind_addr(),
            body_limit: default_body_limit(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".into()
}

fn default_body_limit() -> usize {
    10 * 1024 * 1024
}

/// All configuration in one struct, loaded once at process start.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
}
