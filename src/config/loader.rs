//! Load config from the process environment (after `.env`) or from a JSON file.

use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

/// Connection name used for test databases, always present next to the default.
pub const TESTING_CONNECTION: &str = "testing";

/// A raw environment value after interpreting the `true`/`false`/`null`/`empty` keywords.
#[derive(Clone, Debug, PartialEq)]
pub enum EnvValue {
    Bool(bool),
    Null,
    Text(String),
}

pub fn parse_env_value(raw: &str) -> EnvValue {
    match raw.trim().to_lowercase().as_str() {
        "true" | "(true)" => EnvValue::Bool(true),
        "false" | "(false)" => EnvValue::Bool(false),
        "null" | "(null)" => EnvValue::Null,
        "empty" | "(empty)" => EnvValue::Text(String::new()),
        _ => EnvValue::Text(raw.trim().to_string()),
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn text(&self, key: &str) -> Option<String> {
        match parse_env_value(&(self.lookup)(key)?) {
            EnvValue::Text(s) => Some(s),
            EnvValue::Bool(b) => Some(b.to_string()),
            EnvValue::Null => None,
        }
    }

    fn text_or(&self, key: &str, default: &str) -> String {
        self.text(key).unwrap_or_else(|| default.to_string())
    }

    fn flag(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        let Some(raw) = (self.lookup)(key) else {
            return Ok(default);
        };
        match parse_env_value(&raw) {
            EnvValue::Bool(b) => Ok(b),
            EnvValue::Null => Ok(default),
            EnvValue::Text(s) => match s.as_str() {
                "1" | "yes" | "on" => Ok(true),
                "0" | "no" | "off" | "" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    key,
                    message: format!("expected a boolean, got '{}'", s),
                }),
            },
        }
    }

    fn parsed<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.text(key) {
            None => Ok(default),
            Some(s) if s.is_empty() => Ok(default),
            Some(s) => s.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                key,
                message: e.to_string(),
            }),
        }
    }
}

impl AppConfig {
    /// Load `.env` (variables already set in the process win), then build and validate config.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(ConfigError::Load(e.to_string())),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from any key lookup (environment, map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let environment: Environment = env
            .parsed("APP_ENV", Environment::Development)?;
        let app = AppSettings {
            name: env.text_or("APP_NAME", "CertiFlow"),
            url: env.text_or("APP_URL", ""),
            environment,
            debug: env.flag("APP_DEBUG", environment == Environment::Development)?,
            timezone: env.text_or("APP_TIMEZONE", "Europe/London"),
            certificate_prefix: env.text_or("CERTIFICATE_PREFIX", "GE-"),
            ..AppSettings::default()
        };

        let driver: Driver = env.text_or("DB_DRIVER", "mysql").parse()?;
        let default_name = env.text_or("DB_CONNECTION", driver.as_str());
        let primary = ConnectionConfig {
            driver,
            host: env.text_or("DB_HOST", "localhost"),
            port: env.parsed("DB_PORT", 3306)?,
            database: env.text_or("DB_DATABASE", "certiflow"),
            username: env.text_or("DB_USERNAME", ""),
            password: env.text_or("DB_PASSWORD", ""),
            charset: env.text_or("DB_CHARSET", "utf8mb4"),
            collation: env.text_or("DB_COLLATION", "utf8mb4_unicode_ci"),
            options: ConnectionOptions {
                max_connections: env.parsed("DB_MAX_CONNECTIONS", 5)?,
                ..ConnectionOptions::default()
            },
        };
        let testing = ConnectionConfig {
            database: env.text_or("DB_TEST_DATABASE", &format!("{}_test", primary.database)),
            ..primary.clone()
        };

        let mut connections = HashMap::new();
        connections.insert(default_name.clone(), primary);
        connections.entry(TESTING_CONNECTION.to_string()).or_insert(testing);

        let logging = LoggingConfig {
            enabled: env.flag("DB_LOGGING", false)?,
            log_queries: env.flag("DB_LOG_QUERIES", false)?,
            slow_query_threshold: env.parsed("DB_SLOW_THRESHOLD", 1.0)?,
        };

        let server = ServerConfig {
            bind_addr: env.text_or("BIND_ADDR", "0.0.0.0:3000"),
            ..ServerConfig::default()
        };

        let config = AppConfig {
            app,
            database: DatabaseConfig {
                default: default_name,
                connections,
                logging,
            },
            server,
        };
        validate(&config)?;
        Ok(config)
    }

    /// Load config from a JSON file with the same structure as `AppConfig`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        let config: AppConfig =
            serde_json::from_str(&text).map_err(|e| ConfigError::Load(e.to_string()))?;
        validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_mysql_on_localhost() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        let active = config.database.active().unwrap();
        assert_eq!(config.database.default, "mysql");
        assert_eq!(active.driver, Driver::Mysql);
        assert_eq!(active.host, "localhost");
        assert_eq!(active.port, 3306);
        assert_eq!(active.charset, "utf8mb4");
        assert!(config.database.connection(TESTING_CONNECTION).is_some());
        assert!(!config.database.logging.logs_queries());
        assert_eq!(config.database.logging.slow_query_threshold, 1.0);
    }

    #[test]
    fn reads_database_variables() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "3307"),
            ("DB_DATABASE", "certs"),
            ("DB_USERNAME", "app"),
            ("DB_PASSWORD", "\"secret\""),
            ("DB_LOGGING", "(true)"),
            ("DB_LOG_QUERIES", "true"),
            ("DB_SLOW_THRESHOLD", "0.25"),
        ]))
        .unwrap();
        let active = config.database.active().unwrap();
        assert_eq!(active.host, "db.internal");
        assert_eq!(active.port, 3307);
        assert_eq!(active.database, "certs");
        assert_eq!(active.username, "app");
        assert!(config.database.logging.logs_queries());
        assert_eq!(config.database.logging.slow_query_threshold, 0.25);
        assert_eq!(
            config.database.connection(TESTING_CONNECTION).unwrap().database,
            "certs_test"
        );
    }

    #[test]
    fn env_keywords() {
        assert_eq!(parse_env_value("(false)"), EnvValue::Bool(false));
        assert_eq!(parse_env_value("NULL"), EnvValue::Null);
        assert_eq!(parse_env_value("empty"), EnvValue::Text(String::new()));
        assert_eq!(parse_env_value(" value "), EnvValue::Text("value".into()));
    }

    #[test]
    fn rejects_bad_port_and_driver() {
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("DB_PORT", "abc")])),
            Err(ConfigError::InvalidValue { key: "DB_PORT", .. })
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("DB_DRIVER", "oracle")])),
            Err(ConfigError::UnsupportedDriver(_))
        ));
    }

    #[test]
    fn production_disables_debug_by_default() {
        let config = AppConfig::from_lookup(lookup(&[("APP_ENV", "production")])).unwrap();
        assert!(!config.app.debug);
        assert!(!config.app.is_development());
    }
}
