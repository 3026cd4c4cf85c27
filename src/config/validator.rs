//! Config validation: active connection present and values in range.

use crate::config::{AppConfig, Driver};
use crate::error::ConfigError;

pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    config.database.active()?;

    for (name, conn) in &config.database.connections {
        if conn.database.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "database",
                message: format!("connection '{}' has no database name", name),
            });
        }
        if conn.options.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_connections",
                message: format!("connection '{}' must allow at least one connection", name),
            });
        }
        if conn.driver == Driver::Mysql && conn.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "host",
                message: format!("connection '{}' has no host", name),
            });
        }
    }

    let threshold = config.database.logging.slow_query_threshold;
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(ConfigError::InvalidValue {
            key: "slow_query_threshold",
            message: format!("must be a non-negative number of seconds, got {}", threshold),
        });
    }

    if config.server.body_limit == 0 {
        return Err(ConfigError::InvalidValue {
            key: "body_limit",
            message: "must be greater than zero".into(),
        });
    }

    Ok(())
}
