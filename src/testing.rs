//! In-memory SQLite fixtures shared by the unit tests.

use crate::config::{AppConfig, AppSettings, ConnectionConfig, DatabaseConfig, LoggingConfig, ServerConfig};
use crate::db::{Database, DbPool};
use crate::record::Record;
use crate::schema::ensure_schema;
use crate::state::AppState;
use std::collections::HashMap;

/// Seeded user with the `engineer` role.
pub const ENGINEER_ID: i64 = 1;
/// Seeded customer with a company name.
pub const ACME_ID: i64 = 1;
/// Seeded private customer.
pub const PRIVATE_ID: i64 = 2;
/// Seeded active EICR type.
pub const EICR_ID: i64 = 1;
/// Seeded inactive type.
pub const MINOR_WORKS_ID: i64 = 2;

const FIXTURES: &[&str] = &[
    "INSERT INTO roles (id, name, description) VALUES (1, 'engineer', 'Field engineer'), (2, 'admin', 'Office administrator')",
    "INSERT INTO permissions (id, name) VALUES (1, 'certificates.create'), (2, 'certificates.view'), (3, 'users.manage')",
    "INSERT INTO role_permissions (role_id, permission_id) VALUES (1, 1), (1, 2), (2, 1), (2, 2), (2, 3)",
    "INSERT INTO users (id, username, password, email, first_name, last_name, role_id) \
     VALUES (1, 'jsparks', '$argon2id$v=19$fixture', 'jamie@certiflow.test', 'Jamie', 'Sparks', 1)",
    "INSERT INTO customers (id, company_name, first_name, last_name, email, address_line1, city, postal_code) \
     VALUES (1, 'Acme Lettings', 'Alice', 'Jones', 'alice@acme.test', '1 High Street', 'Leeds', 'LS1 1AA'), \
            (2, NULL, 'Bob', 'Brown', 'bob@example.test', '2 Low Road', 'York', 'YO1 2BB')",
    "INSERT INTO certificate_types (id, name, description, template_path, bs7671_compliant, active) \
     VALUES (1, 'EICR', 'Electrical Installation Condition Report', 'templates/eicr', 1, 1), \
            (2, 'Minor Works', 'Minor Electrical Installation Works Certificate', 'templates/minor-works', 1, 0), \
            (3, 'EIC', 'Electrical Installation Certificate', 'templates/eic', 1, 1)",
];

/// Fresh private in-memory database. Connects on first use.
pub fn memory_db() -> Database {
    Database::new(ConnectionConfig::sqlite_memory(), LoggingConfig::default())
}

/// In-memory database with every table created.
pub async fn schema_db() -> Database {
    let mut db = memory_db();
    ensure_schema(&mut db).await.unwrap();
    db
}

/// In-memory database with the schema and the fixture rows.
pub async fn seeded_db() -> Database {
    let mut db = schema_db().await;
    seed(&mut db).await;
    db
}

/// Single-connection pool so every gateway sees the same in-memory database.
pub async fn memory_pool() -> DbPool {
    DbPool::connect(&ConnectionConfig::sqlite_memory()).await.unwrap()
}

/// Pool over a seeded in-memory database.
pub async fn seeded_pool() -> DbPool {
    let pool = memory_pool().await;
    let mut db = Database::from_pool(pool.clone(), LoggingConfig::default());
    ensure_schema(&mut db).await.unwrap();
    seed(&mut db).await;
    pool
}

async fn seed(db: &mut Database) {
    for sql in FIXTURES {
        db.execute(sql, ()).await.unwrap();
    }
}

/// A valid certificate payload for the fixture customer, engineer and type.
pub fn certificate_input() -> Record {
    Record::new()
        .with("certificate_type_id", EICR_ID)
        .with("customer_id", ACME_ID)
        .with("installation_address_line1", "1 High Street")
        .with("installation_city", "Leeds")
        .with("installation_postal_code", "LS1 1AA")
        .with("engineer_id", ENGINEER_ID)
        .with("issue_date", "2026-03-01")
        .with("expiry_date", "2031-03-01")
        .with("certificate_data", r#"{"circuits":[]}"#)
}

pub fn test_config() -> AppConfig {
    let mut connections = HashMap::new();
    connections.insert("testing".to_string(), ConnectionConfig::sqlite_memory());
    AppConfig {
        app: AppSettings::default(),
        database: DatabaseConfig {
            default: "testing".into(),
            connections,
            logging: LoggingConfig::default(),
        },
        server: ServerConfig::default(),
    }
}

/// Application state over a seeded pool with the full route table.
pub async fn test_state() -> AppState {
    state_with(test_config()).await
}

pub async fn state_with(config: AppConfig) -> AppState {
    let router = crate::routes::app_routes().unwrap();
    AppState::new(seeded_pool().await, config, router, crate::controllers::registry())
}
