//! Table definitions and idempotent DDL for MySQL and SQLite. Tables are created in dependency
//! order so foreign keys always point at existing tables.

use crate::config::Driver;
use crate::db::Database;
use crate::error::DbError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    /// Auto-increment integer primary key.
    Id,
    Int,
    Bool,
    Varchar(u16),
    Text,
    Date,
    DateTime,
    Json,
}

#[derive(Clone, Copy, Debug)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub unique: bool,
    pub default: Option<&'static str>,
    /// Referenced table; the referenced column is always `id`.
    pub references: Option<&'static str>,
}

const fn col(name: &'static str, kind: ColumnKind) -> ColumnDef {
    ColumnDef {
        name,
        kind,
        nullable: false,
        unique: false,
        default: None,
        references: None,
    }
}

impl ColumnDef {
    const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    const fn default(mut self, value: &'static str) -> Self {
        self.default = Some(value);
        self
    }

    const fn references(mut self, table: &'static str) -> Self {
        self.references = Some(table);
        self
    }

    fn sql_type(&self, driver: Driver) -> String {
        use ColumnKind::*;
        match (driver, self.kind) {
            (Driver::Mysql, Id) => "INT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY".into(),
            (Driver::Sqlite, Id) => "INTEGER PRIMARY KEY AUTOINCREMENT".into(),
            (Driver::Mysql, Int) => "INT UNSIGNED".into(),
            (Driver::Sqlite, Int) => "INTEGER".into(),
            (Driver::Mysql, Bool) => "TINYINT(1)".into(),
            (Driver::Sqlite, Bool) => "INTEGER".into(),
            (Driver::Mysql, Varchar(n)) => format!("VARCHAR({})", n),
            (Driver::Sqlite, Varchar(_)) => "TEXT".into(),
            (_, Text) => "TEXT".into(),
            (Driver::Mysql, Date) => "DATE".into(),
            (Driver::Mysql, DateTime) => "DATETIME".into(),
            (Driver::Mysql, Json) => "JSON".into(),
            (Driver::Sqlite, Date | DateTime | Json) => "TEXT".into(),
        }
    }

    fn ddl(&self, driver: Driver) -> String {
        let mut out = format!("{} {}", self.name, self.sql_type(driver));
        if self.kind == ColumnKind::Id {
            return out;
        }
        if !self.nullable {
            out.push_str(" NOT NULL");
        }
        if self.unique {
            out.push_str(" UNIQUE");
        }
        if let Some(default) = self.default {
            out.push_str(&format!(" DEFAULT {}", default));
        }
        out
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
}

impl TableDef {
    pub fn create_sql(&self, driver: Driver) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(|c| c.ddl(driver)).collect();
        for c in self.columns {
            if let Some(table) = c.references {
                parts.push(format!("FOREIGN KEY ({}) REFERENCES {}(id)", c.name, table));
            }
        }
        let suffix = match driver {
            Driver::Mysql => " ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci",
            Driver::Sqlite => "",
        };
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n){}",
            self.name,
            parts.join(",\n    "),
            suffix
        )
    }
}

use ColumnKind::*;

const CREATED_AT: ColumnDef = col("created_at", DateTime).default("CURRENT_TIMESTAMP");
const UPDATED_AT: ColumnDef = col("updated_at", DateTime).nullable();

pub const TABLES: &[TableDef] = &[
    TableDef {
        name: "roles",
        columns: &[
            col("id", Id),
            col("name", Varchar(50)).unique(),
            col("description", Text).nullable(),
            CREATED_AT,
        ],
    },
    TableDef {
        name: "permissions",
        columns: &[
            col("id", Id),
            col("name", Varchar(100)).unique(),
            col("description", Text).nullable(),
            CREATED_AT,
        ],
    },
    TableDef {
        name: "role_permissions",
        columns: &[
            col("id", Id),
            col("role_id", Int).references("roles"),
            col("permission_id", Int).references("permissions"),
        ],
    },
    TableDef {
        name: "users",
        columns: &[
            col("id", Id),
            col("username", Varchar(50)).unique(),
            col("password", Varchar(255)),
            col("email", Varchar(255)).unique(),
            col("first_name", Varchar(100)),
            col("last_name", Varchar(100)),
            col("role_id", Int).nullable().references("roles"),
            col("active", Bool).default("1"),
            col("last_login", DateTime).nullable(),
            CREATED_AT,
            UPDATED_AT,
        ],
    },
    TableDef {
        name: "customers",
        columns: &[
            col("id", Id),
            col("company_name", Varchar(255)).nullable(),
            col("first_name", Varchar(100)),
            col("last_name", Varchar(100)),
            col("email", Varchar(255)),
            col("phone", Varchar(50)).nullable(),
            col("address_line1", Varchar(255)),
            col("address_line2", Varchar(255)).nullable(),
            col("city", Varchar(100)),
            col("postal_code", Varchar(20)),
            col("county", Varchar(100)).nullable(),
            col("country", Varchar(100)).default("'United Kingdom'"),
            col("created_by", Int).nullable().references("users"),
            col("active", Bool).default("1"),
            col("consent_marketing", Bool).default("0"),
            col("consent_data_processing", Bool).default("0"),
            col("consent_date", DateTime).nullable(),
            col("portal_access", Bool).default("0"),
            CREATED_AT,
            UPDATED_AT,
        ],
    },
    TableDef {
        name: "customer_access",
        columns: &[
            col("id", Id),
            col("customer_id", Int).references("customers"),
            col("email", Varchar(255)).unique(),
            col("password", Varchar(255)),
            col("last_login", DateTime).nullable(),
            col("active", Bool).default("1"),
            CREATED_AT,
        ],
    },
    TableDef {
        name: "certificate_types",
        columns: &[
            col("id", Id),
            col("name", Varchar(100)).unique(),
            col("description", Text).nullable(),
            col("template_path", Varchar(255)),
            col("bs7671_compliant", Bool).default("1"),
            col("active", Bool).default("1"),
            CREATED_AT,
        ],
    },
    TableDef {
        name: "certificates",
        columns: &[
            col("id", Id),
            col("reference_number", Varchar(50)).unique(),
            col("certificate_type_id", Int).references("certificate_types"),
            col("customer_id", Int).references("customers"),
            col("installation_address_line1", Varchar(255)),
            col("installation_address_line2", Varchar(255)).nullable(),
            col("installation_city", Varchar(100)),
            col("installation_postal_code", Varchar(20)),
            col("installation_county", Varchar(100)).nullable(),
            col("created_by", Int).nullable().references("users"),
            col("engineer_id", Int).references("users"),
            col("issue_date", Date),
            col("expiry_date", Date).nullable(),
            col("status", Varchar(20)).default("'draft'"),
            col("certificate_data", Json),
            col("pdf_path", Varchar(255)).nullable(),
            CREATED_AT,
            UPDATED_AT,
        ],
    },
    TableDef {
        name: "observations",
        columns: &[
            col("id", Id),
            col("certificate_id", Int).references("certificates"),
            col("code", Varchar(20)),
            col("description", Text),
            col("recommendation", Text),
            col("priority", Varchar(2)),
            col("location", Varchar(255)).nullable(),
            CREATED_AT,
        ],
    },
    TableDef {
        name: "settings",
        columns: &[
            col("id", Id),
            col("setting_key", Varchar(100)).unique(),
            col("setting_value", Text).nullable(),
            CREATED_AT,
        ],
    },
];

/// Create every table that does not exist yet.
pub async fn ensure_schema(db: &mut Database) -> Result<(), DbError> {
    let driver = db.driver();
    for table in TABLES {
        db.execute(&table.create_sql(driver), ()).await?;
        tracing::debug!(table = table.name, "table ensured");
    }
    tracing::info!(tables = TABLES.len(), driver = driver.as_str(), "schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn renders_dialects() {
        let certificates = TABLES.iter().find(|t| t.name == "certificates").unwrap();
        let mysql = certificates.create_sql(Driver::Mysql);
        assert!(mysql.contains("id INT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY"));
        assert!(mysql.contains("certificate_data JSON NOT NULL"));
        assert!(mysql.contains("status VARCHAR(20) NOT NULL DEFAULT 'draft'"));
        assert!(mysql.contains("FOREIGN KEY (customer_id) REFERENCES customers(id)"));
        assert!(mysql.ends_with("COLLATE=utf8mb4_unicode_ci"));

        let sqlite = certificates.create_sql(Driver::Sqlite);
        assert!(sqlite.starts_with("CREATE TABLE IF NOT EXISTS certificates ("));
        assert!(sqlite.contains("id INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sqlite.contains("expiry_date TEXT,"));
        assert!(!sqlite.contains("ENGINE"));
    }

    #[test]
    fn references_point_at_earlier_tables() {
        for (i, table) in TABLES.iter().enumerate() {
            for c in table.columns {
                if let Some(target) = c.references {
                    assert!(
                        TABLES[..i].iter().any(|t| t.name == target),
                        "{}.{} references {}",
                        table.name,
                        c.name,
                        target
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let mut db = testing::memory_db();
        ensure_schema(&mut db).await.unwrap();
        ensure_schema(&mut db).await.unwrap();
        let rows = db
            .execute("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'", ())
            .await
            .unwrap()
            .fetch_all();
        assert_eq!(rows.len(), TABLES.len());
    }
}
