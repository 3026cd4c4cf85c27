//! Base model: generic persistence (all/find/find_by/create/update/delete) over one table, with
//! a fillable allowlist and declarative validation.

pub mod validation;

pub use validation::{Check, CheckContext, Mode, Rule, RuleSet, Target, ValidationErrors, Validator};

use crate::db::Database;
use crate::error::{DbError, ModelError};
use crate::record::Record;
use async_trait::async_trait;
use serde_json::Value;

/// Column list selecting every column.
pub const ALL_COLUMNS: &[&str] = &["*"];

const PK_PARAM: &str = "__pk";

/// A table-backed entity. Implementors name the table, the columns callers may write, the
/// columns never returned to clients, and the validation rules.
#[async_trait]
pub trait Entity: Sized + Send + Sync + 'static {
    const TABLE: &'static str;
    const PRIMARY_KEY: &'static str = "id";
    /// Columns settable through `create`/`update`; everything else in the input is dropped.
    const FILLABLE: &'static [&'static str];
    /// Columns stripped by `present`.
    const SENSITIVE: &'static [&'static str] = &[];

    fn rules() -> &'static RuleSet;

    fn validator() -> &'static Validator {
        Validator::builtin()
    }

    async fn all(db: &mut Database, columns: &[&str]) -> Result<Vec<Record>, DbError> {
        let sql = format!("SELECT {} FROM {}", columns.join(", "), Self::TABLE);
        Ok(db.execute(&sql, ()).await?.fetch_all())
    }

    async fn find(db: &mut Database, id: i64, columns: &[&str]) -> Result<Option<Record>, DbError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = :id",
            columns.join(", "),
            Self::TABLE,
            Self::PRIMARY_KEY
        );
        Ok(db
            .execute(&sql, Record::new().with("id", id))
            .await?
            .fetch_one())
    }

    /// Rows where `field` equals `value`. `field` is a column name, never user input.
    async fn find_by(
        db: &mut Database,
        field: &str,
        value: Value,
        columns: &[&str],
    ) -> Result<Vec<Record>, DbError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = :value",
            columns.join(", "),
            Self::TABLE,
            field
        );
        Ok(db
            .execute(&sql, Record::new().with("value", value))
            .await?
            .fetch_all())
    }

    /// Drop every key not in `FILLABLE`.
    fn fill(mut data: Record) -> Record {
        data.retain_keys(Self::FILLABLE);
        data
    }

    /// Strip `SENSITIVE` columns before a row leaves the application.
    fn present(mut row: Record) -> Record {
        for col in Self::SENSITIVE {
            row.remove(col);
        }
        row
    }

    async fn validate(
        db: &mut Database,
        data: &Record,
        mode: Mode,
        record_id: Option<i64>,
    ) -> Result<ValidationErrors, DbError> {
        let id = record_id.map(Value::from);
        let target = Target {
            table: Self::TABLE,
            primary_key: Self::PRIMARY_KEY,
            record_id: id.as_ref(),
        };
        Self::validator()
            .validate(db, target, Self::rules(), data, mode)
            .await
    }

    /// Filter to fillable fields, validate everything, insert. Returns the new primary key.
    async fn create(db: &mut Database, data: Record) -> Result<String, ModelError> {
        let data = Self::fill(data);
        let errors = Self::validate(db, &data, Mode::Full, None).await?;
        if !errors.is_empty() {
            return Err(ModelError::Invalid(errors));
        }
        if data.is_empty() {
            return Err(ModelError::EmptyPayload(Self::TABLE));
        }
        let fields: Vec<&str> = data.keys().map(String::as_str).collect();
        let placeholders: Vec<String> = fields.iter().map(|f| format!(":{}", f)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            Self::TABLE,
            fields.join(", "),
            placeholders.join(", ")
        );
        db.execute(&sql, data.clone()).await?;
        let id = db.last_insert_id().to_string();
        tracing::debug!(table = Self::TABLE, id = %id, "record created");
        Ok(id)
    }

    /// Filter to fillable fields, validate the ones present, update by primary key.
    /// Returns whether a row changed.
    async fn update(db: &mut Database, id: i64, data: Record) -> Result<bool, ModelError> {
        let mut data = Self::fill(data);
        let errors = Self::validate(db, &data, Mode::Partial, Some(id)).await?;
        if !errors.is_empty() {
            return Err(ModelError::Invalid(errors));
        }
        if data.is_empty() {
            return Ok(false);
        }
        let assignments: Vec<String> = data.keys().map(|f| format!("{} = :{}", f, f)).collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = :{}",
            Self::TABLE,
            assignments.join(", "),
            Self::PRIMARY_KEY,
            PK_PARAM
        );
        data.insert(PK_PARAM, id);
        Ok(db.execute(&sql, data).await?.row_count() > 0)
    }

    async fn delete(db: &mut Database, id: i64) -> Result<bool, DbError> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = :id",
            Self::TABLE,
            Self::PRIMARY_KEY
        );
        Ok(db
            .execute(&sql, Record::new().with("id", id))
            .await?
            .row_count()
            > 0)
    }
}
