use crate::db::Database;
use crate::error::DbError;
use crate::model::{Entity, RuleSet, ALL_COLUMNS};
use crate::record::Record;
use std::sync::OnceLock;

/// Kinds of certificate (EICR, EIC, Minor Works) and their templates.
pub struct CertificateType;

impl Entity for CertificateType {
    const TABLE: &'static str = "certificate_types";
    const FILLABLE: &'static [&'static str] =
        &["name", "description", "template_path", "bs7671_compliant", "active"];

    fn rules() -> &'static RuleSet {
        static RULES: OnceLock<RuleSet> = OnceLock::new();
        RULES.get_or_init(|| {
            RuleSet::new()
                .field("name", "required|length:1,100|unique")
                .field("template_path", "required|length:1,255")
        })
    }
}

impl CertificateType {
    pub async fn all_active(db: &mut Database) -> Result<Vec<Record>, DbError> {
        db.query()
            .select("*")
            .from(Self::TABLE)
            .and_where("active = ?", [1])
            .order_by("name ASC")
            .fetch()
            .await
    }

    pub async fn find_by_name(db: &mut Database, name: &str) -> Result<Option<Record>, DbError> {
        db.query()
            .select("*")
            .from(Self::TABLE)
            .and_where("name = ?", [name])
            .limit(1, 0)
            .fetch_one()
            .await
    }

    /// Flip the `active` flag. `false` when the type does not exist.
    pub async fn toggle_active(db: &mut Database, id: i64) -> Result<bool, DbError> {
        let Some(row) = Self::find(db, id, ALL_COLUMNS).await? else {
            return Ok(false);
        };
        let active = if row.get_bool("active") { 0 } else { 1 };
        let changed = db
            .query()
            .update(Self::TABLE)
            .set(&Record::new().with("active", active))
            .and_where("id = ?", [id])
            .execute()
            .await?;
        Ok(changed > 0)
    }
}
