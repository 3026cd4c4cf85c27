use crate::db::Database;
use crate::error::DbError;
use crate::model::{Entity, RuleSet};
use std::sync::OnceLock;

/// Key/value application settings stored in the database.
pub struct Setting;

impl Entity for Setting {
    const TABLE: &'static str = "settings";
    const FILLABLE: &'static [&'static str] = &["setting_key", "setting_value"];

    fn rules() -> &'static RuleSet {
        static RULES: OnceLock<RuleSet> = OnceLock::new();
        RULES.get_or_init(|| {
            RuleSet::new()
                .field("setting_key", "required|length:1,100|unique")
        })
    }
}

impl Setting {
    /// Stored value for `key`, or `default` when the key is missing or null.
    pub async fn value_by_key(db: &mut Database, key: &str, default: &str) -> Result<String, DbError> {
        let value = db
            .query()
            .select("setting_value")
            .from(Self::TABLE)
            .and_where("setting_key = ?", [key])
            .limit(1, 0)
            .fetch_value()
            .await?;
        Ok(match value {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Null) | None => default.to_string(),
            Some(other) => other.to_string(),
        })
    }
}
