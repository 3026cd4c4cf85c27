use crate::db::Database;
use crate::error::DbError;
use crate::model::{Entity, RuleSet};
use crate::record::Record;
use chrono::Local;
use std::sync::OnceLock;

/// Staff accounts (engineers, administrators).
pub struct User;

impl Entity for User {
    const TABLE: &'static str = "users";
    const FILLABLE: &'static [&'static str] = &[
        "username",
        "password",
        "email",
        "first_name",
        "last_name",
        "role_id",
        "active",
    ];
    const SENSITIVE: &'static [&'static str] = &["password"];

    fn rules() -> &'static RuleSet {
        static RULES: OnceLock<RuleSet> = OnceLock::new();
        RULES.get_or_init(|| {
            RuleSet::new()
                .field("username", "required|length:3,50|unique")
                .field("email", "required|email|unique")
                .field("password", "length:8,255")
                .field("first_name", "required|length:1,100")
                .field("last_name", "required|length:1,100")
        })
    }
}

impl User {
    pub async fn find_by_username(db: &mut Database, username: &str) -> Result<Option<Record>, DbError> {
        db.query()
            .select("*")
            .from(Self::TABLE)
            .and_where("username = ?", [username])
            .limit(1, 0)
            .fetch_one()
            .await
    }

    pub async fn find_by_email(db: &mut Database, email: &str) -> Result<Option<Record>, DbError> {
        db.query()
            .select("*")
            .from(Self::TABLE)
            .and_where("email = ?", [email])
            .limit(1, 0)
            .fetch_one()
            .await
    }

    pub async fn role(db: &mut Database, user_id: i64) -> Result<Option<Record>, DbError> {
        db.query()
            .select("r.*")
            .from_as(Self::TABLE, "u")
            .join("roles r", "u.role_id = r.id")
            .and_where("u.id = ?", [user_id])
            .fetch_one()
            .await
    }

    /// Permissions granted through the user's role.
    pub async fn permissions(db: &mut Database, user_id: i64) -> Result<Vec<Record>, DbError> {
        db.query()
            .select("p.*")
            .from_as(Self::TABLE, "u")
            .join("role_permissions rp", "u.role_id = rp.role_id")
            .join("permissions p", "rp.permission_id = p.id")
            .and_where("u.id = ?", [user_id])
            .order_by("p.name ASC")
            .fetch()
            .await
    }

    pub async fn has_permission(db: &mut Database, user_id: i64, permission: &str) -> Result<bool, DbError> {
        let count = db
            .query()
            .select("COUNT(*) AS count")
            .from_as(Self::TABLE, "u")
            .join("role_permissions rp", "u.role_id = rp.role_id")
            .join("permissions p", "rp.permission_id = p.id")
            .and_where("u.id = ?", [user_id])
            .and_where("p.name = ?", [permission])
            .fetch_one()
            .await?
            .and_then(|row| row.get_i64("count"))
            .unwrap_or(0);
        Ok(count > 0)
    }

    pub async fn update_last_login(db: &mut Database, user_id: i64) -> Result<bool, DbError> {
        let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let changed = db
            .query()
            .update(Self::TABLE)
            .set(&Record::new().with("last_login", now))
            .and_where("id = ?", [user_id])
            .execute()
            .await?;
        Ok(changed > 0)
    }
}
