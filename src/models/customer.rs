use crate::db::Database;
use crate::error::DbError;
use crate::model::{Entity, RuleSet};
use crate::record::Record;
use std::sync::OnceLock;

pub struct Customer;

impl Entity for Customer {
    const TABLE: &'static str = "customers";
    const FILLABLE: &'static [&'static str] = &[
        "company_name",
        "first_name",
        "last_name",
        "email",
        "phone",
        "address_line1",
        "address_line2",
        "city",
        "postal_code",
        "county",
        "country",
        "created_by",
        "active",
        "consent_marketing",
        "consent_data_processing",
        "consent_date",
        "portal_access",
    ];

    fn rules() -> &'static RuleSet {
        static RULES: OnceLock<RuleSet> = OnceLock::new();
        RULES.get_or_init(|| {
            RuleSet::new()
                .field("first_name", "required|length:1,100")
                .field("last_name", "required|length:1,100")
                .field("email", "required|email")
                .field("address_line1", "required|length:1,255")
                .field("city", "required|length:1,100")
                .field("postal_code", "required|length:1,20")
        })
    }
}

impl Customer {
    pub async fn find_by_email(db: &mut Database, email: &str) -> Result<Option<Record>, DbError> {
        db.query()
            .select("*")
            .from(Self::TABLE)
            .and_where("email = ?", [email])
            .limit(1, 0)
            .fetch_one()
            .await
    }

    /// Customers whose company name contains `fragment`.
    pub async fn find_by_company_name(db: &mut Database, fragment: &str) -> Result<Vec<Record>, DbError> {
        db.query()
            .select("*")
            .from(Self::TABLE)
            .and_where("company_name LIKE ?", [format!("%{}%", fragment)])
            .order_by("company_name ASC")
            .fetch()
            .await
    }

    pub async fn certificates(db: &mut Database, customer_id: i64) -> Result<Vec<Record>, DbError> {
        db.query()
            .select("c.*, ct.name AS certificate_type")
            .from_as("certificates", "c")
            .join("certificate_types ct", "c.certificate_type_id = ct.id")
            .and_where("c.customer_id = ?", [customer_id])
            .order_by("c.issue_date DESC")
            .fetch()
            .await
    }

    /// The customer's portal login row, if one exists.
    pub async fn portal_access(db: &mut Database, customer_id: i64) -> Result<Option<Record>, DbError> {
        db.query()
            .select("*")
            .from("customer_access")
            .and_where("customer_id = ?", [customer_id])
            .limit(1, 0)
            .fetch_one()
            .await
    }

    pub async fn set_portal_access(db: &mut Database, customer_id: i64, enabled: bool) -> Result<bool, DbError> {
        let changed = db
            .query()
            .update(Self::TABLE)
            .set(&Record::new().with("portal_access", i64::from(enabled)))
            .and_where("id = ?", [customer_id])
            .execute()
            .await?;
        Ok(changed > 0)
    }
}
