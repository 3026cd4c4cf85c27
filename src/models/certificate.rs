use super::{one_of, CertificateStatus, Observation};
use crate::db::Database;
use crate::error::{DbError, ModelError};
use crate::model::{Entity, RuleSet};
use crate::record::Record;
use chrono::{Duration, Local, NaiveDate};
use rand::seq::SliceRandom;
use std::sync::OnceLock;

/// Characters used for the random suffix of reference numbers. No `I`, `O`, `0` or `1`.
pub const REFERENCE_ALPHABET: &str = "ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

const SUFFIX_LEN: usize = 4;

pub struct Certificate;

impl Entity for Certificate {
    const TABLE: &'static str = "certificates";
    const FILLABLE: &'static [&'static str] = &[
        "reference_number",
        "certificate_type_id",
        "customer_id",
        "installation_address_line1",
        "installation_address_line2",
        "installation_city",
        "installation_postal_code",
        "installation_county",
        "created_by",
        "engineer_id",
        "issue_date",
        "expiry_date",
        "status",
        "certificate_data",
        "pdf_path",
    ];

    fn rules() -> &'static RuleSet {
        static RULES: OnceLock<RuleSet> = OnceLock::new();
        RULES.get_or_init(|| {
            RuleSet::new()
                .field("reference_number", "length:1,50|unique")
                .field("certificate_type_id", "required|numeric")
                .field("customer_id", "required|numeric")
                .field("installation_address_line1", "required|length:1,255")
                .field("installation_city", "required|length:1,100")
                .field("installation_postal_code", "required|length:1,20")
                .field("engineer_id", "required|numeric")
                .field("issue_date", "required|date")
                .field("expiry_date", "date")
                .field("status", &one_of(CertificateStatus::ALL.iter().map(|s| s.as_str())))
                .field("certificate_data", "required|json")
        })
    }
}

impl Certificate {
    pub async fn find_by_reference_number(
        db: &mut Database,
        reference_number: &str,
    ) -> Result<Option<Record>, DbError> {
        db.query()
            .select("*")
            .from(Self::TABLE)
            .and_where("reference_number = ?", [reference_number])
            .limit(1, 0)
            .fetch_one()
            .await
    }

    /// Certificates assigned to an engineer with their type and customer names, newest first.
    pub async fn find_by_engineer(db: &mut Database, engineer_id: i64) -> Result<Vec<Record>, DbError> {
        db.query()
            .select("c.*, ct.name AS certificate_type, cu.company_name, cu.first_name, cu.last_name")
            .from_as(Self::TABLE, "c")
            .join("certificate_types ct", "c.certificate_type_id = ct.id")
            .join("customers cu", "c.customer_id = cu.id")
            .and_where("c.engineer_id = ?", [engineer_id])
            .order_by("c.issue_date DESC")
            .fetch()
            .await
    }

    /// `{prefix}{YYYYmmddHHMMSS}{suffix}`; the suffix is redrawn until the number is unused.
    pub async fn generate_reference_number(db: &mut Database, prefix: &str) -> Result<String, DbError> {
        let timestamp = Local::now().format("%Y%m%d%H%M%S").to_string();
        loop {
            let candidate = format!("{}{}{}", prefix, timestamp, random_suffix());
            if Self::find_by_reference_number(db, &candidate).await?.is_none() {
                return Ok(candidate);
            }
            tracing::debug!(reference = %candidate, "reference number taken, redrawing");
        }
    }

    pub async fn observations(db: &mut Database, certificate_id: i64) -> Result<Vec<Record>, DbError> {
        Observation::find_by_certificate(db, certificate_id).await
    }

    pub async fn update_status(
        db: &mut Database,
        certificate_id: i64,
        status: CertificateStatus,
    ) -> Result<bool, DbError> {
        let changed = db
            .query()
            .update(Self::TABLE)
            .set(&Record::new().with("status", status.as_str()))
            .and_where("id = ?", [certificate_id])
            .execute()
            .await?;
        Ok(changed > 0)
    }

    /// Issued certificates expiring between today and `days_ahead` days from now.
    pub async fn expiring(db: &mut Database, days_ahead: i64) -> Result<Vec<Record>, ModelError> {
        Self::expiring_from(db, Local::now().date_naive(), days_ahead).await
    }

    pub async fn expiring_from(
        db: &mut Database,
        today: NaiveDate,
        days_ahead: i64,
    ) -> Result<Vec<Record>, ModelError> {
        let until = window_end(today, days_ahead).ok_or(ModelError::OutOfRange("days"))?;
        let rows = db
            .query()
            .select("c.*, ct.name AS certificate_type, cu.company_name, cu.first_name, cu.last_name, cu.email")
            .from_as(Self::TABLE, "c")
            .join("certificate_types ct", "c.certificate_type_id = ct.id")
            .join("customers cu", "c.customer_id = cu.id")
            .and_where(
                "c.expiry_date BETWEEN ? AND ? AND c.status = ?",
                [
                    today.format("%Y-%m-%d").to_string(),
                    until.format("%Y-%m-%d").to_string(),
                    CertificateStatus::Issued.as_str().to_string(),
                ],
            )
            .order_by("c.expiry_date ASC")
            .fetch()
            .await?;
        Ok(rows)
    }
}

/// `today + days_ahead`, or `None` when that falls outside the representable date range.
fn window_end(today: NaiveDate, days_ahead: i64) -> Option<NaiveDate> {
    Duration::try_days(days_ahead).and_then(|d| today.checked_add_signed(d))
}

/// Distinct characters drawn from `REFERENCE_ALPHABET`.
fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    REFERENCE_ALPHABET
        .as_bytes()
        .choose_multiple(&mut rng, SUFFIX_LEN)
        .map(|b| *b as char)
        .collect()
}
