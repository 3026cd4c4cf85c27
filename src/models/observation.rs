use super::{one_of, Priority};
use crate::db::Database;
use crate::error::{DbError, ModelError};
use crate::model::{Entity, RuleSet};
use crate::record::Record;
use std::sync::OnceLock;

/// A defect or remark recorded against a certificate.
pub struct Observation;

impl Entity for Observation {
    const TABLE: &'static str = "observations";
    const FILLABLE: &'static [&'static str] = &[
        "certificate_id",
        "code",
        "description",
        "recommendation",
        "priority",
        "location",
    ];

    fn rules() -> &'static RuleSet {
        static RULES: OnceLock<RuleSet> = OnceLock::new();
        RULES.get_or_init(|| {
            let priority = format!("required|{}", one_of(Priority::ALL.iter().map(|p| p.as_str())));
            RuleSet::new()
                .field("certificate_id", "required|numeric")
                .field("code", "required|length:1,20")
                .field("description", "required")
                .field("recommendation", "required")
                .field("priority", &priority)
        })
    }
}

impl Observation {
    /// Most urgent first, then in recording order.
    pub async fn find_by_certificate(db: &mut Database, certificate_id: i64) -> Result<Vec<Record>, DbError> {
        db.query()
            .select("*")
            .from(Self::TABLE)
            .and_where("certificate_id = ?", [certificate_id])
            .order_by("priority ASC, id ASC")
            .fetch()
            .await
    }

    pub async fn find_by_priority(db: &mut Database, priority: Priority) -> Result<Vec<Record>, DbError> {
        db.query()
            .select("o.*, c.reference_number")
            .from_as(Self::TABLE, "o")
            .join("certificates c", "o.certificate_id = c.id")
            .and_where("o.priority = ?", [priority.as_str()])
            .order_by("o.created_at DESC, o.id DESC")
            .fetch()
            .await
    }

    /// C1 observations across all certificates.
    pub async fn dangerous_conditions(db: &mut Database) -> Result<Vec<Record>, DbError> {
        Self::find_by_priority(db, Priority::C1).await
    }

    /// Insert every item or none. Validation errors are keyed `{index}.{field}`.
    pub async fn create_many(db: &mut Database, items: Vec<Record>) -> Result<Vec<String>, ModelError> {
        db.begin_transaction().await?;
        let mut ids = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            match Self::create(db, item).await {
                Ok(id) => ids.push(id),
                Err(e) => {
                    if let Err(rollback) = db.rollback().await {
                        tracing::error!(error = %rollback, "rollback after failed batch insert failed");
                    }
                    return Err(match e {
                        ModelError::Invalid(errors) => ModelError::Invalid(errors.prefixed(index)),
                        other => other,
                    });
                }
            }
        }
        db.commit().await?;
        tracing::debug!(count = ids.len(), "observations created");
        Ok(ids)
    }
}
