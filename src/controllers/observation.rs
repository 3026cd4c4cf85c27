use super::{not_found, unknown_action};
use crate::controller::{id_arg, Controller, RequestContext};
use crate::db::Database;
use crate::error::AppError;
use crate::model::{Entity, ALL_COLUMNS};
use crate::models::{Certificate, Observation, Priority};
use crate::record::Record;
use crate::response::{created, created_many, success_many};
use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

pub struct ObservationController;

#[async_trait]
impl Controller for ObservationController {
    fn name(&self) -> &'static str {
        "Observation"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["index", "store", "dangerous"]
    }

    async fn invoke(&self, action: &str, args: Vec<String>, ctx: RequestContext) -> Result<Response, AppError> {
        let mut db = ctx.database();
        match action {
            "index" => {
                let rows = match ctx.input.get_str("priority") {
                    Some(raw) => {
                        let priority = raw
                            .parse::<Priority>()
                            .map_err(|e| AppError::BadRequest(e.to_string()))?;
                        Observation::find_by_priority(&mut db, priority).await?
                    }
                    None => Observation::all(&mut db, ALL_COLUMNS).await?,
                };
                Ok(success_many(rows))
            }
            "store" => store(&mut db, id_arg(&args, 0)?, ctx.input).await,
            "dangerous" => Ok(success_many(Observation::dangerous_conditions(&mut db).await?)),
            _ => Err(unknown_action(self.name(), action)),
        }
    }
}

/// One observation from the input, or a batch under `observations`. The certificate id
/// always comes from the route.
async fn store(db: &mut Database, certificate_id: i64, mut input: Record) -> Result<Response, AppError> {
    if Certificate::find(db, certificate_id, &["id"]).await?.is_none() {
        return Err(not_found("certificate", certificate_id));
    }

    let Some(batch) = input.remove("observations") else {
        input.insert("certificate_id", certificate_id);
        let id = Observation::create(db, input).await?;
        let row = match id.parse::<i64>() {
            Ok(n) => Observation::find(db, n, ALL_COLUMNS).await?.unwrap_or_default(),
            Err(_) => Record::new(),
        };
        return Ok(created(&id, row));
    };

    let Value::Array(items) = batch else {
        return Err(AppError::BadRequest("observations must be an array".into()));
    };
    let items = items
        .into_iter()
        .map(|item| {
            Record::from_value(item)
                .map(|r| r.with("certificate_id", certificate_id))
                .ok_or_else(|| AppError::BadRequest("each observation must be an object".into()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let ids = Observation::create_many(db, items).await?;
    tracing::info!(certificate_id, count = ids.len(), "observations recorded");
    Ok(created_many(ids))
}
