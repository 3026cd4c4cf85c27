use super::{not_found, unknown_action};
use crate::controller::{id_arg, Controller, RequestContext};
use crate::error::AppError;
use crate::model::{Entity, ALL_COLUMNS};
use crate::models::CertificateType;
use crate::response::{success_many, success_one};
use async_trait::async_trait;
use axum::response::Response;

pub struct CertificateTypeController;

#[async_trait]
impl Controller for CertificateTypeController {
    fn name(&self) -> &'static str {
        "CertificateType"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["index", "show", "toggle"]
    }

    async fn invoke(&self, action: &str, args: Vec<String>, ctx: RequestContext) -> Result<Response, AppError> {
        let mut db = ctx.database();
        match action {
            // `?all=1` includes inactive types.
            "index" => {
                let rows = if ctx.input.get_bool("all") {
                    CertificateType::all(&mut db, ALL_COLUMNS).await?
                } else {
                    CertificateType::all_active(&mut db).await?
                };
                Ok(success_many(rows))
            }
            "show" | "toggle" => {
                let id = id_arg(&args, 0)?;
                if action == "toggle" && !CertificateType::toggle_active(&mut db, id).await? {
                    return Err(not_found("certificate type", id));
                }
                let row = CertificateType::find(&mut db, id, ALL_COLUMNS)
                    .await?
                    .ok_or_else(|| not_found("certificate type", id))?;
                Ok(success_one(row))
            }
            _ => Err(unknown_action(self.name(), action)),
        }
    }
}
