use super::{not_found, unknown_action};
use crate::controller::{id_arg, int_input, Controller, RequestContext};
use crate::db::Database;
use crate::error::AppError;
use crate::model::{Entity, ALL_COLUMNS};
use crate::models::{Certificate, CertificateStatus, Setting};
use crate::record::Record;
use crate::response::{created, outcome, success_many, success_one};
use async_trait::async_trait;
use axum::response::Response;

const DEFAULT_EXPIRY_WINDOW_DAYS: i64 = 30;

pub struct CertificateController;

#[async_trait]
impl Controller for CertificateController {
    fn name(&self) -> &'static str {
        "Certificate"
    }

    fn actions(&self) -> &'static [&'static str] {
        &[
            "index",
            "show",
            "store",
            "update",
            "destroy",
            "status",
            "expiring",
            "observations",
        ]
    }

    async fn invoke(&self, action: &str, args: Vec<String>, ctx: RequestContext) -> Result<Response, AppError> {
        let mut db = ctx.database();
        match action {
            "index" => index(&mut db, &ctx.input).await,
            "show" => show(&mut db, id_arg(&args, 0)?).await,
            "store" => {
                let fallback = ctx.state.config.app.certificate_prefix.clone();
                store(&mut db, ctx.input, &fallback).await
            }
            "update" => update(&mut db, id_arg(&args, 0)?, ctx.input).await,
            "destroy" => destroy(&mut db, id_arg(&args, 0)?).await,
            "status" => status(&mut db, id_arg(&args, 0)?, &ctx.input).await,
            "expiring" => expiring(&mut db, &ctx.input).await,
            "observations" => observations(&mut db, id_arg(&args, 0)?).await,
            _ => Err(unknown_action(self.name(), action)),
        }
    }
}

async fn load(db: &mut Database, id: i64) -> Result<Record, AppError> {
    Certificate::find(db, id, ALL_COLUMNS)
        .await?
        .ok_or_else(|| not_found("certificate", id))
}

/// All certificates, or one engineer's when `engineer_id` is given.
async fn index(db: &mut Database, input: &Record) -> Result<Response, AppError> {
    let rows = match int_input(input, "engineer_id")? {
        Some(engineer_id) => Certificate::find_by_engineer(db, engineer_id).await?,
        None => Certificate::all(db, ALL_COLUMNS).await?,
    };
    Ok(success_many(rows))
}

async fn show(db: &mut Database, id: i64) -> Result<Response, AppError> {
    Ok(success_one(load(db, id).await?))
}

/// Create a certificate, generating its reference number when none is supplied.
async fn store(db: &mut Database, mut input: Record, fallback_prefix: &str) -> Result<Response, AppError> {
    if !input.has("reference_number") {
        let prefix = Setting::value_by_key(db, "certificate_prefix", fallback_prefix).await?;
        let reference = Certificate::generate_reference_number(db, &prefix).await?;
        input.insert("reference_number", reference);
    }
    let id = Certificate::create(db, input).await?;
    let row = match id.parse::<i64>() {
        Ok(n) => load(db, n).await?,
        Err(_) => Record::new(),
    };
    tracing::info!(id = %id, reference = ?row.get_str("reference_number"), "certificate created");
    Ok(created(&id, row))
}

async fn update(db: &mut Database, id: i64, input: Record) -> Result<Response, AppError> {
    load(db, id).await?;
    Certificate::update(db, id, input).await?;
    Ok(success_one(load(db, id).await?))
}

async fn destroy(db: &mut Database, id: i64) -> Result<Response, AppError> {
    if !Certificate::delete(db, id).await? {
        return Err(not_found("certificate", id));
    }
    Ok(outcome("deleted", true))
}

async fn status(db: &mut Database, id: i64, input: &Record) -> Result<Response, AppError> {
    let raw = input
        .get_str("status")
        .ok_or_else(|| AppError::BadRequest("status is required".into()))?;
    let status = raw
        .parse::<CertificateStatus>()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    load(db, id).await?;
    Certificate::update_status(db, id, status).await?;
    Ok(success_one(load(db, id).await?))
}

async fn expiring(db: &mut Database, input: &Record) -> Result<Response, AppError> {
    let days = int_input(input, "days")?.unwrap_or(DEFAULT_EXPIRY_WINDOW_DAYS);
    if days < 0 {
        return Err(AppError::BadRequest("days must not be negative".into()));
    }
    Ok(success_many(Certificate::expiring(db, days).await?))
}

async fn observations(db: &mut Database, id: i64) -> Result<Response, AppError> {
    load(db, id).await?;
    Ok(success_many(Certificate::observations(db, id).await?))
}
