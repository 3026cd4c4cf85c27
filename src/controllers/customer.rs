use super::{not_found, unknown_action};
use crate::controller::{id_arg, Controller, RequestContext};
use crate::db::Database;
use crate::error::AppError;
use crate::model::{Entity, ALL_COLUMNS};
use crate::models::Customer;
use crate::record::Record;
use crate::response::{created, outcome, success_many, success_one};
use async_trait::async_trait;
use axum::response::Response;

pub struct CustomerController;

#[async_trait]
impl Controller for CustomerController {
    fn name(&self) -> &'static str {
        "Customer"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["index", "show", "store", "update", "destroy", "certificates"]
    }

    async fn invoke(&self, action: &str, args: Vec<String>, ctx: RequestContext) -> Result<Response, AppError> {
        let mut db = ctx.database();
        match action {
            "index" => index(&mut db, &ctx.input).await,
            "show" => Ok(success_one(load(&mut db, id_arg(&args, 0)?).await?)),
            "store" => store(&mut db, ctx.input).await,
            "update" => update(&mut db, id_arg(&args, 0)?, ctx.input).await,
            "destroy" => destroy(&mut db, id_arg(&args, 0)?).await,
            "certificates" => {
                let id = id_arg(&args, 0)?;
                load(&mut db, id).await?;
                Ok(success_many(Customer::certificates(&mut db, id).await?))
            }
            _ => Err(unknown_action(self.name(), action)),
        }
    }
}

async fn load(db: &mut Database, id: i64) -> Result<Record, AppError> {
    Customer::find(db, id, ALL_COLUMNS)
        .await?
        .ok_or_else(|| not_found("customer", id))
}

/// All customers, or those whose company name contains `company`.
async fn index(db: &mut Database, input: &Record) -> Result<Response, AppError> {
    let rows = match input.get_str("company").filter(|c| !c.is_empty()) {
        Some(fragment) => Customer::find_by_company_name(db, fragment).await?,
        None => Customer::all(db, ALL_COLUMNS).await?,
    };
    Ok(success_many(rows))
}

async fn store(db: &mut Database, input: Record) -> Result<Response, AppError> {
    let id = Customer::create(db, input).await?;
    let row = match id.parse::<i64>() {
        Ok(n) => load(db, n).await?,
        Err(_) => Record::new(),
    };
    Ok(created(&id, row))
}

async fn update(db: &mut Database, id: i64, input: Record) -> Result<Response, AppError> {
    load(db, id).await?;
    Customer::update(db, id, input).await?;
    Ok(success_one(load(db, id).await?))
}

async fn destroy(db: &mut Database, id: i64) -> Result<Response, AppError> {
    if !Customer::delete(db, id).await? {
        return Err(not_found("customer", id));
    }
    Ok(outcome("deleted", true))
}
