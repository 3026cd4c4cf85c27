use super::{not_found, unknown_action};
use crate::controller::{id_arg, Controller, RequestContext};
use crate::error::AppError;
use crate::model::{Entity, ALL_COLUMNS};
use crate::models::User;
use crate::response::{success_many, success_one};
use async_trait::async_trait;
use axum::response::Response;

pub struct UserController;

#[async_trait]
impl Controller for UserController {
    fn name(&self) -> &'static str {
        "User"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["show", "permissions"]
    }

    async fn invoke(&self, action: &str, args: Vec<String>, ctx: RequestContext) -> Result<Response, AppError> {
        let id = id_arg(&args, 0)?;
        let mut db = ctx.database();
        let user = User::find(&mut db, id, ALL_COLUMNS)
            .await?
            .ok_or_else(|| not_found("user", id))?;
        match action {
            "show" => {
                let role = User::role(&mut db, id).await?;
                let mut user = User::present(user);
                user.insert("role", role.map(|r| r.into_value()).unwrap_or_default());
                Ok(success_one(user))
            }
            "permissions" => Ok(success_many(User::permissions(&mut db, id).await?)),
            _ => Err(unknown_action(self.name(), action)),
        }
    }
}
