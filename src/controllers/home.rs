use super::unknown_action;
use crate::controller::{Controller, RequestContext};
use crate::error::AppError;
use crate::response::success_one;
use async_trait::async_trait;
use axum::response::Response;
use serde::Serialize;

pub struct HomeController;

#[derive(Serialize)]
struct Page<'a> {
    title: &'a str,
    app: &'a str,
    version: &'a str,
}

fn title(action: &str) -> Option<&'static str> {
    match action {
        "index" => Some("CertiFlow - Electrical Testing Certificate Management"),
        "about" => Some("About CertiFlow"),
        "contact" => Some("Contact Us"),
        _ => None,
    }
}

#[async_trait]
impl Controller for HomeController {
    fn name(&self) -> &'static str {
        "Home"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["index", "about", "contact"]
    }

    async fn invoke(&self, action: &str, _args: Vec<String>, ctx: RequestContext) -> Result<Response, AppError> {
        let title = title(action).ok_or_else(|| unknown_action(self.name(), action))?;
        let app = &ctx.state.config.app;
        Ok(success_one(Page {
            title,
            app: &app.name,
            version: &app.version,
        }))
    }
}
