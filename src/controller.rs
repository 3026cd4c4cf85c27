//! Controllers: named sets of actions the router dispatches to, looked up in a registry.

use crate::db::Database;
use crate::error::AppError;
use crate::record::Record;
use crate::state::AppState;
use async_trait::async_trait;
use axum::http::Method;
use axum::response::Response;
use std::collections::HashMap;
use std::sync::Arc;

/// What an action gets to see of the request.
pub struct RequestContext {
    pub state: AppState,
    pub method: Method,
    pub path: String,
    /// Query string, then form or JSON body; later sources win.
    pub input: Record,
}

impl RequestContext {
    pub fn new(state: AppState, method: Method, path: impl Into<String>, input: Record) -> Self {
        RequestContext {
            state,
            method,
            path: path.into(),
            input,
        }
    }

    pub fn database(&self) -> Database {
        self.state.database()
    }
}

#[async_trait]
pub trait Controller: Send + Sync {
    /// Registry key; routes name controllers by this (e.g. `Certificate`).
    fn name(&self) -> &'static str;

    fn actions(&self) -> &'static [&'static str];

    /// Run `action` with the route's remaining parameters, in pattern order.
    async fn invoke(&self, action: &str, args: Vec<String>, ctx: RequestContext) -> Result<Response, AppError>;
}

#[derive(Clone, Default)]
pub struct ControllerRegistry {
    controllers: HashMap<&'static str, Arc<dyn Controller>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, controller: impl Controller + 'static) -> &mut Self {
        self.controllers.insert(controller.name(), Arc::new(controller));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Controller>> {
        self.controllers.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.controllers.keys().copied()
    }
}

/// Positional argument `index` parsed as a numeric id.
pub fn id_arg(args: &[String], index: usize) -> Result<i64, AppError> {
    let raw = args
        .get(index)
        .ok_or_else(|| AppError::BadRequest(format!("missing route argument {}", index)))?;
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("invalid id '{}'", raw)))
}

/// Positional argument `index` as text.
pub fn text_arg(args: &[String], index: usize) -> Result<&str, AppError> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| AppError::BadRequest(format!("missing route argument {}", index)))
}

/// Optional integer input field; present but non-numeric is a bad request.
pub fn int_input(input: &Record, key: &str) -> Result<Option<i64>, AppError> {
    if !input.has(key) {
        return Ok(None);
    }
    input
        .get_i64(key)
        .map(Some)
        .ok_or_else(|| AppError::BadRequest(format!("{} must be an integer", key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_integer_inputs() {
        let input = Record::new().with("days", "14").with("limit", "ten").with("x", serde_json::Value::Null);
        assert_eq!(int_input(&input, "days").unwrap(), Some(14));
        assert!(matches!(int_input(&input, "limit"), Err(AppError::BadRequest(_))));
        assert_eq!(int_input(&input, "x").unwrap(), None);
        assert_eq!(int_input(&input, "missing").unwrap(), None);
    }

    #[test]
    fn parses_arguments() {
        let args = vec!["42".to_string(), "C1".to_string()];
        assert_eq!(id_arg(&args, 0).unwrap(), 42);
        assert!(matches!(id_arg(&args, 1), Err(AppError::BadRequest(_))));
        assert!(matches!(id_arg(&args, 2), Err(AppError::BadRequest(_))));
        assert_eq!(text_arg(&args, 1).unwrap(), "C1");
    }
}
