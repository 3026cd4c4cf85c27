//! Typed errors and HTTP mapping.

use crate::model::ValidationErrors;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message shown for server-side failures outside development mode.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again later.";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown connection: {0}")]
    MissingConnection(String),
    #[error("unsupported database driver: {0}")]
    UnsupportedDriver(String),
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
    #[error("config load: {0}")]
    Load(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("database connection failed: {message}")]
    Connection { message: String },
    #[error("query execution failed: {source}")]
    Query {
        sql: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("transaction: {0}")]
    Transaction(String),
}

impl DbError {
    /// SQL text of the failing statement, when there was one.
    pub fn sql(&self) -> Option<&str> {
        match self {
            DbError::Query { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("invalid route pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("no route matched for {0}")]
    RouteNotFound(String),
    #[error("controller and action not specified")]
    ControllerNotSpecified,
    #[error("controller {0} not found")]
    ControllerNotFound(String),
    #[error("method {action} not found in controller {controller}")]
    ActionNotFound { controller: String, action: String },
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("validation failed")]
    Invalid(ValidationErrors),
    #[error("nothing to write to {0}: no fillable fields in input")]
    EmptyPayload(&'static str),
    #[error("{0} out of range")]
    OutOfRange(&'static str),
    #[error(transparent)]
    Db(#[from] DbError),
}

impl ModelError {
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            ModelError::Invalid(errors) => Some(errors),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("validation failed")]
    Invalid(ValidationErrors),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<ModelError> for AppError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Invalid(errors) => AppError::Invalid(errors),
            ModelError::EmptyPayload(_) | ModelError::OutOfRange(_) => {
                AppError::BadRequest(e.to_string())
            }
            ModelError::Db(db) => AppError::Db(db),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::Route(RouteError::InvalidPattern { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "route_error")
            }
            AppError::Route(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Invalid(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        }
    }

    /// Render the error envelope. Server-side failures only carry their real message when
    /// `show_details` is set (development mode).
    pub fn into_response_with(self, show_details: bool) -> Response {
        let (status, code) = self.status();
        let message = if status.is_server_error() && !show_details {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        };
        let details = match &self {
            AppError::Invalid(errors) => serde_json::to_value(errors).ok(),
            AppError::Db(e) if show_details => e.sql().map(|sql| serde_json::json!({ "sql": sql })),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.into_response_with(false)
    }
}
