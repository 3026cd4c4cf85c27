//! CertiFlow: electrical safety certificate management backend. Routing, query building,
//! base model and database gateway, with the domain models and JSON controllers on top.

pub mod app;
pub mod config;
pub mod controller;
pub mod controllers;
pub mod db;
pub mod error;
pub mod model;
pub mod models;
pub mod record;
pub mod response;
pub mod router;
pub mod routes;
pub mod schema;
pub mod sql;
pub mod state;

#[cfg(test)]
mod testing;

pub use app::build_app;
pub use config::AppConfig;
pub use controller::{Controller, ControllerRegistry, RequestContext};
pub use db::{Database, DbPool, Statement};
pub use error::{AppError, ConfigError, DbError, ModelError, RouteError};
pub use model::{Entity, RuleSet, ValidationErrors, Validator};
pub use record::Record;
pub use router::Router;
pub use routes::app_routes;
pub use schema::ensure_schema;
pub use sql::QueryBuilder;
pub use state::AppState;
