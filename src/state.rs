//! Shared application state for all requests. Everything here is read-only after startup.

use crate::config::AppConfig;
use crate::controller::ControllerRegistry;
use crate::db::{Database, DbPool};
use crate::router::Router;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<AppConfig>,
    pub router: Arc<Router>,
    pub controllers: Arc<ControllerRegistry>,
}

impl AppState {
    pub fn new(pool: DbPool, config: AppConfig, router: Router, controllers: ControllerRegistry) -> Self {
        AppState {
            pool,
            config: Arc::new(config),
            router: Arc::new(router),
            controllers: Arc::new(controllers),
        }
    }

    /// A gateway for one request; it checks a connection out of the pool on first use.
    pub fn database(&self) -> Database {
        Database::from_pool(self.pool.clone(), self.config.database.logging.clone())
    }

    /// Whether error responses may carry internal details.
    pub fn show_details(&self) -> bool {
        self.config.app.is_development()
    }
}
