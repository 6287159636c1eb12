use std::sync::Arc;

use axum::extract::FromRef;

use shared_config::AppConfig;
use shared_database::Database;

/// State shared by the cell routers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<dyn Database>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, db: Arc<dyn Database>) -> Self {
        Self { config, db }
    }
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
