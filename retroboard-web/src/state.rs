//! Application state shared by every handler

use crate::WebResult;
use retroboard_core::RetroboardConfig;
use retroboard_sessions::{MemorySessionStore, SessionService, SessionStore, SqliteSessionStore};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub config: Arc<RetroboardConfig>,
    /// Session registry
    pub sessions: Arc<SessionService>,
}

impl AppState {
    /// Build the state, opening the store named by `config.storage`
    pub async fn new(config: RetroboardConfig) -> WebResult<Self> {
        let store: Arc<dyn SessionStore> = if config.storage.is_memory() {
            info!("Using in-memory session store");
            Arc::new(MemorySessionStore::new())
        } else {
            info!("Using SQLite session store at {}", config.storage.database_url);
            Arc::new(SqliteSessionStore::connect(&config.storage).await?)
        };

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: RetroboardConfig, store: Arc<dyn SessionStore>) -> Self {
        let sessions = SessionService::with_options(store, &config.server);
        Self {
            config: Arc::new(config),
            sessions: Arc::new(sessions),
        }
    }
}
