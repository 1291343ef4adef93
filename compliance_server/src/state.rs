use std::sync::{Arc, RwLock};

use crate::db::DbPool;
use crate::settings::ServerSettings;

/// Shared state managed by Rocket and handed to the background tasks.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub settings: Arc<RwLock<ServerSettings>>,
}

impl AppState {
    pub fn new(db_pool: DbPool, settings: ServerSettings) -> Self {
        Self {
            db_pool,
            settings: Arc::new(RwLock::new(settings)),
        }
    }

    /// Copy of the current settings; a poisoned lock falls back to defaults.
    pub fn settings_snapshot(&self) -> ServerSettings {
        self.settings
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}
