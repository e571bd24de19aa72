use std::sync::Arc;

use db::DBService;
use services::services::{
    config::AppConfig,
    nomination::NominationService,
    sync::{SyncError, worker::SyncService},
    voting::VotingService,
};

pub mod error;
pub mod file_logging;
pub mod middleware;
pub mod routes;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: DBService,
    pub config: Arc<AppConfig>,
    pub nominations: NominationService,
    pub voting: VotingService,
    pub sync: SyncService,
}

impl AppState {
    pub fn new(db: DBService, config: AppConfig, sync: SyncService) -> Self {
        let nominations = NominationService::new(db.pool.clone(), config.public_base_url.clone());
        let voting = VotingService::new(db.pool.clone(), config.public_base_url.clone());
        Self {
            db,
            config: Arc::new(config),
            nominations,
            voting,
            sync,
        }
    }

    /// Build the state with HubSpot and Loops clients for every target that
    /// has credentials.
    pub fn from_config(db: DBService, config: AppConfig) -> Result<Self, SyncError> {
        let sync = SyncService::from_config(db.pool.clone(), &config)?;
        Ok(Self::new(db, config, sync))
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.db.pool
    }
}
