use std::sync::Arc;

use crate::account::{service::AccountService, store::UserStore};
use crate::config::AppConfig;
use crate::db;

/// Composition root: constructed once at startup and handed to consumers
/// explicitly, instead of hiding components behind global singletons.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub accounts: AccountService,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = Arc::new(AppConfig::from_env());
        let pool = db::connect(&config.database_url).await?;
        let accounts = AccountService::new(UserStore::new(pool), config.clone());
        Ok(Self { config, accounts })
    }
}
