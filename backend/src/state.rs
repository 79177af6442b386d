use crate::{config::Config, error::AppError, store::JsonStore, utils::hash::hash_password};
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub store: JsonStore,
    pub config: Config,
    /// Argon2 hash of the configured admin password, computed once.
    pub admin_password_hash: String,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, AppError> {
        let store = JsonStore::open(&config.data_dir).await?;
        let admin_password_hash = hash_password(&config.admin_password)?;

        Ok(Self {
            store,
            config,
            admin_password_hash,
        })
    }
}

impl FromRef<AppState> for JsonStore {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
