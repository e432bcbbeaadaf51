use std::sync::Arc;

use anyhow::Result;
use unylost_db::Database;

use crate::ai_layer::AiLayer;
use crate::config::Config;
use crate::error::ApiResult;
use crate::notify::Notifier;
use crate::storage::Storage;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub config: Config,
    pub ai: AiLayer,
    pub storage: Storage,
    pub notifier: Notifier,
}

impl AppStateInner {
    pub fn new(db: Database, config: Config, storage: Storage) -> Result<AppState> {
        let ai = AiLayer::new(&config)?;
        Ok(Arc::new(Self {
            db,
            config,
            ai,
            storage,
            notifier: Notifier,
        }))
    }
}

/// Runs a database closure on the blocking pool.
pub async fn blocking<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Database) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    let value = tokio::task::spawn_blocking(move || f(&state.db)).await??;
    Ok(value)
}
