use std::sync::Arc;

use duo_db::{Database, StoreError};
use duo_feed::ChangeFeed;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub feed: ChangeFeed,
    pub anon_key: String,
    pub jwt_secret: String,
}

impl AppStateInner {
    pub fn new(db: Database, anon_key: String, jwt_secret: String) -> AppState {
        Arc::new(Self {
            db,
            feed: ChangeFeed::new(),
            anon_key,
            jwt_secret,
        })
    }
}

/// Run blocking DB work off the async runtime.
pub async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            tracing::error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}
