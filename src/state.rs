use std::sync::Arc;

use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, PooledConnection},
};

use crate::{
    auth::token::TokenService,
    config::AppConfig,
    db::PgPool,
    error::{AppError, AppResult},
    storage::BlobStore,
};

type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub object_store: Arc<dyn BlobStore>,
    pub local_store: Arc<dyn BlobStore>,
    pub tokens: TokenService,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        object_store: Arc<dyn BlobStore>,
        local_store: Arc<dyn BlobStore>,
        tokens: TokenService,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            object_store,
            local_store,
            tokens,
        }
    }

    pub fn db(&self) -> AppResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::internal(format!("database pool error: {err}")))
    }
}
