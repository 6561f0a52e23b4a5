use std::sync::Arc;

use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, PooledConnection},
};

use crate::{
    auth::jwt::JwtService,
    checklist::SeedCatalog,
    config::AppConfig,
    db::PgPool,
    error::{AppError, AppResult},
    notify::Notifier,
    render::CertificateRenderer,
    storage::ObjectStorage,
};

type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn ObjectStorage>,
    pub renderer: Arc<dyn CertificateRenderer>,
    pub notifier: Arc<dyn Notifier>,
    pub seed: Arc<SeedCatalog>,
    pub jwt: JwtService,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        storage: Arc<dyn ObjectStorage>,
        renderer: Arc<dyn CertificateRenderer>,
        notifier: Arc<dyn Notifier>,
        seed: SeedCatalog,
        jwt: JwtService,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            storage,
            renderer,
            notifier,
            seed: Arc::new(seed),
            jwt,
        }
    }

    pub fn db(&self) -> AppResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::internal(format!("database pool error: {err}")))
    }

    pub fn public_base_url(&self) -> Option<&str> {
        self.config.public_base_url.as_deref()
    }
}
