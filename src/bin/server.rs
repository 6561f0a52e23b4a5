use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use certification::{
    auth::jwt::JwtService, checklist::SeedCatalog, config::AppConfig, db,
    notify::LogNotifier, render::HtmlCertificateRenderer, routes, state::AppState,
    storage::{build_client, S3Storage},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "server",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        s3_bucket = %config.s3_bucket,
        public_base_url = config.public_base_url.as_deref().unwrap_or("<unset>"),
        "loaded configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let s3_client = build_client(&config).await?;
    let storage = Arc::new(S3Storage::new(s3_client, config.s3_bucket.clone()));
    let seed = SeedCatalog::load(config.checklist_seed_path.as_deref())?;
    tracing::info!(seed_version = seed.version, items = seed.items.len(), "checklist seed loaded");
    let jwt = JwtService::from_config(&config)?;

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let state = AppState::new(
        pool,
        config,
        storage,
        Arc::new(HtmlCertificateRenderer),
        Arc::new(LogNotifier),
        seed,
        jwt,
    );

    let router = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
