use anyhow::Context;
use chrono::Utc;
use tracing_subscriber::EnvFilter;

use certification::{config::AppConfig, db, scheduler};

/// Run-once sweep for recurring inspections, intended to be fired daily by
/// cron. Re-running it on the same day before due dates advance will create
/// duplicates; schedule it once per day.
fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "scheduler",
        database_url = %config.redacted_database_url(),
        "loaded configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let today = Utc::now().date_naive();
    let summary = scheduler::run_recurring(&mut conn, today)
        .map_err(|err| anyhow::anyhow!("recurring sweep failed: {err:?}"))?;

    tracing::info!(
        machines_due = summary.machines_due,
        inspections_created = summary.inspections_created,
        skipped = summary.skipped,
        %today,
        "recurring sweep finished"
    );

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
