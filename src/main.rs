use dotenvy::dotenv;
use piggy_ledger::{
    config::{
        database::{get_database_url, init_store},
        settings::load_default_config,
    },
    core::{balance::balance_summary, bucket::seed_initial_buckets},
    errors::Result,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load settings (config.toml is optional)
    let config = load_default_config()
        .inspect_err(|e| error!("Failed to load settings: {}", e))?;

    // 4. Open and migrate the store
    let database_url = get_database_url(&config);
    let db = init_store(&database_url)
        .await
        .inspect_err(|e| error!(fatal = e.is_fatal(), "Failed to initialize store: {}", e))?;

    // 5. Seed configured buckets
    let seeded = seed_initial_buckets(&db, &config.buckets)
        .await
        .inspect_err(|e| error!("Failed to seed initial buckets: {}", e))?;
    info!(seeded, "Initial buckets checked");

    let summary = balance_summary(&db).await?;
    info!(
        total = summary.total,
        allocated = summary.allocated,
        free = summary.free,
        "Ledger ready"
    );

    Ok(())
}
