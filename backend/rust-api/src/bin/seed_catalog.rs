use anyhow::Context;
use tracing_subscriber::fmt::init;

use techsteps_api::{
    config::Config,
    services::{catalog_seed, AppState},
};

/// Upserts the lesson catalog. Usage: `seed_catalog [catalog.json]`; without
/// an argument the configured `catalog_file` or the bundled catalog is used.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();

    let mut config = Config::load().context("Failed to load configuration")?;
    let path = std::env::args().nth(1).or_else(|| config.catalog_file.clone());
    config.seed_catalog = false;

    let app_state = AppState::connect(config)
        .await
        .context("Failed to initialize app state")?;

    let catalog = catalog_seed::load_catalog(path.as_deref()).await?;
    catalog_seed::seed_catalog(app_state.store.as_ref(), &catalog).await?;

    Ok(())
}
