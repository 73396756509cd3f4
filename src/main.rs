use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;

use tracing::info;

use streamrelay::{AppConfig, ApplicationServer, Logger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let config = Arc::new(AppConfig::parse());

    // guards have to live as long as main or the file writer and sentry stop flushing
    let _guards = Logger::init(config.cargo_env, config.sentry_dsn.clone());

    info!(
        "logger and env prepped, catalog at {}, proxy timeout {}s",
        config.catalog_dir, config.proxy_timeout_secs
    );

    ApplicationServer::serve(config)
        .await
        .context("relay server failed to start")?;

    Ok(())
}
