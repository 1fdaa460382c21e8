mod backend;
mod bot;
mod channel;
mod config;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,broadcall_bot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Missing bot token is fatal: log and exit without serving.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    info!("Backend URL: {}", config.backend_url);
    info!("Bot is starting...");

    bot::run(config).await?;

    Ok(())
}
