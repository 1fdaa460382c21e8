use std::env;

use anyhow::{Context, Result};

const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

/// Immutable runtime configuration, read once at startup and passed
/// explicitly into the dispatcher.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: String,
    pub bot_token: String,
}

impl Config {
    /// Load configuration from the environment (a `.env` file is honored
    /// when present). A missing bot token is a fatal startup condition.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let bot_token = env::var("TELEGRAM_BOT_TOKEN")
            .context("TELEGRAM_BOT_TOKEN environment variable not set")?;

        let backend_url =
            env::var("BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());

        Ok(Self {
            backend_url,
            bot_token,
        })
    }
}
