//! Environment-sourced configuration. The bot token is required; everything
//! else has a local-development default.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {var}: {value}")]
    InvalidVar { var: &'static str, value: String },
}

#[derive(Clone)]
pub struct Config {
    /// Chat service authentication token. The process refuses to start
    /// without it.
    pub bot_token: String,

    /// sqlx connection URL for the durable store.
    pub database_url: String,

    /// Cadence of the scheduled poll over all feeds.
    pub poll_interval: Duration,

    /// Pacing delay between feeds within one poll cycle.
    pub feed_pacing: Duration,
}

/// Masks the bot token so it cannot leak through logs or error output.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bot_token", &"[REDACTED]")
            .field("database_url", &self.database_url)
            .field("poll_interval", &self.poll_interval)
            .field("feed_pacing", &self.feed_pacing)
            .finish()
    }
}

impl Config {
    pub const DEFAULT_DATABASE_URL: &'static str = "sqlite:autofeeds.db";
    pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 900; // 15 minutes
    pub const DEFAULT_FEED_PACING_MS: u64 = 1000;

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bot_token = get("BOT_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::MissingVar("BOT_TOKEN"))?;

        let database_url =
            get("DATABASE_URL").unwrap_or_else(|| Self::DEFAULT_DATABASE_URL.to_string());

        let poll_interval_secs = parse_var(
            &get,
            "POLL_INTERVAL_SECS",
            Self::DEFAULT_POLL_INTERVAL_SECS,
        )?;
        let feed_pacing_ms = parse_var(&get, "FEED_PACING_MS", Self::DEFAULT_FEED_PACING_MS)?;

        Ok(Self {
            bot_token,
            database_url,
            poll_interval: Duration::from_secs(poll_interval_secs),
            feed_pacing: Duration::from_millis(feed_pacing_ms),
        })
    }
}

fn parse_var(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match get(var) {
        None => Ok(default),
        Some(value) => value
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidVar { var, value }),
    }
}
