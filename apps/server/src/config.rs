//! Application configuration.

use pricewatch_feeds::FetcherConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
    #[error("Invalid setting {0}: {1}")]
    Invalid(&'static str, String),
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Telegram settings.
    pub telegram: TelegramSettings,
    /// Price feed settings.
    pub feed: FeedSettings,
    /// Monitor loop settings.
    pub monitor: MonitorSettings,
    /// SQLite database URL.
    pub database_url: String,
    /// Logging level.
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramSettings::default(),
            feed: FeedSettings::default(),
            monitor: MonitorSettings::default(),
            database_url: "sqlite://db/saves.db".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Telegram settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    /// Bot API token.
    pub bot_token: String,
}

/// Price feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// API root.
    pub base_url: String,
    /// Chain id in the pair URL.
    pub chain: String,
    /// Address of the watched pair.
    pub token_address: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.dexscreener.com".to_string(),
            chain: "ton".to_string(),
            token_address: String::new(),
            timeout_secs: 10,
        }
    }
}

impl From<&FeedSettings> for FetcherConfig {
    fn from(settings: &FeedSettings) -> Self {
        FetcherConfig {
            base_url: settings.base_url.clone(),
            chain: settings.chain.clone(),
            token_address: settings.token_address.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

/// Monitor loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Seconds between price checks.
    pub poll_interval_secs: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
        }
    }
}

impl MonitorSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl AppConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a key lookup.
    pub fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Some(address) = get("TOKEN_ADDRESS") {
            self.feed.token_address = address;
        }
        if let Some(chain) = get("FEED_CHAIN") {
            self.feed.chain = chain;
        }
        if let Some(url) = get("DATABASE_URL") {
            self.database_url = url;
        }
    }

    /// Check the settings needed to start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(ConfigError::Missing("telegram.bot_token"));
        }
        if self.feed.token_address.trim().is_empty() {
            return Err(ConfigError::Missing("feed.token_address"));
        }
        if self.monitor.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "monitor.poll_interval_secs",
                "must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
