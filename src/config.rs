//! Configuration module for newsrelay.

use serde::Deserialize;
use std::path::Path;

use crate::{RelayError, Result};

/// What to do when sending a single item fails during publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnPostError {
    /// Log the failure, leave the item due, and go on with the batch.
    #[default]
    Continue,
    /// Stop the batch and return the error.
    Abort,
}

/// Order in which matched items are posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PublishOrder {
    #[default]
    OldestFirst,
    NewestFirst,
}

/// Export parameters: logging, publication delay and pacing.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportParams {
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub log_file: String,
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Seconds between detection of an item and its earliest publication.
    #[serde(default = "default_pub_pause")]
    pub pub_pause: u64,
    /// Seconds to sleep between two sent messages.
    #[serde(default = "default_delay_between_messages")]
    pub delay_between_messages: u64,
    /// Per-item post failure policy.
    #[serde(default)]
    pub on_post_error: OnPostError,
    /// Posting order within one publish batch.
    #[serde(default)]
    pub publish_order: PublishOrder,
    /// Age in seconds after which a run lease is considered abandoned.
    #[serde(default = "default_lock_stale_after")]
    pub lock_stale_after: u64,
}

fn default_log_file() -> String {
    "logs/newsrelay.log".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_pub_pause() -> u64 {
    3600 // 1 hour
}

fn default_delay_between_messages() -> u64 {
    3
}

fn default_lock_stale_after() -> u64 {
    3600
}

impl Default for ExportParams {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            log_level: default_log_level(),
            pub_pause: default_pub_pause(),
            delay_between_messages: default_delay_between_messages(),
            on_post_error: OnPostError::default(),
            publish_order: PublishOrder::default(),
            lock_stale_after: default_lock_stale_after(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string for the store.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "sqlite://data/newsrelay.db?mode=rwc".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// RSS source configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RssConfig {
    /// Feed URL.
    #[serde(default)]
    pub link: String,
}

/// Telegram bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Destination chat id or `@channel` username.
    #[serde(default)]
    pub chat: String,
    /// Bot access token.
    #[serde(default)]
    pub access_token: String,
    /// Bot API base URL.
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            chat: String::new(),
            access_token: String::new(),
            api_url: default_telegram_api_url(),
        }
    }
}

/// Bitly configuration. An empty token disables shortening.
#[derive(Debug, Clone, Deserialize)]
pub struct BitlyConfig {
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_bitly_api_url")]
    pub api_url: String,
}

fn default_bitly_api_url() -> String {
    "https://api-ssl.bitly.com".to_string()
}

impl Default for BitlyConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            api_url: default_bitly_api_url(),
        }
    }
}

/// Outbound HTTP configuration shared by the feed, Bitly and Telegram clients.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_timeout() -> u64 {
    30
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub export_params: ExportParams,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub rss: RssConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub bitly: BitlyConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(RelayError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RelayError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `NEWSRELAY_TELEGRAM_TOKEN`: bot access token
    /// - `NEWSRELAY_BITLY_TOKEN`: Bitly access token
    /// - `NEWSRELAY_DATABASE`: database connection string
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(token) = non_empty_env("NEWSRELAY_TELEGRAM_TOKEN") {
            self.telegram.access_token = token;
        }
        if let Some(token) = non_empty_env("NEWSRELAY_BITLY_TOKEN") {
            self.bitly.access_token = token;
        }
        if let Some(path) = non_empty_env("NEWSRELAY_DATABASE") {
            self.database.path = path;
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - the feed link is empty or not an http(s) URL
    /// - the Telegram chat or access token is empty
    /// - `export_params.lock_stale_after` is zero
    pub fn validate(&self) -> Result<()> {
        if self.rss.link.is_empty() {
            return Err(RelayError::Config("rss.link is not set".to_string()));
        }
        let feed_url = url::Url::parse(&self.rss.link)
            .map_err(|e| RelayError::Config(format!("rss.link is not a valid URL: {e}")))?;
        if !matches!(feed_url.scheme(), "http" | "https") {
            return Err(RelayError::Config(format!(
                "rss.link has unsupported scheme: {}",
                feed_url.scheme()
            )));
        }
        if self.telegram.chat.is_empty() {
            return Err(RelayError::Config("telegram.chat is not set".to_string()));
        }
        if self.telegram.access_token.is_empty() {
            return Err(RelayError::Config(
                "telegram.access_token is not set. \
                 Set it in config.toml or via NEWSRELAY_TELEGRAM_TOKEN environment variable."
                    .to_string(),
            ));
        }
        if self.export_params.lock_stale_after == 0 {
            return Err(RelayError::Config(
                "export_params.lock_stale_after must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
