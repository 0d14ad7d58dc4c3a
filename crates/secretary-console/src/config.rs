//! Console configuration loaded from environment variables.

use anyhow::{Context, Result};
use console_core::Locale;
use query_cache::CacheConfig;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Console configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Admin API endpoint
    #[serde(default)]
    pub api: ApiConfig,

    /// Bearer token sources
    #[serde(default)]
    pub auth: AuthConfig,

    /// Query cache tuning
    #[serde(default)]
    pub cache: CacheConfig,

    /// Background polling
    #[serde(default)]
    pub poll: PollConfig,

    /// Streamed output buffers
    #[serde(default)]
    pub stream: StreamConfig,

    /// Operator-facing settings
    #[serde(default)]
    pub console: ConsoleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Backend base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// File the token is persisted to after login
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,

    /// Token from the environment; takes precedence over the token file
    #[serde(default)]
    pub token: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// Interval while a scan, download or training job is running
    #[serde(default = "default_active_interval", with = "humantime_serde")]
    pub active_interval: Duration,

    /// Interval while an instance reports running
    #[serde(default = "default_status_interval", with = "humantime_serde")]
    pub status_interval: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Entries kept before trimming
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Entries kept after trimming
    #[serde(default = "default_trim_to")]
    pub trim_to: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    /// Language of operator notifications
    #[serde(default)]
    pub locale: Locale,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,

    /// Directory exports are written to
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    /// Log entries per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_path: default_token_path(),
            token: None,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            active_interval: default_active_interval(),
            status_interval: default_status_interval(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            trim_to: default_trim_to(),
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            export_dir: default_export_dir(),
            page_size: default_page_size(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8002".into()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_token_path() -> PathBuf {
    PathBuf::from(".secretary-token")
}

fn default_active_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_status_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_capacity() -> usize {
    console_core::buffer::DEFAULT_CAPACITY
}

fn default_trim_to() -> usize {
    console_core::buffer::DEFAULT_TRIM_TO
}

fn default_log_level() -> String {
    "info".into()
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_page_size() -> u32 {
    console_core::logs::DEFAULT_PAGE_SIZE
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    // Tokens and paths stay strings.
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        if config.stream.trim_to >= config.stream.capacity {
            anyhow::bail!(
                "STREAM__TRIM_TO ({}) must be below STREAM__CAPACITY ({})",
                config.stream.trim_to,
                config.stream.capacity
            );
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://localhost:8002");
        assert_eq!(config.poll.active_interval, Duration::from_secs(2));
        assert_eq!(config.stream.capacity, 1000);
        assert_eq!(config.stream.trim_to, 500);
        assert_eq!(config.console.locale, Locale::En);
        assert_eq!(config.console.log_format, LogFormat::Pretty);
        assert!(config.auth.token.is_none());
    }

    #[test]
    fn test_sections_deserialize_from_strings() {
        let source = config::Config::builder()
            .set_override("api.timeout", "5s")
            .unwrap()
            .set_override("cache.stale_time", "10s")
            .unwrap()
            .set_override("console.locale", "ru")
            .unwrap()
            .set_override("console.log_format", "json")
            .unwrap()
            .set_override("stream.capacity", "200")
            .unwrap()
            .build()
            .unwrap();

        let config: Config = source.try_deserialize().unwrap();
        assert_eq!(config.api.timeout, Duration::from_secs(5));
        assert_eq!(config.cache.stale_time, Duration::from_secs(10));
        assert_eq!(config.console.locale, Locale::Ru);
        assert_eq!(config.console.log_format, LogFormat::Json);
        assert_eq!(config.stream.capacity, 200);
    }
}
