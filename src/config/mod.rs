use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod defaults;
pub mod duration_serde;

use crate::errors::ConfigError;
use defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub dispatcher: DispatcherConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// Knobs for the dispatcher loop itself: how many messages are claimed per
/// tick, how often the tick fires, and how long a claim is held before
/// another dispatcher may reclaim it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: i64,

    #[serde(with = "duration_serde::duration", default = "default_poll_interval")]
    pub poll_interval: Duration,

    #[serde(
        with = "duration_serde::duration",
        default = "default_processing_lock_timeout"
    )]
    pub processing_lock_timeout: Duration,
}

fn default_fetch_limit() -> i64 {
    DEFAULT_FETCH_LIMIT
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)
}

fn default_processing_lock_timeout() -> Duration {
    Duration::from_secs(DEFAULT_PROCESSING_LOCK_TIMEOUT_SECS)
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            fetch_limit: default_fetch_limit(),
            poll_interval: default_poll_interval(),
            processing_lock_timeout: default_processing_lock_timeout(),
        }
    }
}

/// Backoff family for the retry scheduler. Wire values are lowercase
/// string constants (`fixed`, `linear`, `exponential`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    Fixed,
    Linear,
    Exponential,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Exponential
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u8,

    #[serde(with = "duration_serde::duration", default = "default_retry_delay")]
    pub retry_delay: Duration,

    #[serde(default)]
    pub backoff_strategy: BackoffStrategy,

    #[serde(with = "duration_serde::duration", default = "default_jitter")]
    pub jitter: Duration,

    #[serde(with = "duration_serde::duration", default = "default_max_delay")]
    pub max_delay: Duration,
}

fn default_max_retry_attempts() -> u8 {
    DEFAULT_MAX_RETRY_ATTEMPTS
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(DEFAULT_RETRY_DELAY_SECS)
}

fn default_jitter() -> Duration {
    Duration::from_millis(DEFAULT_JITTER_MILLIS)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(DEFAULT_MAX_DELAY_SECS)
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: default_max_retry_attempts(),
            retry_delay: default_retry_delay(),
            backoff_strategy: BackoffStrategy::default(),
            jitter: default_jitter(),
            max_delay: default_max_delay(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            dispatcher: DispatcherConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Resolves the config file path from `CONFIG_FILE` (default
    /// `config.toml`) and loads it.
    pub fn load() -> Result<Self, ConfigError> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    /// Loads configuration by merging a TOML file with
    /// `OUTBOX_DISPATCHER__`-prefixed environment variables. A missing file
    /// is not an error: defaults are used and a warning is logged, so the
    /// dispatcher still starts under pure env-var configuration.
    pub fn load_from_file(config_file: &str) -> Result<Self, ConfigError> {
        if !std::path::Path::new(config_file).exists() {
            tracing::warn!(
                path = config_file,
                "config file not found, using default configuration values"
            );
            let config: Config = Figment::new()
                .merge(Serialized::defaults(Self::default()))
                .merge(Env::prefixed("OUTBOX_DISPATCHER__").split("__"))
                .extract()?;
            return Ok(config);
        }

        let config: Config = Figment::new()
            .merge(Toml::file(config_file))
            .merge(Env::prefixed("OUTBOX_DISPATCHER__").split("__"))
            .extract()?;

        Ok(config)
    }
}
