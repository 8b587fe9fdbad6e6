//! Configuration management

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_INITIAL_BACKOFF_MS, DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_TOKEN_REFRESH_MARGIN_SECS,
};
use crate::errors::{CalSyncError, Result};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub google: GoogleConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

/// Google Calendar / OAuth client configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub token_url: String,
    pub revoke_url: String,
    pub api_base_url: String,
    /// IANA zone name sent with every event's start and end.
    pub time_zone: String,
    pub request_timeout_secs: u64,
}

/// Sync engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Six-field cron expression (with seconds) for the periodic scheduler.
    pub cron_expression: String,
    pub max_concurrent_connections: usize,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub token_refresh_margin_secs: u64,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Fallback filter directive when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "calsync.db".to_string(), pool_size: 4 }
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            revoke_url: "https://oauth2.googleapis.com/revoke".to_string(),
            api_base_url: "https://www.googleapis.com/calendar/v3".to_string(),
            time_zone: "UTC".to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_url", &self.token_url)
            .field("revoke_url", &self.revoke_url)
            .field("api_base_url", &self.api_base_url)
            .field("time_zone", &self.time_zone)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cron_expression: "0 */15 * * * *".to_string(),
            max_concurrent_connections: 4,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            token_refresh_margin_secs: DEFAULT_TOKEN_REFRESH_MARGIN_SECS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}

impl Config {
    /// Reject configurations the engine cannot run with.
    ///
    /// # Errors
    /// Returns `CalSyncError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(CalSyncError::Config("database.path must not be empty".into()));
        }
        if self.database.pool_size == 0 {
            return Err(CalSyncError::Config("database.pool_size must be at least 1".into()));
        }
        if self.google.client_id.trim().is_empty() {
            return Err(CalSyncError::Config("google.client_id is required".into()));
        }
        if self.google.client_secret.trim().is_empty() {
            return Err(CalSyncError::Config("google.client_secret is required".into()));
        }
        if self.google.request_timeout_secs == 0 {
            return Err(CalSyncError::Config(
                "google.request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.sync.max_concurrent_connections == 0 {
            return Err(CalSyncError::Config(
                "sync.max_concurrent_connections must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
