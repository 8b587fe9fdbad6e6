//! Configuration loader
//!
//! Loads engine configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file into the environment, if one exists
//! 2. Attempts to load from environment variables
//! 3. If the required variables are missing, falls back to a config file
//!    (still honouring the optional `CALSYNC_*` overrides)
//! 4. Validates the result
//!
//! ## Environment Variables
//! Required:
//! - `CALSYNC_DB_PATH`: Database file path
//! - `CALSYNC_GOOGLE_CLIENT_ID`: OAuth client id
//! - `CALSYNC_GOOGLE_CLIENT_SECRET`: OAuth client secret
//!
//! Optional overrides:
//! - `CALSYNC_DB_POOL_SIZE`
//! - `CALSYNC_GOOGLE_TOKEN_URL`, `CALSYNC_GOOGLE_REVOKE_URL`,
//!   `CALSYNC_GOOGLE_API_BASE_URL`
//! - `CALSYNC_TIME_ZONE`: IANA zone sent with every event
//! - `CALSYNC_REQUEST_TIMEOUT_SECS`
//! - `CALSYNC_SYNC_CRON`: Six-field cron expression
//! - `CALSYNC_MAX_CONCURRENT_CONNECTIONS`
//! - `CALSYNC_MAX_RETRIES`, `CALSYNC_INITIAL_BACKOFF_MS`
//! - `CALSYNC_TOKEN_REFRESH_MARGIN_SECS`
//! - `CALSYNC_LOG_LEVEL`, `CALSYNC_LOG_FORMAT` (`pretty` or `json`)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./calsync.toml`, `./calsync.json`, `./config.toml`, `./config.json`
//! 2. The same names in the parent directory
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use calsync_domain::{CalSyncError, Config, LogFormat, Result};

const CONFIG_FILE_NAMES: [&str; 4] = ["calsync.toml", "calsync.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `CalSyncError::Config` if no source yields a configuration or
/// the loaded configuration fails validation.
pub fn load() -> Result<Config> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    let config = match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            config
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            let mut config = load_from_file(None)?;
            apply_env_overrides(&mut config)?;
            config
        }
    };

    config.validate()?;
    Ok(config)
}

/// Load an explicitly chosen config file, then apply the `CALSYNC_*`
/// overrides and validate.
///
/// # Errors
/// Returns `CalSyncError::Config` if the file is missing or unparsable, an
/// override is malformed, or validation fails.
pub fn load_with_path(path: &Path) -> Result<Config> {
    if let Ok(env_file) = dotenvy::dotenv() {
        tracing::debug!(path = %env_file.display(), "Loaded .env file");
    }

    let mut config = load_from_file(Some(path.to_path_buf()))?;
    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from environment variables
///
/// The database path and OAuth client credentials must be present; every
/// other setting falls back to its default unless overridden.
///
/// # Errors
/// Returns `CalSyncError::Config` if a required variable is missing or an
/// override cannot be parsed.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();
    config.database.path = env_var("CALSYNC_DB_PATH")?;
    config.google.client_id = env_var("CALSYNC_GOOGLE_CLIENT_ID")?;
    config.google.client_secret = env_var("CALSYNC_GOOGLE_CLIENT_SECRET")?;

    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. TOML and JSON are
/// supported, detected by file extension.
///
/// # Errors
/// Returns `CalSyncError::Config` if the file is missing, unreadable or
/// malformed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CalSyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CalSyncError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CalSyncError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content, by file extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CalSyncError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CalSyncError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(CalSyncError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.join(".."));
        dirs.insert(0, cwd);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

fn apply_env_overrides(config: &mut Config) -> Result<()> {
    override_parsed("CALSYNC_DB_POOL_SIZE", &mut config.database.pool_size)?;

    override_string("CALSYNC_GOOGLE_TOKEN_URL", &mut config.google.token_url);
    override_string("CALSYNC_GOOGLE_REVOKE_URL", &mut config.google.revoke_url);
    override_string("CALSYNC_GOOGLE_API_BASE_URL", &mut config.google.api_base_url);
    override_string("CALSYNC_TIME_ZONE", &mut config.google.time_zone);
    override_parsed("CALSYNC_REQUEST_TIMEOUT_SECS", &mut config.google.request_timeout_secs)?;

    override_string("CALSYNC_SYNC_CRON", &mut config.sync.cron_expression);
    override_parsed(
        "CALSYNC_MAX_CONCURRENT_CONNECTIONS",
        &mut config.sync.max_concurrent_connections,
    )?;
    override_parsed("CALSYNC_MAX_RETRIES", &mut config.sync.max_retries)?;
    override_parsed("CALSYNC_INITIAL_BACKOFF_MS", &mut config.sync.initial_backoff_ms)?;
    override_parsed(
        "CALSYNC_TOKEN_REFRESH_MARGIN_SECS",
        &mut config.sync.token_refresh_margin_secs,
    )?;

    override_string("CALSYNC_LOG_LEVEL", &mut config.logging.level);
    if let Some(format) = optional_env("CALSYNC_LOG_FORMAT") {
        config.logging.format = parse_log_format(&format)?;
    }

    Ok(())
}

/// Get required environment variable
///
/// # Errors
/// Returns `CalSyncError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    optional_env(key).ok_or_else(|| {
        CalSyncError::Config(format!("Missing required environment variable: {}", key))
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn override_string(key: &str, target: &mut String) {
    if let Some(value) = optional_env(key) {
        *target = value;
    }
}

fn override_parsed<T>(key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(value) = optional_env(key) {
        *target = value
            .trim()
            .parse()
            .map_err(|e| CalSyncError::Config(format!("Invalid value for {}: {}", key, e)))?;
    }
    Ok(())
}

fn parse_log_format(value: &str) -> Result<LogFormat> {
    match value.trim().to_ascii_lowercase().as_str() {
        "pretty" | "text" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        other => Err(CalSyncError::Config(format!("Unsupported log format: {}", other))),
    }
}
