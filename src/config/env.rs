//! Environment variable overrides
//!
//! Values found in the environment take precedence over the TOML file and
//! the built-in defaults.

use crate::config::types::Config;
use crate::ConfigError;
use std::str::FromStr;

pub const BASE_URL: &str = "BASE_URL";
pub const CONCURRENCY_LIMIT: &str = "CONCURRENCY_LIMIT";
pub const BACKOFF_FACTOR: &str = "BACKOFF_FACTOR";
pub const MAX_RETRIES: &str = "MAX_RETRIES";
pub const REQUEST_TIMEOUT_SECS: &str = "REQUEST_TIMEOUT_SECS";
pub const DATABASE_PATH: &str = "DATABASE_PATH";
pub const USER_AGENT: &str = "USER_AGENT";

/// Applies overrides read from the process environment
pub fn apply_process_env(config: &mut Config) -> Result<(), ConfigError> {
    apply_env_overrides(config, |key| std::env::var(key).ok())
}

/// Applies overrides using the given lookup function
///
/// Empty values are ignored so that `BASE_URL=` does not wipe a value set in
/// the config file.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(url) = get(BASE_URL) {
        config.site.base_url = url;
    }
    if let Some(agent) = get(USER_AGENT) {
        config.site.user_agent = agent;
    }
    if let Some(path) = get(DATABASE_PATH) {
        config.output.database_path = path;
    }
    if let Some(value) = get(CONCURRENCY_LIMIT) {
        config.fetcher.concurrency_limit = parse_value(CONCURRENCY_LIMIT, &value)?;
    }
    if let Some(value) = get(BACKOFF_FACTOR) {
        config.fetcher.backoff_factor = parse_value(BACKOFF_FACTOR, &value)?;
    }
    if let Some(value) = get(MAX_RETRIES) {
        config.fetcher.max_retries = parse_value(MAX_RETRIES, &value)?;
    }
    if let Some(value) = get(REQUEST_TIMEOUT_SECS) {
        config.fetcher.request_timeout_secs = parse_value(REQUEST_TIMEOUT_SECS, &value)?;
    }

    Ok(())
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Env {
        key: key.to_string(),
        value: value.to_string(),
        message: e.to_string(),
    })
}
