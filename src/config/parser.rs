use crate::config::env::apply_process_env;
use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Parses a configuration from TOML text without applying the environment
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Loads the configuration for a run
///
/// Sources are layered as defaults, then the optional TOML file, then the
/// process environment (`BASE_URL`, `CONCURRENCY_LIMIT`, `BACKOFF_FACTOR`,
/// `MAX_RETRIES`, ...). The merged result is validated.
///
/// # Arguments
///
/// * `path` - Optional path to a TOML configuration file
///
/// # Example
///
/// ```no_run
/// use catalog_harvest::config::load_config;
///
/// std::env::set_var("BASE_URL", "https://www.shop.example");
/// let config = load_config(None).unwrap();
/// assert_eq!(config.fetcher.concurrency_limit, 100);
/// ```
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config = load_config_unvalidated(path)?;
    validate(&config)?;
    Ok(config)
}

/// Layers file and environment like `load_config` but skips validation
///
/// Commands that only read the database (statistics, export) need the
/// output settings without a crawl target.
pub fn load_config_unvalidated(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            parse_config(&content)?
        }
        None => Config::default(),
    };

    apply_process_env(&mut config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the effective configuration
///
/// The hash covers the merged configuration (file and environment), so two
/// runs with the same hash crawled with the same settings.
pub fn compute_config_hash(config: &Config) -> Result<String, ConfigError> {
    let rendered = toml::to_string(config)?;
    let mut hasher = Sha256::new();
    hasher.update(rendered.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: Option<&Path>) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(&config)?;
    Ok((config, hash))
}
