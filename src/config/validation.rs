use crate::config::types::{
    CategoryEntry, Config, FetcherConfig, OutputConfig, PaginationConfig, PipelineConfig,
    SiteConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_pipeline_config(&config.pipeline)?;
    validate_output_config(&config.output)?;
    validate_extra_categories(&config.extra_categories)?;
    Ok(())
}

/// Validates the target site configuration
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    if config.base_url.is_empty() {
        return Err(ConfigError::MissingBaseUrl);
    }

    let base = validate_http_url("base_url", &config.base_url)?;

    for path in &config.root_paths {
        base.join(path).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid root path '{}': {}", path, e))
        })?;
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    validate_pagination_config(&config.pagination)
}

/// Validates pagination settings
fn validate_pagination_config(config: &PaginationConfig) -> Result<(), ConfigError> {
    if config.page_param.is_empty() {
        return Err(ConfigError::Validation(
            "page_param cannot be empty".to_string(),
        ));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.concurrency_limit < 1 || config.concurrency_limit > 1000 {
        return Err(ConfigError::Validation(format!(
            "concurrency_limit must be between 1 and 1000, got {}",
            config.concurrency_limit
        )));
    }

    if !config.backoff_factor.is_finite() || config.backoff_factor < 0.0 {
        return Err(ConfigError::Validation(format!(
            "backoff_factor must be a non-negative number, got {}",
            config.backoff_factor
        )));
    }

    if config.max_retries < 1 || config.max_retries > 20 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be between 1 and 20, got {}",
            config.max_retries
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    Ok(())
}

fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.write_batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "write_batch_size must be >= 1, got {}",
            config.write_batch_size
        )));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates hand-maintained category entries
fn validate_extra_categories(entries: &[CategoryEntry]) -> Result<(), ConfigError> {
    for entry in entries {
        validate_http_url("extra category url", &entry.url)?;

        if entries.iter().filter(|e| e.id == entry.id).count() > 1 {
            return Err(ConfigError::Validation(format!(
                "Extra category id {} is listed more than once",
                entry.id
            )));
        }
    }
    Ok(())
}

/// Parses an absolute http(s) URL
fn validate_http_url(field: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' has no host",
            field, value
        )));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.site.base_url = "https://www.shop.example".to_string();
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_base_url() {
        let config = Config::default();
        assert!(matches!(validate(&config), Err(ConfigError::MissingBaseUrl)));
    }

    #[test]
    fn test_base_url_must_be_http() {
        let mut config = valid_config();
        config.site.base_url = "ftp://shop.example".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));

        config.site.base_url = "not a url".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_concurrency_limit_bounds() {
        let mut config = valid_config();
        config.fetcher.concurrency_limit = 0;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));

        config.fetcher.concurrency_limit = 1;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_backoff_factor_must_be_non_negative() {
        let mut config = valid_config();
        config.fetcher.backoff_factor = -1.0;
        assert!(validate(&config).is_err());

        config.fetcher.backoff_factor = f64::NAN;
        assert!(validate(&config).is_err());

        config.fetcher.backoff_factor = 0.0;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_max_retries_at_least_one() {
        let mut config = valid_config();
        config.fetcher.max_retries = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_duplicate_extra_category_rejected() {
        let mut config = valid_config();
        let entry = CategoryEntry {
            id: 4172,
            url: "https://www.shop.example/women/shoes/cat/?cid=4172".to_string(),
        };
        config.extra_categories = vec![entry.clone(), entry];
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }
}
