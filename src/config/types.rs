use serde::{Deserialize, Serialize};

/// Browser-like user agent; several storefronts refuse obvious bot agents
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/89.0.4389.82 Safari/537.36";

/// Main configuration structure for Catalog-Harvest
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub fetcher: FetcherConfig,
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
    #[serde(rename = "extra-categories")]
    pub extra_categories: Vec<CategoryEntry>,
}

/// Target storefront configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Root URL of the storefront (`BASE_URL`)
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Extra navigation pages to scan for categories, relative to `base-url`
    #[serde(rename = "root-paths")]
    pub root_paths: Vec<String>,

    /// User agent sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// How listing pages are enumerated
    pub pagination: PaginationConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            root_paths: Vec::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            pagination: PaginationConfig::default(),
        }
    }
}

/// Pagination discovery settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub strategy: PaginationStrategy,

    /// Query parameter carrying the page number
    #[serde(rename = "page-param")]
    pub page_param: String,

    /// Upper bound on pages enumerated for a single category
    #[serde(rename = "max-pages")]
    pub max_pages: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            strategy: PaginationStrategy::default(),
            page_param: "page".to_string(),
            max_pages: 500,
        }
    }
}

/// Mechanism used to enumerate the listing pages of a category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaginationStrategy {
    /// Read the "You've viewed X of Y products" counter and generate
    /// `?page=N` URLs
    #[default]
    ProductCount,

    /// Follow `rel="next"` links one page at a time
    NextLink,
}

/// Fetcher behavior configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Maximum number of in-flight requests across the whole process
    #[serde(rename = "concurrency-limit")]
    pub concurrency_limit: u32,

    /// Multiplier of the exponential retry delay, in seconds
    #[serde(rename = "backoff-factor")]
    pub backoff_factor: f64,

    /// Maximum number of attempts per URL
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Upper bound of a single retry delay, in seconds
    #[serde(rename = "max-backoff-secs")]
    pub max_backoff_secs: u64,

    /// Timeout of a single request attempt, in seconds
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 100,
            backoff_factor: 1.0,
            max_retries: 5,
            max_backoff_secs: 60,
            request_timeout_secs: 10,
        }
    }
}

/// Pipeline and storage writer settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of queued write operations committed in one transaction
    #[serde(rename = "write-batch-size")]
    pub write_batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            write_batch_size: 1000,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "catalog_data.db".to_string(),
        }
    }
}

/// A category that is not reachable from the navigation and is listed by hand
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CategoryEntry {
    pub id: i64,
    pub url: String,
}
