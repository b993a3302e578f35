//! Configuration module for Catalog-Harvest
//!
//! This module handles loading, merging, and validating the run
//! configuration. Settings come from built-in defaults, an optional TOML
//! file, and environment variables, in increasing order of precedence.
//!
//! # Example
//!
//! ```no_run
//! use catalog_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Some(Path::new("harvest.toml"))).unwrap();
//! println!("Concurrency limit: {}", config.fetcher.concurrency_limit);
//! ```

pub mod env;
mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CategoryEntry, Config, FetcherConfig, OutputConfig, PaginationConfig, PaginationStrategy,
    PipelineConfig, SiteConfig, DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_unvalidated, load_config_with_hash, parse_config,
};
pub use validation::validate;
