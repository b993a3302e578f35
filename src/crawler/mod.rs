//! Crawler module for the staged catalog crawl
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with bounded concurrency and retry logic
//! - The four crawl stages
//! - Overall pipeline coordination

mod coordinator;
mod fetcher;
mod retry;
mod stages;

pub use coordinator::{run_pipeline, Coordinator, RunOptions, RunSummary, StageReport};
pub use fetcher::{build_http_client, FetchError, FetchFailure, Fetcher, HttpTransport, Transport};
pub use retry::RetryPolicy;
pub use stages::{root_pages, StageTally};
