//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with the configured user agent
//! - A process-wide cap on in-flight requests shared by every stage
//! - Per-attempt timeouts and an explicit retry loop with exponential backoff
//! - Error classification (transient vs. permanent)
//! - Prompt shutdown when the run is cancelled
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | HTTP 2xx | Return body |
//! | HTTP 5xx, 408, 429 | Retry with backoff |
//! | Other HTTP status (404, 403, ...) | Fail immediately |
//! | Timeout | Retry with backoff |
//! | Connection / transport error | Retry with backoff |
//! | Cancelled | Fail immediately |

use crate::config::{FetcherConfig, SiteConfig};
use crate::crawler::retry::RetryPolicy;
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Why a single attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("failed to read body: {0}")]
    Body(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("cancelled")]
    Cancelled,
}

impl FetchFailure {
    /// Returns true if another attempt may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Connect(_) | Self::Body(_) | Self::Request(_) => true,
            Self::Status(code) => *code >= 500 || *code == 408 || *code == 429,
            Self::Cancelled => false,
        }
    }
}

/// Terminal failure of a fetch, after retries were exhausted or skipped
#[derive(Debug, Clone, Error)]
#[error("Failed to fetch {url} after {attempts} attempt(s): {cause}")]
pub struct FetchError {
    pub url: String,
    pub attempts: u32,
    pub cause: FetchFailure,
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        self.cause == FetchFailure::Cancelled
    }
}

/// Performs a single HTTP GET
///
/// This is the seam between the retry loop and the network; tests substitute
/// their own implementation.
pub trait Transport: Send + Sync + 'static {
    /// Fetches `url` once and returns the body of a 2xx response
    fn get(&self, url: &str) -> impl Future<Output = Result<String, FetchFailure>> + Send;
}

/// `Transport` backed by a `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds the transport from the site and fetcher configuration
    pub fn from_config(site: &SiteConfig, fetcher: &FetcherConfig) -> Result<Self, reqwest::Error> {
        build_http_client(&site.user_agent, fetcher).map(Self::new)
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<String, FetchFailure> {
        let response = self.client.get(url).send().await.map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| FetchFailure::Body(e.to_string()))
    }
}

fn classify_error(error: reqwest::Error) -> FetchFailure {
    if error.is_timeout() {
        FetchFailure::Timeout
    } else if error.is_connect() {
        FetchFailure::Connect(error.to_string())
    } else {
        FetchFailure::Request(error.to_string())
    }
}

/// Builds an HTTP client with proper configuration
///
/// The whole-request timeout is enforced by the fetcher; the client only
/// bounds connection setup.
///
/// # Example
///
/// ```no_run
/// use catalog_harvest::config::FetcherConfig;
/// use catalog_harvest::crawler::build_http_client;
///
/// let client = build_http_client("Mozilla/5.0", &FetcherConfig::default()).unwrap();
/// ```
pub fn build_http_client(user_agent: &str, config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(config.request_timeout_secs))
        .pool_max_idle_per_host(config.concurrency_limit as usize)
        .redirect(reqwest::redirect::Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Concurrency-bounded fetcher with retry and backoff
///
/// One `Fetcher` is shared (behind an `Arc`) by every task of every stage, so
/// its semaphore caps in-flight requests for the whole process. A permit is
/// held for one attempt only, never across a backoff sleep.
pub struct Fetcher<T = HttpTransport> {
    transport: T,
    permits: Arc<Semaphore>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl Fetcher<HttpTransport> {
    /// Creates a fetcher backed by a real HTTP client
    pub fn from_config(
        site: &SiteConfig,
        config: &FetcherConfig,
        cancel: CancellationToken,
    ) -> Result<Self, reqwest::Error> {
        let transport = HttpTransport::from_config(site, config)?;
        Ok(Self::new(
            transport,
            config.concurrency_limit as usize,
            RetryPolicy::from_config(config),
            cancel,
        ))
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn new(
        transport: T,
        concurrency_limit: usize,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            permits: Arc::new(Semaphore::new(concurrency_limit.max(1))),
            policy,
            cancel,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Number of request slots currently free
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Fetches a URL, retrying transient failures with exponential backoff
    ///
    /// Returns the body of the first successful attempt, or a `FetchError`
    /// carrying the URL, the number of attempts made and the last cause.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut last_failure = FetchFailure::Cancelled;
        let mut attempts = 0;

        for attempt in 1..=self.policy.max_attempts {
            if attempt > 1 {
                let delay = self.policy.backoff_delay(attempt - 1);
                tracing::debug!(
                    "Retrying {} in {:?} (attempt {}/{})",
                    url,
                    delay,
                    attempt,
                    self.policy.max_attempts
                );
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        return Err(self.error(url, attempts, FetchFailure::Cancelled));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            attempts = attempt;
            match self.attempt(url).await {
                Ok(body) => {
                    if attempt > 1 {
                        tracing::debug!("Fetched {} on attempt {}", url, attempt);
                    }
                    return Ok(body);
                }
                Err(failure) if failure.is_transient() => {
                    tracing::debug!("Attempt {} for {} failed: {}", attempt, url, failure);
                    last_failure = failure;
                }
                Err(failure) => return Err(self.error(url, attempt, failure)),
            }
        }

        Err(self.error(url, attempts, last_failure))
    }

    /// Performs one attempt under a semaphore permit and the attempt timeout
    async fn attempt(&self, url: &str) -> Result<String, FetchFailure> {
        if self.cancel.is_cancelled() {
            return Err(FetchFailure::Cancelled);
        }

        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(FetchFailure::Cancelled),
            permit = self.permits.acquire() => permit.map_err(|_| FetchFailure::Cancelled)?,
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FetchFailure::Cancelled),
            result = tokio::time::timeout(self.policy.attempt_timeout, self.transport.get(url)) => {
                result.unwrap_or(Err(FetchFailure::Timeout))
            }
        }
    }

    fn error(&self, url: &str, attempts: u32, cause: FetchFailure) -> FetchError {
        FetchError {
            url: url.to_string(),
            attempts,
            cause,
        }
    }
}
