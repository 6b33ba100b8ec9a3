//! API configuration and retry defaults
//!
//! [`ApiConfig`] is built once per run and handed to the transport and the
//! client constructors. Nothing reads configuration from global state.

use crate::fetcher::retry::RetryPolicy;
use crate::fetcher::{FetcherError, FetcherResult};
use std::time::Duration;

/// Default per-attempt timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base retry delay in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;

/// Default page size for list endpoints.
pub const DEFAULT_ITEMS_PER_PAGE: u32 = 100;

/// Largest page size accepted by validation.
pub const MAX_ITEMS_PER_PAGE: u32 = 500;

/// Upper bound for a single backoff sleep.
/// Keeps `base * 2^attempt` finite for large attempt indices.
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Calculate exponential backoff delay: `base * 2^attempt`, capped at [`MAX_BACKOFF`]
pub fn calculate_backoff(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor)
        .unwrap_or(MAX_BACKOFF)
        .min(MAX_BACKOFF)
}

/// Optional HTTP(S) proxies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy for plain HTTP requests
    pub http: Option<String>,
    /// Proxy for HTTPS requests
    pub https: Option<String>,
}

/// Immutable connection settings for one extraction run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// API base URL, e.g. `https://gitlab.example.com/api/v4`
    pub api_url: String,
    /// Private token sent with every request
    pub private_token: String,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base delay for retries
    pub retry_delay: Duration,
    /// Page size for list endpoints
    pub items_per_page: u32,
    /// Verify TLS certificates
    pub verify_ssl: bool,
    /// Optional proxies
    pub proxy: ProxyConfig,
}

impl ApiConfig {
    /// Create a configuration with default tuning values
    pub fn new(api_url: impl Into<String>, private_token: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            private_token: private_token.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            verify_ssl: true,
            proxy: ProxyConfig::default(),
        }
    }

    /// Set the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base retry delay
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Set the page size
    pub fn with_items_per_page(mut self, items_per_page: u32) -> Self {
        self.items_per_page = items_per_page;
        self
    }

    /// Enable or disable TLS certificate verification
    pub fn with_verify_ssl(mut self, verify_ssl: bool) -> Self {
        self.verify_ssl = verify_ssl;
        self
    }

    /// Set proxies
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = proxy;
        self
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    /// Check required parameters; runs before any network I/O
    pub fn validate(&self) -> FetcherResult<()> {
        let url = self.api_url.trim();
        if url.is_empty() {
            return Err(FetcherError::Configuration(
                "api_url is required".to_string(),
            ));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(FetcherError::Configuration(format!(
                "api_url must start with http:// or https://, got '{url}'"
            )));
        }
        if self.private_token.trim().is_empty() {
            return Err(FetcherError::Configuration(
                "private_token is required".to_string(),
            ));
        }
        if self.items_per_page == 0 || self.items_per_page > MAX_ITEMS_PER_PAGE {
            return Err(FetcherError::Configuration(format!(
                "items_per_page must be between 1 and {MAX_ITEMS_PER_PAGE}, got {}",
                self.items_per_page
            )));
        }
        if self.timeout.is_zero() {
            return Err(FetcherError::Configuration(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Retry policy derived from this configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: self.retry_delay,
            timeout: self.timeout,
        }
    }
}
