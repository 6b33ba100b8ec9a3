//! Bounded retry executor
//!
//! Every attempt runs under a timeout. Failures are handled per class:
//! - `Auth` is returned immediately and never retried
//! - `NotFound` is returned immediately
//! - `RateLimited` waits the server's `Retry-After`, or the base delay
//! - `Transient` waits `base_delay * 2^attempt`
//! - `Other` waits the base delay and surfaces as a connection error
//!
//! A call performs at most `max_retries + 1` attempts. Retry bookkeeping
//! lives in a [`RetryState`] local to one call.

use crate::config::{
    calculate_backoff, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_SECS, DEFAULT_TIMEOUT_SECS, MAX_BACKOFF,
};
use crate::fetcher::transport::AttemptFailure;
use crate::fetcher::{FetcherError, FetcherResult};
use crate::metrics;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Retry settings for one logical request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base delay for backoff
    pub base_delay: Duration,
    /// Upper bound for a single attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Per-call retry bookkeeping
#[derive(Debug, Default)]
pub struct RetryState {
    /// Attempts performed so far
    pub attempts: u32,
    /// Failure of the most recent attempt
    pub last_failure: Option<AttemptFailure>,
    /// Delay before the next attempt
    pub next_delay: Duration,
}

/// Log message builder for retries
#[derive(Debug, Clone)]
pub struct RetryContext<'a> {
    /// 1-based attempt that just failed
    pub attempt: u32,
    /// Total attempts allowed
    pub max_attempts: u32,
    /// Failure that triggered the retry
    pub failure: &'a AttemptFailure,
    /// Wait before the next attempt
    pub backoff: Duration,
    /// Endpoint being called
    pub endpoint: &'a str,
}

impl RetryContext<'_> {
    /// "Retrying (attempt 2/4) after server error (503) - waiting 10.0 seconds..."
    pub fn format_retry(&self) -> String {
        format!(
            "Retrying (attempt {}/{}) after {} - waiting {:.1} seconds... ({})",
            self.attempt + 1,
            self.max_attempts,
            self.failure,
            self.backoff.as_secs_f64(),
            self.endpoint
        )
    }

    /// Final failure line once the budget is spent
    pub fn format_exhausted(&self) -> String {
        format!(
            "Request to {} failed after {} attempts - last error: {}",
            self.endpoint, self.max_attempts, self.failure
        )
    }
}

impl RetryPolicy {
    /// Total attempts allowed
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before the attempt following a failed `attempt` (0-based)
    pub fn delay_for(&self, failure: &AttemptFailure, attempt: u32) -> Duration {
        match failure {
            AttemptFailure::RateLimited { retry_after } => {
                let requested = retry_after.unwrap_or(self.base_delay);
                if requested > MAX_BACKOFF {
                    warn!(
                        requested_secs = requested.as_secs(),
                        capped_secs = MAX_BACKOFF.as_secs(),
                        "Retry-After exceeds the backoff cap, waiting the cap instead"
                    );
                }
                requested.min(MAX_BACKOFF)
            }
            AttemptFailure::Transient(_) => calculate_backoff(self.base_delay, attempt),
            _ => self.base_delay,
        }
    }

    /// Run `operation` until it succeeds, fails fatally, or the budget is spent
    ///
    /// `endpoint` is used for logging and error context only.
    pub async fn execute<T, F, Fut>(&self, endpoint: &str, mut operation: F) -> FetcherResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptFailure>>,
    {
        let max_attempts = self.max_attempts();
        let mut state = RetryState::default();

        for attempt in 0..max_attempts {
            state.attempts = attempt + 1;

            let outcome = match tokio::time::timeout(self.timeout, operation()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(AttemptFailure::Transient(format!(
                    "attempt timed out after {:.1}s",
                    self.timeout.as_secs_f64()
                ))),
            };

            let failure = match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(endpoint, attempt = state.attempts, "Request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            match failure {
                AttemptFailure::Auth { status } => {
                    error!(endpoint, status, attempt = state.attempts, "Authentication failed");
                    return Err(FetcherError::Authentication {
                        endpoint: endpoint.to_string(),
                        message: failure.to_string(),
                    });
                }
                AttemptFailure::NotFound => {
                    debug!(endpoint, "Resource not found");
                    return Err(FetcherError::NotFound(endpoint.to_string()));
                }
                _ => {}
            }

            state.next_delay = self.delay_for(&failure, attempt);
            if state.attempts < max_attempts {
                let context = RetryContext {
                    attempt: state.attempts,
                    max_attempts,
                    failure: &failure,
                    backoff: state.next_delay,
                    endpoint,
                };
                warn!(
                    endpoint,
                    attempt = state.attempts,
                    max_attempts,
                    kind = failure.kind(),
                    backoff_ms = state.next_delay.as_millis() as u64,
                    "{}",
                    context.format_retry()
                );
                metrics::record_retry(failure.kind(), state.next_delay);
                state.last_failure = Some(failure);
                tokio::time::sleep(state.next_delay).await;
            } else {
                state.last_failure = Some(failure);
            }
        }

        let attempts = state.attempts;
        match state.last_failure {
            Some(failure @ AttemptFailure::RateLimited { .. }) => {
                error!(
                    endpoint,
                    attempts,
                    "{}",
                    exhausted_message(endpoint, max_attempts, &failure)
                );
                Err(FetcherError::RateLimited {
                    endpoint: endpoint.to_string(),
                    attempts,
                })
            }
            Some(failure) => {
                error!(
                    endpoint,
                    attempts,
                    "{}",
                    exhausted_message(endpoint, max_attempts, &failure)
                );
                Err(FetcherError::Connection {
                    endpoint: endpoint.to_string(),
                    attempts,
                    last_error: failure.to_string(),
                })
            }
            None => Err(FetcherError::Connection {
                endpoint: endpoint.to_string(),
                attempts,
                last_error: "no attempt was made".to_string(),
            }),
        }
    }
}

fn exhausted_message(endpoint: &str, max_attempts: u32, failure: &AttemptFailure) -> String {
    RetryContext {
        attempt: max_attempts,
        max_attempts,
        failure,
        backoff: Duration::ZERO,
        endpoint,
    }
    .format_exhausted()
}
