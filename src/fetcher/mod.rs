//! API access layer
//!
//! Layers, leaf first:
//! - [`transport`] performs exactly one HTTP attempt and classifies its failure
//! - [`retry`] wraps attempts with bounded retry and backoff
//! - [`client`] pairs a transport with a retry policy
//! - [`pagination`] turns a list endpoint into a lazy record stream
//! - [`endpoints`] maps each resource type to its URLs and filter parameters
//! - [`extractor`] composes the above per resource type

use crate::RawRecord;
use futures_util::Stream;
use std::pin::Pin;

pub mod client;
pub mod endpoints;
pub mod extractor;
pub mod pagination;
pub mod retry;
pub mod transport;

pub use client::ApiClient;
pub use transport::{ApiRequest, AttemptFailure, HttpTransport, Transport};

/// Fetcher errors
///
/// Variants map one to one onto the failure taxonomy callers act on: fatal
/// configuration and authentication problems, exhausted retry budgets, and
/// per-record validation failures.
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Missing or invalid configuration, raised before any network call
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Credentials rejected by the server (never retried)
    #[error("authentication failed for {endpoint}: {message}")]
    Authentication {
        /// Endpoint that rejected the credentials
        endpoint: String,
        /// Server or transport message
        message: String,
    },

    /// Rate limit still in effect after the retry budget was spent
    #[error("rate limit exceeded for {endpoint} after {attempts} attempts")]
    RateLimited {
        /// Endpoint being called
        endpoint: String,
        /// Attempts performed
        attempts: u32,
    },

    /// Transient or unclassified failure after the retry budget was spent
    #[error("connection error for {endpoint} after {attempts} attempts: {last_error}")]
    Connection {
        /// Endpoint being called
        endpoint: String,
        /// Attempts performed
        attempts: u32,
        /// Last underlying error
        last_error: String,
    },

    /// Single-entity lookup for an id that does not exist
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Record failed required-field checks (strict mode only)
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource type name not in the catalog
    #[error("unknown resource type: {0}")]
    UnknownResource(String),

    /// Response body did not have a recognizable shape
    #[error("invalid response from {endpoint}: {message}")]
    InvalidResponse {
        /// Endpoint being called
        endpoint: String,
        /// What was wrong with the body
        message: String,
    },
}

impl FetcherError {
    /// Whether the error means the credentials or configuration must be fixed
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FetcherError::Configuration(_)
                | FetcherError::Authentication { .. }
                | FetcherError::UnknownResource(_)
        )
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Lazy stream of raw records
pub type RecordStream = Pin<Box<dyn Stream<Item = FetcherResult<RawRecord>> + Send>>;
