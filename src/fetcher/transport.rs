//! Single-attempt HTTP transport
//!
//! A [`Transport`] performs one request and classifies any failure into an
//! [`AttemptFailure`]. It never retries; that is the executor's job.

use crate::config::ApiConfig;
use crate::fetcher::{FetcherError, FetcherResult};
use crate::metrics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Header carrying the private token
pub const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// One GET request against the API, relative to the base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// Path beginning with `/`
    pub path: String,
    /// Query parameters in order
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    /// Request without query parameters
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// Append a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Look up a query parameter
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Classification of a single failed attempt
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptFailure {
    /// 401/403: credentials rejected
    #[error("authentication failed ({status})")]
    Auth {
        /// HTTP status
        status: u16,
    },

    /// 429: server asked us to slow down
    #[error("rate limit exceeded")]
    RateLimited {
        /// Delay advertised by the server, if any
        retry_after: Option<Duration>,
    },

    /// Network fault, timeout or 5xx
    #[error("{0}")]
    Transient(String),

    /// 404
    #[error("resource not found")]
    NotFound,

    /// Anything else (unexpected 4xx, undecodable body)
    #[error("{0}")]
    Other(String),
}

impl AttemptFailure {
    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AttemptFailure::Auth { .. } => "auth",
            AttemptFailure::RateLimited { .. } => "rate_limited",
            AttemptFailure::Transient(_) => "transient",
            AttemptFailure::NotFound => "not_found",
            AttemptFailure::Other(_) => "other",
        }
    }

    fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            AttemptFailure::Transient("network timeout".to_string())
        } else if err.is_connect() {
            AttemptFailure::Transient(format!("connection failed: {err}"))
        } else if err.is_decode() {
            AttemptFailure::Other(format!("undecodable response: {err}"))
        } else {
            AttemptFailure::Transient(format!("network error: {err}"))
        }
    }
}

/// Map an HTTP status to a failure; `None` means success
pub fn classify_status(status: u16, retry_after: Option<Duration>) -> Option<AttemptFailure> {
    match status {
        200..=399 => None,
        401 | 403 => Some(AttemptFailure::Auth { status }),
        404 => Some(AttemptFailure::NotFound),
        429 => Some(AttemptFailure::RateLimited { retry_after }),
        408 => Some(AttemptFailure::Transient("request timeout (408)".to_string())),
        500..=599 => Some(AttemptFailure::Transient(format!("server error ({status})"))),
        _ => Some(AttemptFailure::Other(format!("client error ({status})"))),
    }
}

/// Parse a `Retry-After` header: delta seconds or an HTTP date
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let when = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    let delta = when.signed_duration_since(Utc::now());
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

/// Decode a successful body; an empty body is an empty result
pub fn parse_body(body: &str) -> Result<Value, AttemptFailure> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body)
        .map_err(|e| AttemptFailure::Other(format!("invalid JSON body: {e}")))
}

/// One-attempt request sender
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and return the decoded JSON body
    async fn send(&self, request: &ApiRequest) -> Result<Value, AttemptFailure>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
    base_url: String,
    private_token: String,
}

impl HttpTransport {
    /// Build a transport from validated configuration
    pub fn new(config: &ApiConfig) -> FetcherResult<Self> {
        config.validate()?;

        let mut builder = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("devops-etl/", env!("CARGO_PKG_VERSION")));

        if !config.verify_ssl {
            warn!("TLS certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(http) = &config.proxy.http {
            let proxy = reqwest::Proxy::http(http.as_str())
                .map_err(|e| FetcherError::Configuration(format!("invalid HTTP proxy: {e}")))?;
            builder = builder.proxy(proxy);
        }
        if let Some(https) = &config.proxy.https {
            let proxy = reqwest::Proxy::https(https.as_str())
                .map_err(|e| FetcherError::Configuration(format!("invalid HTTPS proxy: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| FetcherError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            private_token: config.private_token.clone(),
        })
    }

    /// Base URL requests are resolved against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<Value, AttemptFailure> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(url = %url, params = request.query.len(), "Sending GET request");

        let started = Instant::now();
        let response = match self
            .client
            .get(&url)
            .header(TOKEN_HEADER, &self.private_token)
            .query(&request.query)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                metrics::record_request(&request.path, "network_error", started.elapsed());
                return Err(AttemptFailure::from_reqwest(&e));
            }
        };

        let status = response.status().as_u16();
        metrics::record_request(&request.path, &status.to_string(), started.elapsed());

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        if let Some(failure) = classify_status(status, retry_after) {
            return Err(failure);
        }

        let body = response
            .text()
            .await
            .map_err(|e| AttemptFailure::from_reqwest(&e))?;
        parse_body(&body)
    }
}
