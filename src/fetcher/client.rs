//! Retrying API client
//!
//! [`ApiClient`] pairs a [`Transport`] with a [`RetryPolicy`]. It is cheap to
//! clone, so lazy streams can own one.

use crate::config::ApiConfig;
use crate::fetcher::retry::RetryPolicy;
use crate::fetcher::transport::{ApiRequest, HttpTransport, Transport};
use crate::fetcher::{FetcherError, FetcherResult};
use serde_json::Value;
use std::sync::Arc;

/// Transport plus retry policy
pub struct ApiClient<T: Transport = HttpTransport> {
    transport: Arc<T>,
    policy: RetryPolicy,
    page_size: u32,
}

impl<T: Transport> Clone for ApiClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            policy: self.policy,
            page_size: self.page_size,
        }
    }
}

impl ApiClient<HttpTransport> {
    /// Build a reqwest-backed client from configuration
    pub fn from_config(config: &ApiConfig) -> FetcherResult<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(transport, config.retry_policy(), config.items_per_page))
    }
}

impl<T: Transport> ApiClient<T> {
    /// Create a client over any transport
    pub fn new(transport: T, policy: RetryPolicy, page_size: u32) -> Self {
        Self {
            transport: Arc::new(transport),
            policy,
            page_size: page_size.max(1),
        }
    }

    /// Retry policy in use
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Items requested per page
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// GET with retries; the body is `Value::Null` when the server sent none
    pub async fn get(&self, request: &ApiRequest) -> FetcherResult<Value> {
        let transport: &T = &self.transport;
        self.policy
            .execute(&request.path, move || transport.send(request))
            .await
    }

    /// GET a single entity; a 404 becomes `Ok(None)`
    pub async fn get_optional(&self, request: &ApiRequest) -> FetcherResult<Option<Value>> {
        match self.get(request).await {
            Ok(Value::Null) => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(FetcherError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
