//! Observability metrics for API access, extraction and historization
//!
//! Uses the `metrics` facade. Without an installed recorder every macro is a
//! no-op; `init_metrics` installs the Prometheus exporter.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Address the exporter was installed on
static METRICS_ADDR: OnceCell<SocketAddr> = OnceCell::new();

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent: later calls are ignored once an exporter is installed.
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(existing) = METRICS_ADDR.get() {
        debug!(addr = %existing, "Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "api_requests_total",
        Unit::Count,
        "Total number of HTTP requests sent to the API"
    );
    describe_histogram!(
        "api_request_duration_seconds",
        Unit::Seconds,
        "HTTP request duration in seconds"
    );
    describe_counter!(
        "api_retries_total",
        Unit::Count,
        "Total number of retry attempts by failure kind"
    );
    describe_histogram!(
        "api_retry_backoff_seconds",
        Unit::Seconds,
        "Backoff waited before a retry"
    );
    describe_counter!(
        "records_extracted_total",
        Unit::Count,
        "Raw records extracted per resource type"
    );
    describe_counter!(
        "records_rejected_total",
        Unit::Count,
        "Records rejected during normalization or historization"
    );
    describe_counter!(
        "history_versions_total",
        Unit::Count,
        "Historized versions written by change kind"
    );

    let _ = METRICS_ADDR.set(addr);
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Check if metrics system is initialized
pub fn is_initialized() -> bool {
    METRICS_ADDR.get().is_some()
}

/// Collapse numeric path segments so labels stay low-cardinality
///
/// `/projects/42/pipelines` becomes `/projects/:id/pipelines`.
pub fn endpoint_label(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Record one HTTP request with its status and duration
pub fn record_request(path: &str, status: &str, duration: Duration) {
    let endpoint = endpoint_label(path);
    counter!(
        "api_requests_total",
        "endpoint" => endpoint.clone(),
        "status" => status.to_string(),
    )
    .increment(1);
    histogram!(
        "api_request_duration_seconds",
        "endpoint" => endpoint,
    )
    .record(duration.as_secs_f64());
}

/// Record a retry and the backoff preceding it
pub fn record_retry(kind: &'static str, backoff: Duration) {
    counter!("api_retries_total", "kind" => kind).increment(1);
    histogram!("api_retry_backoff_seconds", "kind" => kind).record(backoff.as_secs_f64());
}

/// Record records rejected for a resource
pub fn record_rejected(resource: &str, count: u64) {
    if count > 0 {
        counter!("records_rejected_total", "resource" => resource.to_string()).increment(count);
    }
}

/// Record historized versions by change kind (inserted, changed, closed)
pub fn record_history_versions(resource: &str, change: &'static str, count: u64) {
    if count > 0 {
        counter!(
            "history_versions_total",
            "resource" => resource.to_string(),
            "change" => change,
        )
        .increment(count);
    }
}

/// Extraction run metrics for one resource type
pub struct ExtractionMetrics {
    resource: String,
    start_time: Instant,
}

impl ExtractionMetrics {
    /// Start tracking an extraction
    pub fn start(resource: impl Into<String>) -> Self {
        let resource = resource.into();
        info!(resource = %resource, "Extraction started");
        Self {
            resource,
            start_time: Instant::now(),
        }
    }

    /// Record successful completion
    pub fn record_success(&self, records: u64) {
        counter!("records_extracted_total", "resource" => self.resource.clone())
            .increment(records);
        info!(
            resource = %self.resource,
            records,
            duration_ms = self.start_time.elapsed().as_millis() as u64,
            "Extraction completed"
        );
    }

    /// Record failure
    pub fn record_failure(&self, error: &str) {
        error!(
            resource = %self.resource,
            error = %error,
            duration_ms = self.start_time.elapsed().as_millis() as u64,
            "Extraction failed"
        );
    }
}
