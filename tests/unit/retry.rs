//! Unit tests for the retry executor through the API client

use crate::support::scripted_client;
use devops_etl::fetcher::{ApiRequest, AttemptFailure};
use devops_etl::FetcherError;
use serde_json::json;
use std::time::Duration;

fn transient() -> Result<serde_json::Value, AttemptFailure> {
    Err(AttemptFailure::Transient("server error (503)".into()))
}

#[tokio::test]
async fn test_auth_failure_is_not_retried() {
    let client = scripted_client([Err(AttemptFailure::Auth { status: 401 })], 3, 100);
    let err = client.get(&ApiRequest::new("/user")).await.unwrap_err();
    assert!(matches!(err, FetcherError::Authentication { .. }));
    assert!(err.is_fatal());
    assert_eq!(client.transport().calls(), 1);
}

#[tokio::test]
async fn test_transient_failures_exhaust_budget() {
    let client = scripted_client([transient(), transient(), transient(), transient(), transient()], 3, 100);
    let err = client.get(&ApiRequest::new("/projects")).await.unwrap_err();
    match err {
        FetcherError::Connection { attempts, endpoint, .. } => {
            assert_eq!(attempts, 4);
            assert_eq!(endpoint, "/projects");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(client.transport().calls(), 4);
}

#[tokio::test]
async fn test_recovers_after_transient_failures() {
    let client = scripted_client([transient(), transient(), Ok(json!({ "version": "16.0.0" }))], 3, 100);
    let body = client.get(&ApiRequest::new("/version")).await.unwrap();
    assert_eq!(body["version"], "16.0.0");
    assert_eq!(client.transport().calls(), 3);
}

#[tokio::test]
async fn test_rate_limit_exhaustion_is_distinct() {
    let limited = || {
        Err(AttemptFailure::RateLimited {
            retry_after: Some(Duration::from_millis(1)),
        })
    };
    let client = scripted_client([limited(), limited()], 1, 100);
    let err = client.get(&ApiRequest::new("/users")).await.unwrap_err();
    assert!(matches!(err, FetcherError::RateLimited { attempts: 2, .. }));
}

#[tokio::test]
async fn test_not_found_becomes_none_for_lookups() {
    let client = scripted_client([Err(AttemptFailure::NotFound)], 3, 100);
    let found = client.get_optional(&ApiRequest::new("/users/999")).await.unwrap();
    assert_eq!(found, None);
    assert_eq!(client.transport().calls(), 1);
}

#[tokio::test]
async fn test_zero_retries_means_single_attempt() {
    let client = scripted_client([transient(), Ok(json!({}))], 0, 100);
    assert!(client.get(&ApiRequest::new("/groups")).await.is_err());
    assert_eq!(client.transport().calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_long_retry_after_waits_at_most_the_cap() {
    let client = scripted_client(
        [
            Err(AttemptFailure::RateLimited {
                retry_after: Some(Duration::from_secs(86_400)),
            }),
            Ok(json!({ "version": "16.0.0" })),
        ],
        3,
        100,
    );
    let started = tokio::time::Instant::now();
    let body = client.get(&ApiRequest::new("/version")).await.unwrap();
    assert_eq!(body["version"], "16.0.0");
    let waited = started.elapsed();
    assert!(waited >= devops_etl::config::MAX_BACKOFF);
    assert!(waited < Duration::from_secs(3_600));
    assert_eq!(client.transport().calls(), 2);
}
