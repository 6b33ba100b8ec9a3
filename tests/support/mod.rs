//! Shared test doubles: a scripted in-memory transport and payload builders

#![allow(dead_code)]

use async_trait::async_trait;
use devops_etl::fetcher::retry::RetryPolicy;
use devops_etl::fetcher::{ApiClient, ApiRequest, AttemptFailure, Transport};
use devops_etl::RawRecord;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Replies from a fixed script, in order, and records every request
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<Value, AttemptFailure>>>,
    seen: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new(script: impl IntoIterator<Item = Result<Value, AttemptFailure>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// Requested page numbers, in order
    pub fn pages(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|r| r.query_value("page").map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<Value, AttemptFailure> {
        self.seen.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AttemptFailure::Other("script exhausted".into())))
    }
}

/// Retry policy with millisecond delays
pub fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(1),
        timeout: Duration::from_secs(5),
    }
}

pub fn scripted_client(
    script: impl IntoIterator<Item = Result<Value, AttemptFailure>>,
    max_retries: u32,
    page_size: u32,
) -> ApiClient<ScriptedTransport> {
    ApiClient::new(ScriptedTransport::new(script), fast_policy(max_retries), page_size)
}

pub fn user(id: i64) -> Value {
    json!({
        "id": id,
        "username": format!("user{id}"),
        "name": format!("User {id}"),
        "email": format!("user{id}@example.com"),
        "state": "active",
        "created_at": "2024-01-15T10:00:00.000Z",
    })
}

/// Bare-list page of users `start..start+count`
pub fn users_page(start: i64, count: i64) -> Value {
    Value::Array((start..start + count).map(user).collect())
}

pub fn as_raw(value: Value) -> RawRecord {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}
