//! Paginated list fetching
//!
//! Two conventions are recognized from the response body alone:
//!
//! 1. **Page-count**: an object with `current_page`, `page_size` and
//!    `total_count` next to one list-valued key (or the same numbers nested as
//!    `paging: {pageIndex, pageSize, total}`). More pages exist while
//!    `current_page * page_size < total_count`.
//! 2. **Bare list**: the body is the list itself. More pages exist while a
//!    full page came back.
//!
//! Pages are requested one after another; nothing is prefetched.

use crate::fetcher::client::ApiClient;
use crate::fetcher::transport::{ApiRequest, Transport};
use crate::fetcher::{FetcherError, FetcherResult, RecordStream};
use crate::RawRecord;
use futures_util::stream::{self, TryStreamExt};
use serde_json::{Map, Value};
use tracing::debug;

/// Page index query parameter (1-based)
pub const PAGE_PARAM: &str = "page";

/// Page size query parameter
pub const SIZE_PARAM: &str = "per_page";

/// Description of one list request, independent of the page being fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Endpoint path
    pub path: String,
    /// Query parameters sent with every page
    pub params: Vec<(String, String)>,
    /// Items per page
    pub page_size: u32,
}

impl PageRequest {
    /// List request paged with `page`/`per_page`
    pub fn new(path: impl Into<String>, params: Vec<(String, String)>, page_size: u32) -> Self {
        Self {
            path: path.into(),
            params,
            page_size: page_size.max(1),
        }
    }

    /// Concrete request for a 1-based page
    pub fn for_page(&self, page: u32) -> ApiRequest {
        let mut request = ApiRequest::new(self.path.clone());
        request.query = self.params.clone();
        request
            .param(PAGE_PARAM, page.to_string())
            .param(SIZE_PARAM, self.page_size.to_string())
    }
}

/// One decoded page
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Records on this page
    pub records: Vec<RawRecord>,
    /// Whether another page should be requested
    pub has_more: bool,
}

/// Decode a page body and decide whether to continue
pub fn parse_page(body: Value, page: u32, page_size: u32, endpoint: &str) -> FetcherResult<Page> {
    match body {
        Value::Null => Ok(Page {
            records: Vec::new(),
            has_more: false,
        }),
        Value::Array(items) => {
            let count = items.len();
            let records = into_records(items, endpoint)?;
            Ok(Page {
                records,
                has_more: count > 0 && count >= page_size as usize,
            })
        }
        Value::Object(mut map) => {
            let counters = page_counters(&map);
            let items = take_first_list(&mut map).ok_or_else(|| FetcherError::InvalidResponse {
                endpoint: endpoint.to_string(),
                message: "object response without a list of items".to_string(),
            })?;
            let count = items.len();
            let records = into_records(items, endpoint)?;
            let has_more = match counters {
                Some((current, size, total)) => count > 0 && current.saturating_mul(size) < total,
                // Wrapped list without counters behaves like a bare list
                None => count > 0 && count >= page_size as usize,
            };
            debug!(endpoint, page, counters = ?counters, "Decoded wrapped page");
            Ok(Page { records, has_more })
        }
        other => Err(FetcherError::InvalidResponse {
            endpoint: endpoint.to_string(),
            message: format!("expected a list or an object, got {}", json_kind(&other)),
        }),
    }
}

fn page_counters(map: &Map<String, Value>) -> Option<(u64, u64, u64)> {
    let top = (
        map.get("current_page").and_then(as_u64),
        map.get("page_size").and_then(as_u64),
        map.get("total_count").and_then(as_u64),
    );
    if let (Some(current), Some(size), Some(total)) = top {
        return Some((current, size, total));
    }

    let paging = map.get("paging")?.as_object()?;
    Some((
        paging.get("pageIndex").and_then(as_u64)?,
        paging.get("pageSize").and_then(as_u64)?,
        paging.get("total").and_then(as_u64)?,
    ))
}

/// Counters sometimes arrive as strings
fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn take_first_list(map: &mut Map<String, Value>) -> Option<Vec<Value>> {
    let key = map
        .iter()
        .find(|(_, v)| v.is_array())
        .map(|(k, _)| k.clone())?;
    match map.remove(&key) {
        Some(Value::Array(items)) => Some(items),
        _ => None,
    }
}

fn into_records(items: Vec<Value>, endpoint: &str) -> FetcherResult<Vec<RawRecord>> {
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(record) => Ok(record),
            other => Err(FetcherError::InvalidResponse {
                endpoint: endpoint.to_string(),
                message: format!("list item is {}, not an object", json_kind(&other)),
            }),
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

impl<T: Transport + 'static> ApiClient<T> {
    /// Lazily yield every record of a list endpoint
    ///
    /// Nothing is requested until the stream is polled. Calling this again
    /// starts over from page 1. A failing page is retried on its own by the
    /// client's retry policy.
    pub fn fetch_all(&self, request: PageRequest) -> RecordStream {
        let initial = Some((self.clone(), request, 1u32));

        let pages = stream::try_unfold(initial, |state| async move {
            let Some((client, request, page)) = state else {
                return Ok::<_, FetcherError>(None);
            };

            let body = client.get(&request.for_page(page)).await?;
            let parsed = parse_page(body, page, request.page_size, &request.path)?;
            debug!(
                endpoint = %request.path,
                page,
                records = parsed.records.len(),
                has_more = parsed.has_more,
                "Fetched page"
            );

            let next = parsed.has_more.then(|| (client, request, page + 1));
            Ok(Some((parsed.records, next)))
        });

        Box::pin(
            pages
                .map_ok(|records| stream::iter(records.into_iter().map(Ok::<_, FetcherError>)))
                .try_flatten(),
        )
    }

    /// Collect every record of a list endpoint
    pub async fn fetch_all_vec(&self, request: PageRequest) -> FetcherResult<Vec<RawRecord>> {
        self.fetch_all(request).try_collect().await
    }
}
