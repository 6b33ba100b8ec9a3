//! Resource extraction
//!
//! Composes the endpoint catalog with the paginated client. Incremental
//! bounds go to the server whenever the endpoint supports them; only the
//! remaining cases (author email, resources without a date filter, creation
//! bounds the endpoint cannot express) are filtered locally.

use crate::config::ApiConfig;
use crate::fetcher::client::ApiClient;
use crate::fetcher::endpoints::{Incremental, ProjectScope};
use crate::fetcher::pagination::PageRequest;
use crate::fetcher::transport::{ApiRequest, HttpTransport, Transport};
use crate::fetcher::{FetcherError, FetcherResult, RecordStream};
use crate::metrics::ExtractionMetrics;
use crate::normalize::dates::parse_timestamp;
use crate::normalize::schema::lookup_path;
use crate::{RawRecord, ResourceType};
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::future;
use futures_util::stream::TryStreamExt;
use serde_json::Value;
use std::str::FromStr;
use tracing::{debug, info};

/// Optional bounds and scoping for one extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractFilter {
    /// Project id or URL path (`group/project`)
    pub project_id: Option<String>,
    /// List through `/users/{user_id}/...` instead
    pub user_id: Option<String>,
    /// Incremental lower bound (inclusive, start of day UTC)
    pub updated_after: Option<NaiveDate>,
    /// Upper bound (inclusive, end of day UTC)
    pub updated_before: Option<NaiveDate>,
    /// Only entities created on or after this date
    pub created_after: Option<NaiveDate>,
    /// Only entities created on or before this date
    pub created_before: Option<NaiveDate>,
    /// Keep only commits by this author (case-insensitive)
    pub author_email: Option<String>,
    /// Additional query parameters passed through verbatim
    pub extra_params: Vec<(String, String)>,
}

impl ExtractFilter {
    /// Scope to a project
    pub fn project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Scope to one user's sub-list
    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the incremental lower bound
    pub fn since(mut self, date: NaiveDate) -> Self {
        self.updated_after = Some(date);
        self
    }

    /// Set the upper bound
    pub fn until(mut self, date: NaiveDate) -> Self {
        self.updated_before = Some(date);
        self
    }

    /// Keep entities created on or after `date`
    pub fn created_since(mut self, date: NaiveDate) -> Self {
        self.created_after = Some(date);
        self
    }

    /// Keep entities created on or before `date`
    pub fn created_until(mut self, date: NaiveDate) -> Self {
        self.created_before = Some(date);
        self
    }

    /// Filter commits by author email
    pub fn author_email(mut self, email: impl Into<String>) -> Self {
        self.author_email = Some(email.into());
        self
    }

    /// Add a pass-through query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.push((key.into(), value.into()));
        self
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc()
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(23, 59, 59).unwrap_or_default().and_utc()
}

fn format_bound(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn format_day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn set_param(params: &mut Vec<(String, String)>, key: &str, value: String) {
    params.retain(|(existing, _)| existing != key);
    params.push((key.to_string(), value));
}

/// Field compared against creation bounds the server cannot apply
const CREATED_FIELD: &str = "created_at";

/// Local checks applied to every streamed record
#[derive(Debug, Clone)]
struct LocalFilter {
    date_field: Option<&'static str>,
    after: Option<DateTime<Utc>>,
    before: Option<DateTime<Utc>>,
    created_after: Option<DateTime<Utc>>,
    created_before: Option<DateTime<Utc>>,
    author_email: Option<String>,
}

/// Undated records pass; dated ones must fall inside the bounds
fn within(
    record: &RawRecord,
    field: &str,
    after: Option<DateTime<Utc>>,
    before: Option<DateTime<Utc>>,
) -> bool {
    match lookup_path(record, field).and_then(parse_timestamp) {
        Some(ts) => !after.is_some_and(|a| ts < a) && !before.is_some_and(|b| ts > b),
        None => true,
    }
}

impl LocalFilter {
    fn is_noop(&self) -> bool {
        self.author_email.is_none()
            && (self.date_field.is_none() || (self.after.is_none() && self.before.is_none()))
            && self.created_after.is_none()
            && self.created_before.is_none()
    }

    fn keep(&self, record: &RawRecord) -> bool {
        if let Some(email) = &self.author_email {
            let matches = record
                .get("author_email")
                .and_then(Value::as_str)
                .is_some_and(|value| value.eq_ignore_ascii_case(email));
            if !matches {
                return false;
            }
        }
        // Records without a readable date cannot be proven out of range
        if let Some(field) = self.date_field {
            if !within(record, field, self.after, self.before) {
                return false;
            }
        }
        within(record, CREATED_FIELD, self.created_after, self.created_before)
    }
}

/// Extracts raw records per resource type
pub struct ResourceExtractor<T: Transport = HttpTransport> {
    client: ApiClient<T>,
}

impl ResourceExtractor<HttpTransport> {
    /// Build a reqwest-backed extractor from configuration
    pub fn from_config(config: &ApiConfig) -> FetcherResult<Self> {
        Ok(Self::new(ApiClient::from_config(config)?))
    }
}

impl<T: Transport + 'static> ResourceExtractor<T> {
    /// Wrap an existing client
    pub fn new(client: ApiClient<T>) -> Self {
        Self { client }
    }

    /// Underlying client
    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    /// Build the list request for a resource without touching the network
    pub fn list_request(&self, resource: ResourceType, filter: &ExtractFilter) -> FetcherResult<PageRequest> {
        let endpoint = resource.endpoint();
        let project_id = filter.project_id.as_deref().filter(|p| !p.trim().is_empty());
        let user_id = filter.user_id.as_deref().filter(|u| !u.trim().is_empty());
        let path = match (user_id, project_id) {
            (Some(_), Some(_)) => {
                return Err(FetcherError::Configuration(format!(
                    "{resource} listing takes a project or a user, not both"
                )))
            }
            (Some(user), None) => endpoint.user_list_path(user)?,
            (None, _) => endpoint.list_path(project_id)?,
        };

        let mut params: Vec<(String, String)> = endpoint
            .default_params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        match endpoint.incremental {
            Incremental::Server { after, before } => {
                if let Some(date) = filter.updated_after {
                    set_param(&mut params, after, format_bound(start_of_day(date)));
                }
                if let (Some(date), Some(before)) = (filter.updated_before, before) {
                    set_param(&mut params, before, format_bound(end_of_day(date)));
                }
            }
            // Exclusive day bounds: widen by one day each side
            Incremental::ServerDate { after, before } => {
                if let Some(date) = filter.updated_after.and_then(|d| d.pred_opt()) {
                    set_param(&mut params, after, format_day(date));
                }
                if let Some(date) = filter.updated_before.and_then(|d| d.succ_opt()) {
                    set_param(&mut params, before, format_day(date));
                }
            }
            Incremental::Client { .. } => {}
        }

        if let Some((after, before)) = endpoint.created_params {
            if let Some(date) = filter.created_after {
                set_param(&mut params, after, format_bound(start_of_day(date)));
            }
            if let Some(date) = filter.created_before {
                set_param(&mut params, before, format_bound(end_of_day(date)));
            }
        }

        for (key, value) in &filter.extra_params {
            set_param(&mut params, key, value.clone());
        }

        Ok(PageRequest::new(path, params, self.client.page_size()))
    }

    fn local_filter(&self, resource: ResourceType, filter: &ExtractFilter) -> LocalFilter {
        let endpoint = resource.endpoint();
        let date_field = match endpoint.incremental {
            Incremental::Client { field } => Some(field),
            Incremental::Server { .. } | Incremental::ServerDate { .. } => None,
        };
        let local_created = endpoint.created_params.is_none();
        LocalFilter {
            date_field,
            after: filter.updated_after.map(start_of_day),
            before: filter.updated_before.map(end_of_day),
            created_after: filter.created_after.filter(|_| local_created).map(start_of_day),
            created_before: filter.created_before.filter(|_| local_created).map(end_of_day),
            author_email: filter
                .author_email
                .as_ref()
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
        }
    }

    /// Lazily stream every raw record of `resource`
    ///
    /// Configuration problems (missing project id) fail here, before any
    /// request is sent.
    pub fn extract(&self, resource: ResourceType, filter: &ExtractFilter) -> FetcherResult<RecordStream> {
        let request = self.list_request(resource, filter)?;
        let local = self.local_filter(resource, filter);
        let stamp = project_stamp(resource, filter);

        info!(
            resource = %resource,
            endpoint = %request.path,
            since = ?filter.updated_after,
            until = ?filter.updated_before,
            created_since = ?filter.created_after,
            created_until = ?filter.created_before,
            "Starting extraction"
        );

        let stream = self.client.fetch_all(request).map_ok(move |mut record| {
            if let Some(project) = &stamp {
                if !record.contains_key("project_id") {
                    record.insert("project_id".to_string(), project.clone());
                }
            }
            record
        });

        if local.is_noop() {
            return Ok(Box::pin(stream));
        }
        debug!(resource = %resource, filter = ?local, "Applying local filter");
        Ok(Box::pin(
            stream.try_filter(move |record| future::ready(local.keep(record))),
        ))
    }

    /// Stream a resource given by name; unknown names fail before any I/O
    pub fn extract_named(&self, name: &str, filter: &ExtractFilter) -> FetcherResult<RecordStream> {
        let resource = ResourceType::from_str(name).map_err(FetcherError::UnknownResource)?;
        self.extract(resource, filter)
    }

    /// Collect every raw record of `resource`
    pub async fn extract_all(&self, resource: ResourceType, filter: &ExtractFilter) -> FetcherResult<Vec<RawRecord>> {
        let metrics = ExtractionMetrics::start(resource.as_str());
        let result: FetcherResult<Vec<RawRecord>> = match self.extract(resource, filter) {
            Ok(stream) => stream.try_collect().await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(records) => metrics.record_success(records.len() as u64),
            Err(e) => metrics.record_failure(&e.to_string()),
        }
        result
    }

    /// Fetch a single entity, bypassing pagination
    ///
    /// Returns `Ok(None)` when the id does not exist.
    pub async fn get_by_id(
        &self,
        resource: ResourceType,
        id: &str,
        project_id: Option<&str>,
    ) -> FetcherResult<Option<RawRecord>> {
        let path = resource.endpoint().item_path(id, project_id)?;
        let request = ApiRequest::new(path.clone());

        match self.client.get_optional(&request).await? {
            None => {
                debug!(resource = %resource, id, "Entity not found");
                Ok(None)
            }
            Some(Value::Object(mut record)) => {
                let filter = ExtractFilter {
                    project_id: project_id.map(str::to_string),
                    ..ExtractFilter::default()
                };
                if let Some(project) = project_stamp(resource, &filter) {
                    record.entry("project_id".to_string()).or_insert(project);
                }
                Ok(Some(record))
            }
            Some(_) => Err(FetcherError::InvalidResponse {
                endpoint: path,
                message: "expected an object for a single entity".to_string(),
            }),
        }
    }
}

/// Value to stamp into `project_id` for project-scoped listings
fn project_stamp(resource: ResourceType, filter: &ExtractFilter) -> Option<Value> {
    let project = filter.project_id.as_deref()?.trim();
    if project.is_empty() || resource.endpoint().scope == ProjectScope::Global {
        return None;
    }
    Some(match project.parse::<i64>() {
        Ok(id) => Value::from(id),
        Err(_) => Value::String(project.to_string()),
    })
}
