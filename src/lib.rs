//! # DevOps ETL Library
//!
//! Incremental extraction and historization of organizational data (users,
//! groups, projects, commits, branches, issues, merge requests, pipelines,
//! project members, activity events) from a paginated, rate-limited REST API.
//!
//! ## Features
//!
//! - **Resilient API access**: bounded retry with exponential backoff, distinct
//!   handling for authentication failures, rate limits and transient faults
//! - **Pagination**: page-count and bare-list conventions behind one lazy stream
//! - **Normalization**: resource-scoped schemas with lenient date parsing
//! - **SCD Type 2 historization**: append-mostly versioned records with
//!   validity intervals, persisted between runs
//! - **Statistics**: commit, merge request, issue and pipeline reports over a
//!   closed date window
//!
//! ## Quick Start
//!
//! ```no_run
//! use devops_etl::config::ApiConfig;
//! use devops_etl::fetcher::extractor::{ExtractFilter, ResourceExtractor};
//! use devops_etl::ResourceType;
//! use futures_util::TryStreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ApiConfig::new("https://gitlab.example.com/api/v4", "glpat-xxxx");
//! let extractor = ResourceExtractor::from_config(&config)?;
//!
//! let users: Vec<_> = extractor
//!     .extract(ResourceType::Users, &ExtractFilter::default())?
//!     .try_collect()
//!     .await?;
//! println!("extracted {} users", users.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`config`] - Immutable API configuration and retry defaults
//! - [`fetcher`] - Transport, retry executor, pagination and resource extraction
//! - [`normalize`] - Raw payload to typed record conversion
//! - [`history`] - SCD Type 2 engine and its on-disk store
//! - [`stats`] - Windowed aggregation reports
//! - [`output`] - CSV and JSON writers for records and histories

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// CLI command implementations
pub mod cli;

/// API configuration
pub mod config;

/// API access: transport, retries, pagination, extraction
pub mod fetcher;

/// SCD Type 2 historization
pub mod history;

/// Observability metrics
pub mod metrics;

/// Record normalization
pub mod normalize;

/// Record writers (CSV, JSON)
pub mod output;

/// Aggregation reports
pub mod stats;

pub use config::ApiConfig;
pub use fetcher::{FetcherError, FetcherResult};
pub use history::{HistorizedRecord, ScdOptions};

/// Untyped payload for one entity as returned by the API
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Resource types that can be extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// User accounts
    Users,
    /// Groups / namespaces
    Groups,
    /// Projects (repositories)
    Projects,
    /// Commits of one project
    Commits,
    /// Branches of one project
    Branches,
    /// Issues
    Issues,
    /// Merge requests
    MergeRequests,
    /// CI pipelines of one project
    Pipelines,
    /// Members of one project, inherited memberships included
    ProjectMembers,
    /// Activity events (pushes, comments, merges)
    Events,
}

impl ResourceType {
    /// Every supported resource type
    pub const ALL: [ResourceType; 10] = [
        ResourceType::Users,
        ResourceType::Groups,
        ResourceType::Projects,
        ResourceType::Commits,
        ResourceType::Branches,
        ResourceType::Issues,
        ResourceType::MergeRequests,
        ResourceType::Pipelines,
        ResourceType::ProjectMembers,
        ResourceType::Events,
    ];

    /// Canonical snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Users => "users",
            ResourceType::Groups => "groups",
            ResourceType::Projects => "projects",
            ResourceType::Commits => "commits",
            ResourceType::Branches => "branches",
            ResourceType::Issues => "issues",
            ResourceType::MergeRequests => "merge_requests",
            ResourceType::Pipelines => "pipelines",
            ResourceType::ProjectMembers => "project_members",
            ResourceType::Events => "events",
        }
    }

    /// Fields that identify one entity across snapshots
    pub fn default_key_fields(&self) -> &'static [&'static str] {
        match self {
            // Branch names are only unique within a project
            ResourceType::Branches => &["project_id", "name"],
            // A user is a member of many projects
            ResourceType::ProjectMembers => &["project_id", "id"],
            _ => &["id"],
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "users" => Ok(ResourceType::Users),
            "groups" => Ok(ResourceType::Groups),
            "projects" => Ok(ResourceType::Projects),
            "commits" => Ok(ResourceType::Commits),
            "branches" => Ok(ResourceType::Branches),
            "issues" => Ok(ResourceType::Issues),
            "merge_requests" | "mergerequests" => Ok(ResourceType::MergeRequests),
            "pipelines" => Ok(ResourceType::Pipelines),
            "project_members" | "members" => Ok(ResourceType::ProjectMembers),
            "events" => Ok(ResourceType::Events),
            _ => Err(format!(
                "Unknown resource type: {s}. Supported: {}",
                ResourceType::ALL
                    .iter()
                    .map(|r| r.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
}

/// Typed value of one normalized field
///
/// Serialized with an explicit type tag so that a persisted history loads back
/// into exactly the same values (a timestamp never comes back as text).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Absent or unparseable value
    Null,
    /// Boolean flag
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Free text
    Text(String),
    /// Point in time (UTC)
    Timestamp(DateTime<Utc>),
    /// Calendar date without time
    Date(NaiveDate),
    /// List of scalar strings (labels, assignee names, topics)
    List(Vec<String>),
}

impl FieldValue {
    /// Whether the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Integer view (floats are truncated)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Float view
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Text view
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Timestamp view; dates are taken at midnight UTC
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            FieldValue::Date(d) => d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()),
            _ => None,
        }
    }

    /// List view
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Variant name, as used in the serialized type tag
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "int",
            FieldValue::Float(_) => "float",
            FieldValue::Text(_) => "text",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::Date(_) => "date",
            FieldValue::List(_) => "list",
        }
    }

    /// Canonical string used to build entity keys; `None` for null
    pub fn key_fragment(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Text(s) if s.is_empty() => None,
            other => Some(other.to_string()),
        }
    }

    /// Plain JSON rendering (no type tag) for export
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Int(i) => Value::from(*i),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Timestamp(ts) => Value::String(ts.to_rfc3339()),
            FieldValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            FieldValue::List(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Int(i) => write!(f, "{i}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

static NULL_FIELD: FieldValue = FieldValue::Null;

/// Typed record with a resource-specific field set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Resource type the record belongs to
    pub resource: ResourceType,
    /// Field values by name
    pub fields: BTreeMap<String, FieldValue>,
}

impl NormalizedRecord {
    /// Create an empty record
    pub fn new(resource: ResourceType) -> Self {
        Self {
            resource,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Insert or replace a field
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    /// Field value; absent fields read as [`FieldValue::Null`]
    pub fn get(&self, name: &str) -> &FieldValue {
        self.fields.get(name).unwrap_or(&NULL_FIELD)
    }

    /// Text field shortcut
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).as_str()
    }

    /// Integer field shortcut
    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).as_i64()
    }

    /// Timestamp field shortcut
    pub fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        self.get(name).as_timestamp()
    }
}
