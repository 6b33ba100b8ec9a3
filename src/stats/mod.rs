//! Windowed aggregation reports
//!
//! Pure functions over normalized records. A record is in the window when its
//! `created_at` date falls inside it; records without `created_at` are
//! counted but never bucketed by day or week.
//!
//! Missing numeric fields count as zero. Duration metrics skip records that
//! lack either end of the timestamp pair.

use crate::{NormalizedRecord, ResourceType};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

pub mod commits;
pub mod issues;
pub mod merge_requests;
pub mod pipelines;

pub use commits::CommitReport;
pub use issues::IssueReport;
pub use merge_requests::MergeRequestReport;
pub use pipelines::PipelineReport;

/// Field whose date places a record in the window
pub const ANCHOR_FIELD: &str = "created_at";

/// Stats errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatsError {
    /// Window end before start
    #[error("invalid window: {start} is after {end}")]
    InvalidWindow {
        /// Window start
        start: NaiveDate,
        /// Window end
        end: NaiveDate,
    },

    /// No report exists for this resource
    #[error("no statistics available for {0}")]
    Unsupported(ResourceType),

    /// Stream mixes resource types
    #[error("expected {expected} records, found {found}")]
    ResourceMismatch {
        /// Requested resource
        expected: ResourceType,
        /// Resource encountered
        found: ResourceType,
    },
}

/// Closed date interval `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    /// First day (inclusive)
    pub start: NaiveDate,
    /// Last day (inclusive)
    pub end: NaiveDate,
}

impl DateWindow {
    /// Validated window
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, StatsError> {
        if start > end {
            return Err(StatsError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Whether a date lies inside
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of days covered (at least 1)
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Report for one resource type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "resource", rename_all = "snake_case")]
pub enum AggregateReport {
    /// Commit activity
    Commits(CommitReport),
    /// Merge request flow
    MergeRequests(MergeRequestReport),
    /// Issue flow
    Issues(IssueReport),
    /// Pipeline health
    Pipelines(PipelineReport),
}

/// Compute the report matching `resource` over records in `window`
pub fn compute<'a, I>(resource: ResourceType, records: I, window: &DateWindow) -> Result<AggregateReport, StatsError>
where
    I: IntoIterator<Item = &'a NormalizedRecord>,
{
    let mut selected = Vec::new();
    for record in records {
        if record.resource != resource {
            return Err(StatsError::ResourceMismatch {
                expected: resource,
                found: record.resource,
            });
        }
        if in_window(record, window) {
            selected.push(record);
        }
    }

    match resource {
        ResourceType::Commits => Ok(AggregateReport::Commits(CommitReport::compute(&selected, window))),
        ResourceType::MergeRequests => Ok(AggregateReport::MergeRequests(MergeRequestReport::compute(&selected))),
        ResourceType::Issues => Ok(AggregateReport::Issues(IssueReport::compute(&selected))),
        ResourceType::Pipelines => Ok(AggregateReport::Pipelines(PipelineReport::compute(&selected))),
        other => Err(StatsError::Unsupported(other)),
    }
}

/// Records without an anchor stay in; others must fall inside the window
fn in_window(record: &NormalizedRecord, window: &DateWindow) -> bool {
    match anchor_date(record) {
        Some(date) => window.contains(date),
        None => true,
    }
}

/// UTC date of the anchor timestamp
pub fn anchor_date(record: &NormalizedRecord) -> Option<NaiveDate> {
    record.timestamp(ANCHOR_FIELD).map(|ts| ts.date_naive())
}

/// Hours between two timestamp fields, if both are present
pub fn hours_between(record: &NormalizedRecord, from: &str, to: &str) -> Option<f64> {
    let start: DateTime<Utc> = record.timestamp(from)?;
    let end: DateTime<Utc> = record.timestamp(to)?;
    Some((end - start).num_seconds() as f64 / 3600.0)
}

/// Mean of the values, `None` when empty
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Increment a named counter
pub fn bump(counts: &mut BTreeMap<String, usize>, name: &str) {
    *counts.entry(name.to_string()).or_insert(0) += 1;
}

/// Text field or a placeholder
pub fn text_or<'a>(record: &'a NormalizedRecord, field: &str, fallback: &'a str) -> &'a str {
    record.text(field).filter(|s| !s.is_empty()).unwrap_or(fallback)
}
