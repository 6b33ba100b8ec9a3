//! Commit activity report

use super::{anchor_date, bump, text_or, DateWindow};
use crate::NormalizedRecord;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Commit counts and line totals over a window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitReport {
    /// Commits in the window
    pub total: usize,
    /// Commits per author name
    pub by_author: BTreeMap<String, usize>,
    /// Commits per day (only commits with a date)
    pub daily_activity: BTreeMap<NaiveDate, usize>,
    /// `total` spread over every day of the window
    pub avg_commits_per_day: f64,
    /// Lines added
    pub additions: i64,
    /// Lines deleted
    pub deletions: i64,
    /// `additions + deletions`
    pub total_lines: i64,
}

impl CommitReport {
    /// Aggregate pre-filtered commits
    pub fn compute(records: &[&NormalizedRecord], window: &DateWindow) -> Self {
        let mut by_author = BTreeMap::new();
        let mut daily_activity = BTreeMap::new();
        let mut additions = 0i64;
        let mut deletions = 0i64;

        for record in records {
            bump(&mut by_author, text_or(record, "author_name", "Unknown"));
            if let Some(day) = anchor_date(record) {
                *daily_activity.entry(day).or_insert(0) += 1;
            }
            additions += record.int("additions").unwrap_or(0);
            deletions += record.int("deletions").unwrap_or(0);
        }

        let total = records.len();
        Self {
            total,
            by_author,
            daily_activity,
            avg_commits_per_day: total as f64 / window.days() as f64,
            additions,
            deletions,
            total_lines: additions + deletions,
        }
    }
}
