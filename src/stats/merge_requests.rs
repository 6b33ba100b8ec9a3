//! Merge request flow report

use super::{bump, hours_between, mean, text_or};
use crate::NormalizedRecord;
use serde::Serialize;
use std::collections::BTreeMap;

/// Merge requests bucketed by `changes_count`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SizeDistribution {
    /// Fewer than 100 changes
    pub small: usize,
    /// 100 to 499
    pub medium: usize,
    /// 500 to 999
    pub large: usize,
    /// 1000 and more
    pub extra_large: usize,
}

impl SizeDistribution {
    fn add(&mut self, changes: i64) {
        match changes {
            c if c < 100 => self.small += 1,
            c if c < 500 => self.medium += 1,
            c if c < 1000 => self.large += 1,
            _ => self.extra_large += 1,
        }
    }
}

/// Merge request counts and lead times
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeRequestReport {
    /// Merge requests in the window
    pub total: usize,
    /// Still open
    pub opened: usize,
    /// Merged
    pub merged: usize,
    /// Closed without merge
    pub closed: usize,
    /// Mean hours from creation to merge
    pub avg_hours_to_merge: Option<f64>,
    /// Mean user notes per merge request
    pub avg_comments: f64,
    /// Merge requests per author
    pub by_author: BTreeMap<String, usize>,
    /// Size buckets
    pub size_distribution: SizeDistribution,
}

impl MergeRequestReport {
    /// Aggregate pre-filtered merge requests
    pub fn compute(records: &[&NormalizedRecord]) -> Self {
        let mut report = Self {
            total: records.len(),
            opened: 0,
            merged: 0,
            closed: 0,
            avg_hours_to_merge: None,
            avg_comments: 0.0,
            by_author: BTreeMap::new(),
            size_distribution: SizeDistribution::default(),
        };
        let mut merge_hours = Vec::new();
        let mut comments = 0i64;

        for record in records {
            match record.text("state") {
                Some("opened") => report.opened += 1,
                Some("merged") => {
                    report.merged += 1;
                    if let Some(hours) = hours_between(record, "created_at", "merged_at") {
                        merge_hours.push(hours);
                    }
                }
                Some("closed") => report.closed += 1,
                _ => {}
            }
            comments += record.int("user_notes_count").unwrap_or(0);
            bump(&mut report.by_author, text_or(record, "author", "Unknown"));
            report
                .size_distribution
                .add(record.int("changes_count").unwrap_or(0));
        }

        report.avg_hours_to_merge = mean(&merge_hours);
        if report.total > 0 {
            report.avg_comments = comments as f64 / report.total as f64;
        }
        report
    }
}
