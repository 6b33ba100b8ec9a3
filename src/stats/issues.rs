//! Issue flow report

use super::{bump, hours_between, mean, text_or};
use crate::NormalizedRecord;
use serde::Serialize;
use std::collections::BTreeMap;

/// Issue priority inferred from label keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    /// Label mentions "critical"
    Critical,
    /// "high" or "important"
    High,
    /// "medium" or "normal"
    Medium,
    /// "low" or "minor"
    Low,
}

impl Priority {
    /// Classify one label
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.to_lowercase();
        if label.contains("critical") {
            Some(Priority::Critical)
        } else if label.contains("high") || label.contains("important") {
            Some(Priority::High)
        } else if label.contains("medium") || label.contains("normal") {
            Some(Priority::Medium)
        } else if label.contains("low") || label.contains("minor") {
            Some(Priority::Low)
        } else {
            None
        }
    }
}

/// Issues per inferred priority; each issue counts once, at its highest priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PriorityDistribution {
    /// Critical
    pub critical: usize,
    /// High
    pub high: usize,
    /// Medium
    pub medium: usize,
    /// Low
    pub low: usize,
    /// No priority label
    pub none: usize,
}

impl PriorityDistribution {
    fn add(&mut self, priority: Option<Priority>) {
        match priority {
            Some(Priority::Critical) => self.critical += 1,
            Some(Priority::High) => self.high += 1,
            Some(Priority::Medium) => self.medium += 1,
            Some(Priority::Low) => self.low += 1,
            None => self.none += 1,
        }
    }
}

/// Issue counts and resolution times
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueReport {
    /// Issues in the window
    pub total: usize,
    /// Still open
    pub opened: usize,
    /// Closed
    pub closed: usize,
    /// Mean hours from creation to close
    pub avg_hours_to_close: Option<f64>,
    /// Issues per label
    pub by_label: BTreeMap<String, usize>,
    /// Issues per author
    pub by_author: BTreeMap<String, usize>,
    /// Issues per assignee (unassigned issues are not counted)
    pub by_assignee: BTreeMap<String, usize>,
    /// Priority buckets
    pub priority_distribution: PriorityDistribution,
}

impl IssueReport {
    /// Aggregate pre-filtered issues
    pub fn compute(records: &[&NormalizedRecord]) -> Self {
        let mut report = Self {
            total: records.len(),
            opened: 0,
            closed: 0,
            avg_hours_to_close: None,
            by_label: BTreeMap::new(),
            by_author: BTreeMap::new(),
            by_assignee: BTreeMap::new(),
            priority_distribution: PriorityDistribution::default(),
        };
        let mut close_hours = Vec::new();

        for record in records {
            match record.text("state") {
                Some("opened") => report.opened += 1,
                Some("closed") => {
                    report.closed += 1;
                    if let Some(hours) = hours_between(record, "created_at", "closed_at") {
                        close_hours.push(hours);
                    }
                }
                _ => {}
            }

            let labels = record.get("labels").as_list().unwrap_or_default();
            for label in labels {
                bump(&mut report.by_label, label);
            }
            let priority = labels.iter().filter_map(|l| Priority::from_label(l)).min();
            report.priority_distribution.add(priority);

            bump(&mut report.by_author, text_or(record, "author", "Unknown"));
            for assignee in record.get("assignees").as_list().unwrap_or_default() {
                bump(&mut report.by_assignee, assignee);
            }
        }

        report.avg_hours_to_close = mean(&close_hours);
        report
    }
}
