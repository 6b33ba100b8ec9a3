//! Pipeline health report

use super::{anchor_date, bump, mean, text_or};
use crate::NormalizedRecord;
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// Pipelines started in one week
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WeeklyPipelines {
    /// All pipelines
    pub total: usize,
    /// Succeeded
    pub success: usize,
    /// Failed
    pub failed: usize,
    /// Any other status
    pub other: usize,
}

/// Pipeline outcomes and durations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    /// Pipelines in the window
    pub total: usize,
    /// Pipelines per status
    pub status_distribution: BTreeMap<String, usize>,
    /// `success / (success + failed)`; `None` without terminal outcomes
    pub success_rate: Option<f64>,
    /// Mean duration of succeeded or failed pipelines with a known duration
    pub avg_duration_secs: Option<f64>,
    /// Pipelines per ref
    pub by_ref: BTreeMap<String, usize>,
    /// Pipelines per week, keyed by the Monday starting it
    pub weekly_distribution: BTreeMap<NaiveDate, WeeklyPipelines>,
}

/// Monday of the week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Seconds from the `duration` field, else from `started_at`/`finished_at`
fn duration_secs(record: &NormalizedRecord) -> Option<f64> {
    if let Some(duration) = record.get("duration").as_f64() {
        return Some(duration);
    }
    let started = record.timestamp("started_at")?;
    let finished = record.timestamp("finished_at")?;
    Some((finished - started).num_milliseconds() as f64 / 1000.0)
}

impl PipelineReport {
    /// Aggregate pre-filtered pipelines
    pub fn compute(records: &[&NormalizedRecord]) -> Self {
        let mut status_distribution = BTreeMap::new();
        let mut by_ref = BTreeMap::new();
        let mut weekly_distribution: BTreeMap<NaiveDate, WeeklyPipelines> = BTreeMap::new();
        let mut durations = Vec::new();
        let (mut success, mut failed) = (0usize, 0usize);

        for record in records {
            let status = text_or(record, "status", "unknown");
            bump(&mut status_distribution, status);
            bump(&mut by_ref, text_or(record, "ref", "unknown"));

            let terminal = matches!(status, "success" | "failed");
            match status {
                "success" => success += 1,
                "failed" => failed += 1,
                _ => {}
            }
            if terminal {
                if let Some(secs) = duration_secs(record) {
                    durations.push(secs);
                }
            }

            if let Some(day) = anchor_date(record) {
                let week = weekly_distribution.entry(week_start(day)).or_default();
                week.total += 1;
                match status {
                    "success" => week.success += 1,
                    "failed" => week.failed += 1,
                    _ => week.other += 1,
                }
            }
        }

        let terminal = success + failed;
        Self {
            total: records.len(),
            status_distribution,
            success_rate: (terminal > 0).then(|| success as f64 / terminal as f64),
            avg_duration_secs: mean(&durations),
            by_ref,
            weekly_distribution,
        }
    }
}
