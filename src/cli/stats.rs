//! Stats command

use super::{parse_date, parse_resource, Cli, CliError};
use crate::fetcher::extractor::{ExtractFilter, ResourceExtractor};
use crate::normalize::normalize_batch;
use crate::stats::{self, DateWindow};
use crate::ResourceType;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

/// Extraction filter covering every entity created inside `window`
///
/// Reports place records by creation date, so an update bound would drop
/// entities created in the window but touched after it. Issues and merge
/// requests are bounded by creation on the server. Pipelines only take an
/// update floor (anything created in the window was updated after its start);
/// the report narrows them by creation date.
pub fn request_filter(resource: ResourceType, project: &str, window: &DateWindow) -> ExtractFilter {
    let filter = ExtractFilter::default().project(project);
    match resource {
        ResourceType::MergeRequests | ResourceType::Issues => filter
            .created_since(window.start)
            .created_until(window.end),
        ResourceType::Pipelines => filter.since(window.start),
        _ => filter.since(window.start).until(window.end),
    }
}

/// Stats command arguments
#[derive(Parser, Debug)]
pub struct StatsArgs {
    /// Resource type (commits, merge_requests, issues, pipelines)
    #[arg(value_parser = parse_resource)]
    pub resource: ResourceType,

    /// Project id or URL-encoded path
    #[arg(long)]
    pub project: String,

    /// First day of the window (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub from: NaiveDate,

    /// Last day of the window, inclusive (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub to: NaiveDate,

    /// Write the JSON report here instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

impl StatsArgs {
    /// Execute the stats command
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let window = DateWindow::new(self.from, self.to)?;
        if !matches!(
            self.resource,
            ResourceType::Commits | ResourceType::MergeRequests | ResourceType::Issues | ResourceType::Pipelines
        ) {
            return Err(stats::StatsError::Unsupported(self.resource).into());
        }

        let config = cli.api_config()?;
        let extractor = ResourceExtractor::from_config(&config)?;
        let filter = request_filter(self.resource, &self.project, &window);
        let raws = extractor.extract_all(self.resource, &filter).await?;
        let batch = normalize_batch(self.resource, &raws);

        let report = stats::compute(self.resource, &batch.records, &window)?;
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| crate::output::OutputError::Serialization(e.to_string()))?;

        match &self.output {
            Some(path) => {
                std::fs::write(path, format!("{rendered}\n"))
                    .map_err(|e| crate::output::OutputError::Io(format!("Failed to write report: {e}")))?;
                info!(resource = %self.resource, path = %path.display(), "Report written");
            }
            None => println!("{rendered}"),
        }
        Ok(())
    }
}
