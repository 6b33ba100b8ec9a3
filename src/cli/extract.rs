//! Extract command

use super::{parse_date, parse_resource, Cli, CliError};
use crate::fetcher::extractor::{ExtractFilter, ResourceExtractor};
use crate::normalize::{normalize_batch, normalize_strict};
use crate::output::{raw_row, record_row, write_rows, OutputFormat, Row};
use crate::{RawRecord, ResourceType};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

/// Arguments shared by commands that pull a resource from the API
#[derive(Parser, Debug, Clone)]
pub struct SourceArgs {
    /// Resource type (users, groups, projects, commits, branches, issues, merge_requests, pipelines,
    /// project_members, events)
    #[arg(value_parser = parse_resource)]
    pub resource: ResourceType,

    /// Project id or URL-encoded path
    #[arg(long, conflicts_with = "user")]
    pub project: Option<String>,

    /// List a user's projects, groups or events
    #[arg(long)]
    pub user: Option<String>,

    /// Only records updated on or after this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub since: Option<NaiveDate>,

    /// Only records updated on or before this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub until: Option<NaiveDate>,

    /// Only records created on or after this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub created_since: Option<NaiveDate>,

    /// Only records created on or before this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub created_until: Option<NaiveDate>,

    /// Keep only records whose author email matches (case-insensitive)
    #[arg(long)]
    pub author_email: Option<String>,
}

impl SourceArgs {
    /// Filter for the extractor
    pub fn filter(&self) -> Result<ExtractFilter, CliError> {
        if let (Some(since), Some(until)) = (self.since, self.until) {
            if since > until {
                return Err(CliError::InvalidArgument(format!(
                    "--since {since} is after --until {until}"
                )));
            }
        }
        if let (Some(since), Some(until)) = (self.created_since, self.created_until) {
            if since > until {
                return Err(CliError::InvalidArgument(format!(
                    "--created-since {since} is after --created-until {until}"
                )));
            }
        }
        let mut filter = ExtractFilter::default();
        if let Some(project) = &self.project {
            filter = filter.project(project.clone());
        }
        if let Some(user) = &self.user {
            filter = filter.user(user.clone());
        }
        if let Some(date) = self.created_since {
            filter = filter.created_since(date);
        }
        if let Some(date) = self.created_until {
            filter = filter.created_until(date);
        }
        if let Some(since) = self.since {
            filter = filter.since(since);
        }
        if let Some(until) = self.until {
            filter = filter.until(until);
        }
        if let Some(email) = &self.author_email {
            filter = filter.author_email(email.clone());
        }
        Ok(filter)
    }

    /// Pull every raw record matching the arguments
    pub async fn fetch(&self, cli: &Cli) -> Result<Vec<RawRecord>, CliError> {
        let filter = self.filter()?;
        let config = cli.api_config()?;
        let extractor = ResourceExtractor::from_config(&config)?;
        Ok(extractor.extract_all(self.resource, &filter).await?)
    }
}

/// Extract command arguments
#[derive(Parser, Debug)]
pub struct ExtractArgs {
    /// What to extract
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output file
    #[arg(long, short)]
    pub output: PathBuf,

    /// Output format (defaults to the output file extension)
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Fail on the first record that does not normalize
    #[arg(long, default_value_t = false, conflicts_with = "raw")]
    pub strict: bool,

    /// Export API payloads without normalization
    #[arg(long, default_value_t = false)]
    pub raw: bool,
}

impl ExtractArgs {
    /// Execute the extract command
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let resource = self.source.resource;
        let raws = self.source.fetch(cli).await?;

        let rows: Vec<Row> = if self.raw {
            raws.iter().map(raw_row).collect()
        } else if self.strict {
            normalize_strict(resource, &raws)?.iter().map(record_row).collect()
        } else {
            let batch = normalize_batch(resource, &raws);
            if !batch.rejected.is_empty() {
                warn!(
                    resource = %resource,
                    rejected = batch.rejected.len(),
                    "Some records failed normalization and were skipped"
                );
            }
            batch.records.iter().map(record_row).collect()
        };

        let format = self
            .format
            .unwrap_or_else(|| OutputFormat::from_path(&self.output));
        let written = write_rows(&self.output, format, &rows)?;
        info!(
            resource = %resource,
            records = written,
            path = %self.output.display(),
            "Extraction complete"
        );
        Ok(())
    }
}
