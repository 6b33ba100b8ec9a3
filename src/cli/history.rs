//! History command: merge a fresh snapshot into the stored SCD2 history

use super::extract::SourceArgs;
use super::{Cli, CliError};
use crate::history::{self, HistoryStore, HistorySummary, ScdOptions};
use crate::metrics;
use crate::normalize::normalize_batch;
use crate::output::{history_row, write_rows, OutputFormat, Row};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

/// History command arguments
#[derive(Parser, Debug)]
pub struct HistoryArgs {
    /// What to extract
    #[command(flatten)]
    pub source: SourceArgs,

    /// History document to update (created when missing)
    #[arg(long)]
    pub state: PathBuf,

    /// Key fields (defaults per resource: id, or project_id,name for branches)
    #[arg(long, value_delimiter = ',')]
    pub key: Vec<String>,

    /// Only these fields open a new version when they change
    #[arg(long, value_delimiter = ',')]
    pub tracked: Vec<String>,

    /// Close current versions absent from this snapshot
    #[arg(long, default_value_t = false)]
    pub close_missing: bool,

    /// Also export every version to this file
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export format (defaults to the export file extension)
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

impl HistoryArgs {
    /// Historization settings from the arguments
    pub fn options(&self) -> ScdOptions {
        let resource = self.source.resource;
        let mut options = if self.key.is_empty() {
            ScdOptions::for_resource(resource)
        } else {
            ScdOptions::new(self.key.iter().cloned())
        };
        if !self.tracked.is_empty() {
            options = options.tracking(self.tracked.iter().cloned());
        }
        options.close_missing(self.close_missing)
    }

    /// Execute the history command
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let resource = self.source.resource;
        let options = self.options();
        if self.close_missing && (self.source.since.is_some() || self.source.author_email.is_some()) {
            warn!("--close-missing with a filtered snapshot closes every entity outside the filter");
        }

        let store = HistoryStore::new(&self.state);
        let document = store.load(resource, &options.key_fields)?;

        let raws = self.source.fetch(cli).await?;
        let batch = normalize_batch(resource, &raws);
        if !batch.rejected.is_empty() {
            warn!(
                resource = %resource,
                rejected = batch.rejected.len(),
                "Some records failed normalization and were left out of the snapshot"
            );
        }

        let now = Utc::now();
        let outcome = history::apply(document.records, &batch.records, &options, now)?;
        for rejection in &outcome.rejected {
            warn!(index = rejection.index, error = %rejection.error, "Snapshot record rejected");
        }
        if !outcome.rejected.is_empty() {
            metrics::record_rejected(resource.as_str(), outcome.rejected.len() as u64);
        }

        store.save(resource, &options.key_fields, &outcome.records)?;
        record_summary(resource.as_str(), &outcome.summary);

        if let Some(export) = &self.export {
            let rows: Vec<Row> = outcome.records.iter().map(history_row).collect();
            let format = self.format.unwrap_or_else(|| OutputFormat::from_path(export));
            write_rows(export, format, &rows)?;
        }

        info!(
            resource = %resource,
            inserted = outcome.summary.inserted,
            changed = outcome.summary.changed,
            unchanged = outcome.summary.unchanged,
            closed_missing = outcome.summary.closed_missing,
            versions = outcome.records.len(),
            "History updated"
        );
        Ok(())
    }
}

fn record_summary(resource: &str, summary: &HistorySummary) {
    metrics::record_history_versions(resource, "inserted", summary.inserted as u64);
    metrics::record_history_versions(resource, "changed", summary.changed as u64);
    metrics::record_history_versions(resource, "closed_missing", summary.closed_missing as u64);
}
