//! Single-entity lookup

use super::{parse_resource, Cli, CliError};
use crate::fetcher::extractor::ResourceExtractor;
use crate::output::OutputError;
use crate::ResourceType;
use clap::Parser;

/// Get command arguments
#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Resource type
    #[arg(value_parser = parse_resource)]
    pub resource: ResourceType,

    /// Entity id (commit SHA or branch name for those resources)
    pub id: String,

    /// Project id or URL-encoded path
    #[arg(long)]
    pub project: Option<String>,
}

impl GetArgs {
    /// Execute the get command
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let config = cli.api_config()?;
        let extractor = ResourceExtractor::from_config(&config)?;
        match extractor
            .get_by_id(self.resource, &self.id, self.project.as_deref())
            .await?
        {
            Some(record) => {
                let rendered = serde_json::to_string_pretty(&record)
                    .map_err(|e| OutputError::Serialization(e.to_string()))?;
                println!("{rendered}");
            }
            None => println!("{} {} not found", self.resource, self.id),
        }
        Ok(())
    }
}
