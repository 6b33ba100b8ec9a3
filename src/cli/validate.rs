//! Validate command: configuration and connectivity check

use super::{Cli, CliError};
use crate::fetcher::{ApiClient, ApiRequest};
use clap::Parser;
use serde_json::Value;
use tracing::info;

/// Validate command arguments
#[derive(Parser, Debug)]
pub struct ValidateCommand {
    /// Only check configuration, do not contact the API
    #[arg(long, default_value_t = false)]
    pub offline: bool,
}

fn field<'a>(body: &'a Value, name: &str) -> &'a str {
    body.get(name).and_then(Value::as_str).unwrap_or("unknown")
}

impl ValidateCommand {
    /// Execute validation
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let config = cli.api_config()?;
        println!("Configuration valid: {}", config.base_url());
        if self.offline {
            return Ok(());
        }

        let client = ApiClient::from_config(&config)?;
        let version = client.get(&ApiRequest::new("/version")).await?;
        println!("Server version: {}", field(&version, "version"));

        let user = client.get(&ApiRequest::new("/user")).await?;
        println!("Authenticated as: {}", field(&user, "username"));

        info!(
            api_url = %config.base_url(),
            version = field(&version, "version"),
            "Connection validated"
        );
        Ok(())
    }
}
