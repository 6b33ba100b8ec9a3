//! CLI command implementations
//!
//! Connection settings are global flags, each with an environment fallback,
//! so a configured shell only needs `devops-etl extract users -o users.csv`.

use crate::config::{
    ApiConfig, ProxyConfig, DEFAULT_ITEMS_PER_PAGE, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_SECS,
    DEFAULT_TIMEOUT_SECS,
};
use crate::ResourceType;
use chrono::{DateTime, NaiveDate};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::time::Duration;

pub mod error;
pub mod extract;
pub mod get;
pub mod history;
pub mod stats;
pub mod validate;

pub use error::CliError;
pub use extract::ExtractArgs;
pub use get::GetArgs;
pub use history::HistoryArgs;
pub use stats::StatsArgs;
pub use validate::ValidateCommand;

/// Extract, historize and summarize DevOps platform data
#[derive(Parser, Debug)]
#[command(name = "devops-etl", version, about)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// API base URL, e.g. https://gitlab.example.com/api/v4
    #[arg(long, global = true, env = "GITLAB_API_URL")]
    pub api_url: Option<String>,

    /// Access token sent as PRIVATE-TOKEN
    #[arg(long, global = true, env = "GITLAB_PRIVATE_TOKEN", hide_env_values = true)]
    pub private_token: Option<String>,

    /// Per-attempt timeout in seconds
    #[arg(long, global = true, env = "GITLAB_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Maximum number of retries for failed requests (range: 0-20)
    #[arg(
        long,
        global = true,
        env = "GITLAB_MAX_RETRIES",
        default_value_t = DEFAULT_MAX_RETRIES,
        value_parser = clap::value_parser!(u32).range(0..=20)
    )]
    pub max_retries: u32,

    /// Base retry delay in seconds
    #[arg(long, global = true, env = "GITLAB_RETRY_DELAY", default_value_t = DEFAULT_RETRY_DELAY_SECS)]
    pub retry_delay_secs: u64,

    /// Page size requested from list endpoints
    #[arg(long, global = true, env = "GITLAB_ITEMS_PER_PAGE", default_value_t = DEFAULT_ITEMS_PER_PAGE)]
    pub items_per_page: u32,

    /// Skip TLS certificate verification
    #[arg(long, global = true, env = "GITLAB_INSECURE", default_value_t = false)]
    pub insecure: bool,

    /// Proxy for plain HTTP requests
    #[arg(long, global = true, env = "GITLAB_HTTP_PROXY")]
    pub http_proxy: Option<String>,

    /// Proxy for HTTPS requests
    #[arg(long, global = true, env = "GITLAB_HTTPS_PROXY")]
    pub https_proxy: Option<String>,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long, global = true, env = "DEVOPS_ETL_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract one resource type to a CSV or JSON file
    Extract(ExtractArgs),

    /// Merge a fresh snapshot into a stored SCD2 history
    History(HistoryArgs),

    /// Compute an aggregate report over a date window
    Stats(StatsArgs),

    /// Fetch a single entity by id
    Get(GetArgs),

    /// Check configuration and API connectivity
    Validate(ValidateCommand),
}

impl Cli {
    /// Build the API configuration from flags and environment
    pub fn api_config(&self) -> Result<ApiConfig, CliError> {
        let api_url = self
            .api_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                CliError::ConfigurationError("API URL is required (--api-url or GITLAB_API_URL)".to_string())
            })?;
        let token = self
            .private_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                CliError::ConfigurationError(
                    "access token is required (--private-token or GITLAB_PRIVATE_TOKEN)".to_string(),
                )
            })?;

        let config = ApiConfig::new(api_url, token)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_max_retries(self.max_retries)
            .with_retry_delay(Duration::from_secs(self.retry_delay_secs))
            .with_items_per_page(self.items_per_page)
            .with_verify_ssl(!self.insecure)
            .with_proxy(ProxyConfig {
                http: self.http_proxy.clone(),
                https: self.https_proxy.clone(),
            });
        config.validate()?;
        Ok(config)
    }

    /// Run the selected command
    pub async fn execute(&self) -> Result<(), CliError> {
        match &self.command {
            Commands::Extract(args) => args.execute(self).await,
            Commands::History(args) => args.execute(self).await,
            Commands::Stats(args) => args.execute(self).await,
            Commands::Get(args) => args.execute(self).await,
            Commands::Validate(cmd) => cmd.execute(self).await,
        }
    }
}

/// Parse a resource name for clap
pub fn parse_resource(input: &str) -> Result<ResourceType, String> {
    input.parse()
}

/// Parse a date from YYYY-MM-DD or an RFC 3339 datetime (its UTC date is used)
pub fn parse_date(input: &str) -> Result<NaiveDate, String> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.naive_utc().date())
        .map_err(|_| format!("'{input}' is not a date (expected YYYY-MM-DD)"))
}
