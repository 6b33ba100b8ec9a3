//! CLI error types and conversions

use crate::fetcher::FetcherError;
use crate::history::HistoryError;
use crate::normalize::NormalizeError;
use crate::output::OutputError;
use crate::stats::StatsError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Fetcher error
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Normalization error
    #[error("normalization error: {0}")]
    NormalizeError(#[from] NormalizeError),

    /// History error
    #[error("history error: {0}")]
    HistoryError(#[from] HistoryError),

    /// Statistics error
    #[error("statistics error: {0}")]
    StatsError(#[from] StatsError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}
