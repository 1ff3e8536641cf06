//! Samovar: a dual-worker recipe harvester
//!
//! This crate harvests structured recipe records from a large cooking site by
//! splitting the work between two independent processes: a link collector that
//! discovers recipe URLs from the search listing, and a fetcher that retrieves
//! and parses the discovered pages. The two sides rendezvous only through a
//! durable SQLite work queue with lease/acknowledge/retry semantics, so either
//! process can be stopped and restarted without coordination.

pub mod collector;
pub mod config;
pub mod fetcher;
pub mod normalize;
pub mod output;
pub mod queue;

use thiserror::Error;

/// Main error type for Samovar operations
#[derive(Debug, Error)]
pub enum SamovarError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Queue store error: {0}")]
    Store(#[from] queue::StoreError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Parse error for {url}: {message}")]
    Parse { url: String, message: String },

    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Samovar operations
pub type Result<T> = std::result::Result<T, SamovarError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use queue::{AckOutcome, ItemStatus, QueueItem, QueueStore, RetryPolicy, SqliteQueue};
