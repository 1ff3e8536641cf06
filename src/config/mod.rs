//! Configuration module for Samovar
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files shared by the collector and fetcher processes.

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CollectorConfig, CollectorMode, Config, FetcherConfig, OutputConfig, QueueConfig, SiteConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
