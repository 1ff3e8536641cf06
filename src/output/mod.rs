//! Output handling for harvested records
//!
//! Parsed recipes are buffered in memory and appended to a TSV export file
//! (with an optional line-delimited JSON mirror) in batches, so the fetcher
//! never blocks on disk per record.

mod record;
mod writer;

pub use record::RecipeRecord;
pub use writer::ResultWriter;

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
