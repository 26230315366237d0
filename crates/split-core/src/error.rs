//! Error types for split-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in split-core
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// CSV writing error
    #[error("failed to write CSV: {0}")]
    CsvWrite(#[from] csv::Error),

    /// Nothing to export, or no place to export it to
    #[error("no export location available: {0}")]
    ExportTarget(String),

    /// The classifier could not be initialised; no extraction took place
    #[error("entity classifier failed to initialise: {0}")]
    ClassifierInit(String),

    /// A single classification call failed
    #[error("entity classification failed: {0}")]
    Classifier(String),

    /// An extraction job is already pending on this session
    #[error("an extraction is already in progress")]
    ExtractionInProgress,

    /// The table changed between starting and finishing an extraction
    #[error("table changed during extraction (started at revision {expected}, now {found})")]
    StaleExtraction { expected: u64, found: u64 },

    /// An extraction result arrived for a job that is no longer pending
    #[error("extraction result for job {ticket} does not belong to the pending job")]
    UnknownExtraction { ticket: u64 },

    /// Extraction requested with no rows or no selected columns
    #[error("nothing to extract: {0}")]
    NothingSelected(String),

    /// Entity lists are not aligned with the table rows
    #[error("entity lists do not match table rows: {rows} rows, {lists} lists")]
    EntityCountMismatch { rows: usize, lists: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
