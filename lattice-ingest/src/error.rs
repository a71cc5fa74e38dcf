//! Error types for ingest.

use thiserror::Error;

/// Ingest errors.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Input path missing or unreadable.
    #[error("Input error: {0}")]
    Input(String),

    /// I/O failure while walking or reading files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A plugin failed to parse a supported file.
    #[error("Parse error in {file}: {detail}")]
    Parse { file: String, detail: String },

    /// Failure writing parsed records into an index.
    #[error("Store error: {0}")]
    Store(#[from] lattice_store::StoreError),
}

/// Result type for ingest operations.
pub type Result<T> = std::result::Result<T, IngestError>;
