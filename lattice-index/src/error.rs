//! Error types for the index layer.

use crate::byte_key::ByteKey;
use thiserror::Error;

/// Index layer errors.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Malformed numeric input: non-finite coordinates, coordinates outside
    /// a dimension's declared range, or wrong arity. Rejected before any key
    /// is produced.
    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    /// A region or key does not match the strategy's dimension count.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Serialized form is corrupt or structurally invalid.
    #[error("Index format error: {0}")]
    Format(String),

    /// Serialized strategy names an id no registered strategy matches.
    #[error("Unknown index strategy: {0}")]
    UnknownStrategy(ByteKey),
}

/// Result type for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;
