//! Error types for the store layer.

use lattice_index::{ByteKey, IndexError};
use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, StoreError>;

/// Store layer errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Errors from the index strategy layer.
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// A row's embedded internal adapter id does not match the supplied
    /// adapter and no adapter store could resolve it. The row's decode is
    /// aborted, logged, never silently skipped.
    #[error("Adapter mismatch: row embeds internal id {embedded}, caller supplied {expected:?}")]
    AdapterMismatch {
        expected: Option<u16>,
        embedded: u16,
    },

    /// A codec was asked to write a field it does not recognize.
    #[error("Unsupported field: {0}")]
    UnsupportedField(ByteKey),

    /// Consumer protocol violation ("take next" without "has more").
    #[error("Consumer protocol error: {0}")]
    ConsumerProtocol(&'static str),

    /// Failure surfaced by the external store driver. No retry at this
    /// layer; retry policy belongs to the driver.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Corrupt or structurally invalid serialized row, filter, or value.
    #[error("Format error: {0}")]
    Format(String),

    /// A row builder could not produce a record.
    #[error("Builder error: {0}")]
    Builder(String),

    /// Statistics persistence failure.
    #[error("Statistics error: {0}")]
    Stats(String),
}
