use colored::Colorize;
use std::fmt;

/// Exit codes for the CLI.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

/// Result type for CLI operations.
pub type CliResult<T> = std::result::Result<T, CliError>;

/// Unified error type for CLI operations.
#[derive(Debug)]
pub enum CliError {
    /// Store file missing, unreadable, or malformed.
    Store(String),
    /// Error from the index/store core.
    Core(lattice_store::StoreError),
    /// Error from the ingest layer.
    Ingest(lattice_ingest::IngestError),
    /// Argument / usage errors.
    Usage(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Store(msg) => write!(f, "{} {msg}", "error:".red().bold()),
            CliError::Core(e) => write!(f, "{} {e}", "error:".red().bold()),
            CliError::Ingest(e) => write!(f, "{} {e}", "error:".red().bold()),
            CliError::Usage(msg) => write!(f, "{} {msg}", "error:".red().bold()),
        }
    }
}

impl CliError {
    /// The process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => EXIT_USAGE,
            _ => EXIT_ERROR,
        }
    }
}

impl From<lattice_store::StoreError> for CliError {
    fn from(e: lattice_store::StoreError) -> Self {
        CliError::Core(e)
    }
}

impl From<lattice_ingest::IngestError> for CliError {
    fn from(e: lattice_ingest::IngestError) -> Self {
        CliError::Ingest(e)
    }
}
