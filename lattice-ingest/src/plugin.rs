//! Ingest plugin contract.

use crate::error::Result;
use lattice_index::ByteKey;
use std::path::Path;

/// One parsed record with its routing: which adapter encodes it and which
/// indexes it targets.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestRecord<T> {
    /// External identifier of the adapter that encodes the record.
    pub adapter_id: ByteKey,
    /// Identifiers of the indexes the record is written to.
    pub index_ids: Vec<ByteKey>,
    /// The domain record.
    pub record: T,
}

/// A source-format ingest plugin.
///
/// The driver calls [`supports`](Self::supports) once per candidate file
/// whose extension matches; a probe failure is logged by the plugin at info
/// level and reported as `false`, never as an error, since the file may
/// simply belong to another plugin.
pub trait IngestPlugin<T>: Send + Sync {
    /// File extensions this plugin handles (lowercase, without the dot).
    fn file_extension_filters(&self) -> &[&str];

    /// Cheap sniff: whether this plugin can parse the file.
    fn supports(&self, path: &Path) -> bool;

    /// Parse a file into zero or more routed records.
    fn to_records(&self, path: &Path) -> Result<Vec<IngestRecord<T>>>;
}
