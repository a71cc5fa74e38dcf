//! # Lattice Ingest
//!
//! Ingest plumbing for lattice: a plugin contract for turning source files
//! into (adapter, target indexes, record) triples, and a local-filesystem
//! driver that recurses over a directory, probes each candidate file against
//! the registered plugins, and hands matching files to them.
//!
//! Remote filesystems and object stores are external collaborators; only
//! the local driver ships here.

pub mod csv_points;
pub mod error;
pub mod local;
pub mod plugin;

pub use csv_points::PointCsvPlugin;
pub use error::{IngestError, Result};
pub use local::{IngestSummary, LocalFileDriver};
pub use plugin::{IngestPlugin, IngestRecord};
