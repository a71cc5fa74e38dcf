//! # Lattice Store
//!
//! The store-facing half of lattice: record adapters, the row codec, the
//! query-filter pipeline, streaming scan consumption, index writers, and
//! scan-attached statistics, all over a pluggable sorted-store driver.
//!
//! This crate provides:
//! - [`DataAdapter`]/[`RowBuilder`]: per-type codecs between domain records
//!   and stored fields, with unknown-field preservation
//! - [`DedupeFilter`] and [`CoordinateRangeFilter`] in a short-circuit
//!   filter pipeline, each binary round-trippable for remote execution
//! - [`RowConsumer`]: bounded-queue bridge from a paged backend feed to a
//!   blocking row sequence with sentinel re-broadcast
//! - [`StatsCompositionTool`]: scoped running aggregates piggybacked onto a
//!   single scan
//! - [`BaseIndexWriter`] and the index-dependent expansion decorator
//! - [`StoreDriver`]: the external sorted-store seam, plus the in-memory
//!   reference driver
//!
//! ## Control flow
//!
//! A query region is decomposed by the index strategy into scan ranges,
//! ranges are served by the driver, raw rows stream through [`RowConsumer`],
//! each row is decoded via the matching adapter, decoded rows pass the
//! filter pipeline (dedup plus caller filters) and the optional statistics
//! observer, and accepted rows are rebuilt into records and yielded lazily.

pub mod adapter;
pub mod consumer;
pub mod driver;
pub mod error;
pub mod field;
pub mod filter;
pub mod model;
pub mod query;
pub mod row;
pub mod stats;
pub mod write;

pub use adapter::{
    AdapterStore, DataAdapter, InMemoryAdapterStore, IndexDependentAdapter, IndexFieldHandler,
    IndexValue, InternalAdapter, NativeFieldHandler, RowBuilder,
};
pub use consumer::{row_queue, RowConsumer, RowProducer, DEFAULT_QUEUE_CAPACITY};
pub use driver::{MemoryStoreDriver, RowFeed, RowKeyRange, StoreDriver, StoredEntry};
pub use error::{Result, StoreError};
pub use field::{FieldKind, FieldReader, FieldValue, FieldWriter};
pub use filter::{
    accept_all, filter_from_binary, filter_to_binary, CoordinateRangeFilter, DedupeFilter,
    FilterKind, QueryFilter,
};
pub use model::{IndexModel, PrimaryIndex};
pub use query::{execute_scan, RecordStream, ScanOptions};
pub use row::{decode_row, resolve_adapter, EncodedRow, RowEncoding, RowFieldSet, RowKey};
pub use stats::{
    numeric_range_statistics_id, CountStatistics, DataStatistics, InMemoryStatisticsStore,
    NumericRangeStatistics, StatisticsId, StatisticsProvider, StatisticsStore,
    StatsCompositionTool, COUNT_STATISTICS_ID,
};
pub use write::{BaseIndexWriter, IndexDependentIndexWriter, IndexWriter};
