//! # Lattice Index
//!
//! Core index machinery for lattice: maps multi-dimensional numeric regions
//! onto sortable binary keys and decomposes query regions into contiguous
//! key-range scans against a sorted key-value store.
//!
//! This crate provides:
//! - [`ByteKey`]: the byte-lexicographic identifier/key value type
//! - Numeric dimensions with uniform binning ([`DimensionDefinition`])
//! - Multi-dimensional regions ([`Region`])
//! - The [`NumericIndexStrategy`] contract and the row-major
//!   [`GridIndexStrategy`] implementation
//! - A self-describing binary codec for strategies so readers constructed
//!   later reproduce identical encodings
//!
//! ## Design Principles
//!
//! 1. **Keys sort like coordinates**: bin indices are encoded big-endian so
//!    byte order equals numeric order within a partition
//! 2. **Over-approximate, never under**: range decomposition may scan more
//!    than the query region, never less
//! 3. **Deterministic**: identical input and identical strategy configuration
//!    produce identical keys, so re-insertion is idempotent

pub mod byte_key;
pub mod coordinate;
pub mod dimension;
pub mod error;
pub mod region;
pub mod strategy;

pub use byte_key::ByteKey;
pub use coordinate::BinRange;
pub use dimension::{DimensionDefinition, NumericData};
pub use error::{IndexError, Result};
pub use region::Region;
pub use strategy::{
    strategy_from_binary, GridIndexStrategy, InsertionIds, NumericIndexStrategy,
    PartitionQueryRanges, QueryRanges, SinglePartitionInsertionIds, SortKeyRange,
};
