//! Cross-index deduplication filter.
//!
//! Deduplication is keyed by (internal adapter id, data id). The visited-set
//! map is guarded by a single coarse lock: it is mutated on every
//! non-skippable row, so the lock is the intended contention point when
//! multiple index scans of one query share a filter instance.
//!
//! Skip rules, checked in order:
//! 1. rows whose adapter opted out of deduplication entirely pass;
//! 2. rows not declared duplicated across indexes pass when the filter is
//!    not in cross-index mode (sibling entries within one index are not
//!    duplicates of each other).
//!
//! Otherwise the data id is atomically test-and-inserted into the
//! per-adapter visited set; the row is accepted iff the insert was new.
//!
//! Visited state is scoped to one query execution and discarded with the
//! filter instance; serialization carries only the cross-index flag.

use super::{FilterKind, QueryFilter};
use crate::error::{Result, StoreError};
use crate::model::IndexModel;
use crate::row::RowEncoding;
use lattice_index::ByteKey;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Mutex;

/// Deduplicates rows by (internal adapter id, data id).
pub struct DedupeFilter {
    visited: Mutex<FxHashMap<u16, FxHashSet<ByteKey>>>,
    dedup_across_indices: bool,
}

impl DedupeFilter {
    /// A filter scoped to a single index scan.
    pub fn new() -> Self {
        DedupeFilter {
            visited: Mutex::new(FxHashMap::default()),
            dedup_across_indices: false,
        }
    }

    /// A filter shared across multiple index scans of one query.
    pub fn cross_index() -> Self {
        DedupeFilter {
            visited: Mutex::new(FxHashMap::default()),
            dedup_across_indices: true,
        }
    }

    /// Whether cross-index mode is on.
    pub fn dedup_across_indices(&self) -> bool {
        self.dedup_across_indices
    }

    /// Switch cross-index mode. Changes which rows are eligible for the
    /// check, not the check itself.
    pub fn set_dedup_across_indices(&mut self, enabled: bool) {
        self.dedup_across_indices = enabled;
    }

    /// Reconstruct from [`QueryFilter::to_binary`] output.
    pub fn from_binary(data: &[u8]) -> Result<Self> {
        match data {
            [0] => Ok(DedupeFilter::new()),
            [1] => Ok(DedupeFilter::cross_index()),
            _ => Err(StoreError::Format(
                "malformed dedupe filter blob".to_string(),
            )),
        }
    }
}

impl Default for DedupeFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryFilter for DedupeFilter {
    fn accept(&self, _model: &IndexModel, row: &RowEncoding) -> bool {
        if !row.dedup_enabled {
            // payloads that are never duplicated skip the check entirely
            return true;
        }
        if !self.dedup_across_indices && !row.duplicated {
            return true;
        }
        let mut visited = match self.visited.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        visited
            .entry(row.internal_adapter_id)
            .or_default()
            .insert(row.data_id.clone())
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Dedupe
    }

    fn to_binary(&self) -> Vec<u8> {
        vec![u8::from(self.dedup_across_indices)]
    }
}
