//! Store driver contract and the in-memory reference driver.
//!
//! The sorted key-value store itself is an external collaborator: this
//! module defines only the seam the core calls. A driver serves paged range
//! scans and batched writes; rows are opaque value payloads keyed by
//! (partition key, sort key) with an embedded internal adapter id.
//!
//! Failures surface as [`StoreError::Backend`]; this layer performs no
//! retries. `MemoryStoreDriver` is the reference implementation used by
//! tests and the CLI.

use crate::error::{Result, StoreError};
use crate::row::{EncodedRow, RowKey};
use lattice_index::{ByteKey, SortKeyRange};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::RwLock;

/// One scan target: a partition and an inclusive sort-key interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowKeyRange {
    pub partition_key: ByteKey,
    pub range: SortKeyRange,
}

/// A paged feed of raw rows from one scan.
///
/// Within one partition rows arrive in the backend's key order; no ordering
/// holds across partitions.
pub trait RowFeed: Send {
    /// The next page of rows, or `None` when the feed is exhausted.
    fn next_page(&mut self) -> Result<Option<Vec<EncodedRow>>>;
}

/// The external sorted-store seam.
pub trait StoreDriver: Send + Sync {
    /// Open a paged scan over one key range.
    fn scan(&self, range: &RowKeyRange) -> Result<Box<dyn RowFeed>>;

    /// Write a batch of rows.
    fn write(&self, rows: &[EncodedRow]) -> Result<()>;
}

/// Stored entry of the in-memory driver, also the CLI's persisted row shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub partition_key: Vec<u8>,
    pub sort_key: Vec<u8>,
    pub data_id: Vec<u8>,
    pub value: Vec<u8>,
}

type MemKey = (Vec<u8>, Vec<u8>, Vec<u8>);

/// BTreeMap-backed reference driver.
///
/// Keys are (partition, sort, data id): multiple records may share one grid
/// cell, so the data id disambiguates within a cell.
pub struct MemoryStoreDriver {
    rows: RwLock<BTreeMap<MemKey, Vec<u8>>>,
    page_size: usize,
}

impl MemoryStoreDriver {
    /// Default scan page size.
    pub const DEFAULT_PAGE_SIZE: usize = 128;

    /// An empty driver.
    pub fn new() -> Self {
        MemoryStoreDriver {
            rows: RwLock::new(BTreeMap::new()),
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }

    /// An empty driver with an explicit scan page size.
    pub fn with_page_size(page_size: usize) -> Self {
        MemoryStoreDriver {
            rows: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<MemKey, Vec<u8>>> {
        match self.rows.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_guard(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<MemKey, Vec<u8>>> {
        match self.rows.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Number of stored rows.
    pub fn row_count(&self) -> usize {
        self.read().len()
    }

    /// Export every stored entry, for persistence.
    pub fn export_entries(&self) -> Vec<StoredEntry> {
        self.read()
            .iter()
            .map(|((partition, sort, data_id), value)| StoredEntry {
                partition_key: partition.clone(),
                sort_key: sort.clone(),
                data_id: data_id.clone(),
                value: value.clone(),
            })
            .collect()
    }

    /// Import entries previously exported.
    pub fn import_entries(&self, entries: Vec<StoredEntry>) {
        let mut rows = self.write_guard();
        for entry in entries {
            rows.insert(
                (entry.partition_key, entry.sort_key, entry.data_id),
                entry.value,
            );
        }
    }
}

impl Default for MemoryStoreDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreDriver for MemoryStoreDriver {
    fn scan(&self, range: &RowKeyRange) -> Result<Box<dyn RowFeed>> {
        let partition = range.partition_key.to_vec();
        let lower: MemKey = (
            partition.clone(),
            range.range.start.to_vec(),
            Vec::new(),
        );
        // the first key strictly above every (partition, end, *) entry:
        // sort keys have fixed length, so appending a byte to the end bound
        // steps past all data ids under it
        let mut end_successor = range.range.end.to_vec();
        end_successor.push(0x00);
        let upper: MemKey = (partition, end_successor, Vec::new());

        let rows = self.read();
        let mut matched = Vec::new();
        for ((p, sort, data_id), value) in
            rows.range((Bound::Included(lower), Bound::Excluded(upper)))
        {
            let key = RowKey {
                partition_key: ByteKey::new(p.clone()),
                sort_key: ByteKey::new(sort.clone()),
            };
            let row = EncodedRow::value_from_binary(key, value).map_err(|e| {
                StoreError::Backend(format!(
                    "corrupt stored row at data id {:?}: {e}",
                    ByteKey::new(data_id.clone())
                ))
            })?;
            matched.push(row);
        }

        Ok(Box::new(MemoryRowFeed {
            rows: matched,
            page_size: self.page_size,
            offset: 0,
        }))
    }

    fn write(&self, rows: &[EncodedRow]) -> Result<()> {
        let mut guard = self.write_guard();
        for row in rows {
            guard.insert(
                (
                    row.key.partition_key.to_vec(),
                    row.key.sort_key.to_vec(),
                    row.data_id.to_vec(),
                ),
                row.value_to_binary(),
            );
        }
        Ok(())
    }
}

struct MemoryRowFeed {
    rows: Vec<EncodedRow>,
    page_size: usize,
    offset: usize,
}

impl RowFeed for MemoryRowFeed {
    fn next_page(&mut self) -> Result<Option<Vec<EncodedRow>>> {
        if self.offset >= self.rows.len() {
            return Ok(None);
        }
        let end = (self.offset + self.page_size).min(self.rows.len());
        let page = self.rows[self.offset..end].to_vec();
        self.offset = end;
        Ok(Some(page))
    }
}
