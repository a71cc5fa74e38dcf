//! Index writers.
//!
//! `BaseIndexWriter` encodes records through their adapter and index
//! strategy and batches rows to the store driver. The index-dependent
//! decorator composes the one-record-to-many expansion in front of any
//! writer: it writes each expanded record through the wrapped writer and
//! unions the insertion ids, so the original caller never observes the
//! expansion.

use crate::adapter::{DataAdapter, IndexDependentAdapter, InternalAdapter};
use crate::driver::StoreDriver;
use crate::error::{Result, StoreError};
use crate::model::PrimaryIndex;
use crate::row::{EncodedRow, RowKey};
use lattice_index::{ByteKey, InsertionIds, NumericIndexStrategy, Region};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{debug, error};

/// Writes records into one index.
pub trait IndexWriter<T> {
    /// Write one record, returning every (partition, sort) pair it was
    /// stored under.
    fn write(&mut self, entry: &T) -> Result<InsertionIds>;

    /// Push pending rows to the driver.
    fn flush(&mut self) -> Result<()>;

    /// Flush and release the writer.
    fn close(&mut self) -> Result<()>;

    /// The index written to.
    fn index(&self) -> &PrimaryIndex;
}

/// Encode one record into its insertion ids and stored rows.
pub(crate) fn encode_record<T>(
    adapter: &InternalAdapter<T>,
    index: &PrimaryIndex,
    entry: &T,
) -> Result<(InsertionIds, Vec<EncodedRow>)> {
    let codec = adapter.adapter();

    // one index value per handler, then one datum per dimension in model
    // order, consuming a shared field's data in dimension order
    let index_values: Vec<_> = codec
        .index_field_handlers()
        .iter()
        .map(|h| h.to_index_value(entry))
        .collect();

    let model = index.model();
    let mut cursors: FxHashMap<ByteKey, usize> = FxHashMap::default();
    let mut data = Vec::with_capacity(model.dimension_count());
    for dim_field in model.dimension_fields() {
        let value = index_values
            .iter()
            .find(|v| &v.field_id == dim_field)
            .ok_or_else(|| StoreError::UnsupportedField(dim_field.clone()))?;
        let cursor = cursors.entry(dim_field.clone()).or_insert(0);
        let datum = value.data.get(*cursor).copied().ok_or_else(|| {
            StoreError::Format(format!(
                "index field {dim_field} supplies {} data for more dimensions",
                value.data.len()
            ))
        })?;
        *cursor += 1;
        data.push(datum);
    }
    let region = Region::new(data);
    let ids = index.strategy().insertion_ids(&region)?;

    // stored field table: index natives first, then the adapter's own fields
    let mut fields = Vec::new();
    for (handler, value) in codec.index_field_handlers().iter().zip(&index_values) {
        for (field_id, field_value) in handler.to_native_values(value) {
            let writer = codec
                .field_writer(&field_id)
                .ok_or_else(|| StoreError::UnsupportedField(field_id.clone()))?;
            fields.push((field_id, writer.write(&field_value)?));
        }
    }
    for handler in codec.native_field_handlers() {
        let field_id = handler.field_id().clone();
        let writer = codec
            .field_writer(&field_id)
            .ok_or_else(|| StoreError::UnsupportedField(field_id.clone()))?;
        fields.push((field_id, writer.write(&handler.field_value(entry))?));
    }

    let data_id = codec.data_id(entry);
    let rows = ids
        .iter()
        .map(|(partition, sort)| EncodedRow {
            key: RowKey {
                partition_key: partition.clone(),
                sort_key: sort.clone(),
            },
            internal_adapter_id: adapter.internal_id(),
            data_id: data_id.clone(),
            dedup_enabled: codec.dedup_enabled(),
            duplicated: codec.duplicated_across_indices(),
            fields: fields.clone(),
        })
        .collect();
    Ok((ids, rows))
}

/// Writer encoding records through an adapter into one index.
pub struct BaseIndexWriter<T> {
    adapter: InternalAdapter<T>,
    index: PrimaryIndex,
    driver: Arc<dyn StoreDriver>,
    pending: Vec<EncodedRow>,
    batch_size: usize,
}

impl<T> BaseIndexWriter<T> {
    /// Default row batch size before an automatic flush.
    pub const DEFAULT_BATCH_SIZE: usize = 256;

    /// Create a writer.
    pub fn new(
        adapter: InternalAdapter<T>,
        index: PrimaryIndex,
        driver: Arc<dyn StoreDriver>,
    ) -> Self {
        BaseIndexWriter {
            adapter,
            index,
            driver,
            pending: Vec::new(),
            batch_size: Self::DEFAULT_BATCH_SIZE,
        }
    }

    /// Override the automatic flush threshold.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

impl<T> IndexWriter<T> for BaseIndexWriter<T> {
    fn write(&mut self, entry: &T) -> Result<InsertionIds> {
        if !self.adapter.adapter().is_supported(entry) {
            debug!(
                adapter = %self.adapter.adapter().adapter_id(),
                "skipping unsupported record"
            );
            return Ok(InsertionIds::empty());
        }
        let (ids, rows) = encode_record(&self.adapter, &self.index, entry)?;
        self.pending.extend(rows);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(ids)
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.driver.write(&self.pending)?;
        self.pending.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.flush()
    }

    fn index(&self) -> &PrimaryIndex {
        &self.index
    }
}

impl<T> Drop for BaseIndexWriter<T> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            if let Err(e) = self.flush() {
                error!(
                    index = %self.index.id(),
                    error = %e,
                    "failed to flush pending rows on writer drop"
                );
            }
        }
    }
}

/// Decorating writer for index-dependent adapters.
///
/// Expands one logical record into its physical entries, writes each through
/// the wrapped writer, and returns the unioned insertion ids.
pub struct IndexDependentIndexWriter<T, W> {
    adapter: Arc<dyn IndexDependentAdapter<T>>,
    inner: W,
}

impl<T, W: IndexWriter<T>> IndexDependentIndexWriter<T, W> {
    /// Wrap a writer with an expanding adapter.
    pub fn new(adapter: Arc<dyn IndexDependentAdapter<T>>, inner: W) -> Self {
        IndexDependentIndexWriter { adapter, inner }
    }
}

impl<T, W: IndexWriter<T>> IndexWriter<T> for IndexDependentIndexWriter<T, W> {
    fn write(&mut self, entry: &T) -> Result<InsertionIds> {
        let mut ids = InsertionIds::empty();
        for expanded in self.adapter.expand(self.inner.index(), entry) {
            ids = ids.union(self.inner.write(&expanded)?);
        }
        Ok(ids)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    fn index(&self) -> &PrimaryIndex {
        self.inner.index()
    }
}
