//! Record adapters: the per-type mapping between domain objects and stored
//! fields.
//!
//! An adapter converts a record into common index field values (consumed by
//! the index strategy) plus extended field values (opaque to the index), and
//! reconstructs records from decoded fields through a builder. Adapters are
//! registered once per schema load and referenced by a stable internal
//! integer id that is embedded in encoded rows for compactness; the external
//! [`ByteKey`] identifier never appears in keys.

pub mod point;

use crate::error::Result;
use crate::field::{FieldReader, FieldValue, FieldWriter};
use crate::model::{IndexModel, PrimaryIndex};
use lattice_index::{ByteKey, NumericData};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// One common index field value: the data an index dimension consumes.
///
/// A handler producing a multi-axis field (a geometry) returns one datum per
/// dimension carrying its field id, in the index's dimension order.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexValue {
    /// The common index field this value belongs to.
    pub field_id: ByteKey,
    /// Per-dimension data for the dimensions fed by this field.
    pub data: Vec<NumericData>,
}

/// Maps a record to one common index field and back to its raw stored
/// fields.
///
/// This indirection lets one logical index field fan out to multiple
/// physical stored fields (a geometry field stored as separate x and y).
pub trait IndexFieldHandler<T>: Send + Sync {
    /// The common index field this handler feeds.
    fn index_field_id(&self) -> &ByteKey;

    /// The raw stored field ids this handler produces and consumes.
    fn native_field_ids(&self) -> Vec<ByteKey>;

    /// Extract the index value from a record.
    fn to_index_value(&self, entry: &T) -> IndexValue;

    /// Convert an index value back into raw stored field values.
    fn to_native_values(&self, value: &IndexValue) -> Vec<(ByteKey, FieldValue)>;
}

/// Extracts one non-index stored field from a record.
pub trait NativeFieldHandler<T>: Send + Sync {
    /// The stored field id.
    fn field_id(&self) -> &ByteKey;

    /// The field's value for a record.
    fn field_value(&self, entry: &T) -> FieldValue;
}

/// Mutable accumulator that collects field values and produces a record.
///
/// Partial construction must succeed: callers may request only a subset of
/// fields, and a builder given some of its fields still builds.
pub trait RowBuilder<T>: Send {
    /// Set one field value.
    fn set_field(&mut self, field_id: &ByteKey, value: FieldValue);

    /// Set several field values.
    fn set_fields(&mut self, values: &[(ByteKey, FieldValue)]) {
        for (id, value) in values {
            self.set_field(id, value.clone());
        }
    }

    /// Produce the record for a data identifier.
    fn build(&mut self, data_id: &ByteKey) -> Result<T>;
}

/// Per-type record codec.
pub trait DataAdapter<T>: Send + Sync {
    /// Externally visible adapter identifier.
    fn adapter_id(&self) -> &ByteKey;

    /// A record's natural primary key within this adapter's namespace.
    fn data_id(&self, entry: &T) -> ByteKey;

    /// Cheap pre-check used to skip records this adapter cannot encode,
    /// without raising an error.
    fn is_supported(&self, entry: &T) -> bool;

    /// Whether rows of this adapter participate in deduplication at all.
    /// Payloads that are never duplicated (raster-like types) opt out.
    fn dedup_enabled(&self) -> bool {
        true
    }

    /// Whether this adapter writes records redundantly across indexes, so a
    /// cross-index dedupe scope must reconcile them. Independent of
    /// [`dedup_enabled`](Self::dedup_enabled); both flags travel on every
    /// encoded row.
    fn duplicated_across_indices(&self) -> bool {
        false
    }

    /// The handlers feeding common index fields.
    fn index_field_handlers(&self) -> &[Box<dyn IndexFieldHandler<T>>];

    /// The handlers for the adapter's own non-index fields.
    fn native_field_handlers(&self) -> &[Box<dyn NativeFieldHandler<T>>];

    /// Binary decoder for a field, `None` when the field id is not
    /// recognized (the field is then preserved as an unknown raw field).
    fn field_reader(&self, field_id: &ByteKey) -> Option<FieldReader>;

    /// Binary encoder for a field, `None` when the field id is not
    /// recognized.
    fn field_writer(&self, field_id: &ByteKey) -> Option<FieldWriter>;

    /// A fresh builder for record reconstruction.
    fn builder(&self) -> Box<dyn RowBuilder<T>>;

    /// Ordinal of a field in the canonical ordering: index dimensions first,
    /// in the index's fixed order, then this adapter's own fields in
    /// registration order. Stable for the lifetime of the schema.
    fn field_position(&self, model: &IndexModel, field_id: &ByteKey) -> Option<usize> {
        if let Some(position) = model.position_of(field_id) {
            return Some(position);
        }
        let base = model.dimension_count();
        self.native_field_handlers()
            .iter()
            .position(|h| h.field_id() == field_id)
            .map(|i| base + i)
    }

    /// Inverse of [`field_position`](Self::field_position).
    fn field_id_for_position(&self, model: &IndexModel, position: usize) -> Option<ByteKey> {
        if position < model.dimension_count() {
            return model.field_at(position).cloned();
        }
        self.native_field_handlers()
            .get(position - model.dimension_count())
            .map(|h| h.field_id().clone())
    }
}

/// An adapter that expands one logical record into multiple physical entries
/// for one index (a record decomposed into several indexable sub-shapes).
///
/// The expansion is composed in front of a generic writer (see
/// `write::IndexDependentIndexWriter`); callers never observe it.
pub trait IndexDependentAdapter<T>: DataAdapter<T> {
    /// The physical entries `entry` expands into for `index`.
    fn expand(&self, index: &PrimaryIndex, entry: &T) -> Vec<T>;
}

/// An adapter bound to its stable internal integer id.
///
/// The internal id is what encoded keys embed. Once resolved for an
/// operation it is carried, not re-derived, so a registry change mid-
/// operation cannot tear the binding.
pub struct InternalAdapter<T> {
    adapter: Arc<dyn DataAdapter<T>>,
    internal_id: u16,
}

impl<T> Clone for InternalAdapter<T> {
    fn clone(&self) -> Self {
        InternalAdapter {
            adapter: Arc::clone(&self.adapter),
            internal_id: self.internal_id,
        }
    }
}

impl<T> InternalAdapter<T> {
    /// Bind an adapter to an internal id.
    pub fn new(adapter: Arc<dyn DataAdapter<T>>, internal_id: u16) -> Self {
        InternalAdapter {
            adapter,
            internal_id,
        }
    }

    /// The stable internal id.
    pub fn internal_id(&self) -> u16 {
        self.internal_id
    }

    /// The wrapped adapter.
    pub fn adapter(&self) -> &Arc<dyn DataAdapter<T>> {
        &self.adapter
    }
}

impl<T> std::fmt::Debug for InternalAdapter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InternalAdapter")
            .field("adapter_id", self.adapter.adapter_id())
            .field("internal_id", &self.internal_id)
            .finish()
    }
}

/// Resolves internal adapter ids to adapters during decode.
pub trait AdapterStore<T>: Send + Sync {
    /// The adapter registered under an internal id, if any.
    fn adapter(&self, internal_id: u16) -> Option<InternalAdapter<T>>;
}

/// In-memory adapter registry.
pub struct InMemoryAdapterStore<T> {
    adapters: FxHashMap<u16, InternalAdapter<T>>,
}

impl<T> Default for InMemoryAdapterStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InMemoryAdapterStore<T> {
    /// An empty registry.
    pub fn new() -> Self {
        InMemoryAdapterStore {
            adapters: FxHashMap::default(),
        }
    }

    /// Register an adapter under an internal id, returning the binding.
    pub fn register(&mut self, adapter: Arc<dyn DataAdapter<T>>, internal_id: u16) -> InternalAdapter<T> {
        let bound = InternalAdapter::new(adapter, internal_id);
        self.adapters.insert(internal_id, bound.clone());
        bound
    }
}

impl<T> AdapterStore<T> for InMemoryAdapterStore<T>
where
    T: Send + Sync,
{
    fn adapter(&self, internal_id: u16) -> Option<InternalAdapter<T>> {
        self.adapters.get(&internal_id).cloned()
    }
}
