//! Encoded rows and the decode path.
//!
//! A stored row is keyed by (partition key, sort key) and carries an opaque
//! value payload embedding the internal adapter id, the data id, the dedupe
//! flags, and the field table. Decoding splits fields into three sets:
//! index fields (consumed by the strategy), extended fields (adapter
//! specific), and unknown fields (present in the row but not recognized by
//! the current adapter schema, preserved rather than discarded so schema
//! evolution does not lose data).
//!
//! # Value wire format
//!
//! ```text
//! version: u8
//! internal_adapter_id: u16 (LE)
//! data_id: u16 (LE) length + bytes
//! flags: u8 (bit 0 = dedup_enabled, bit 1 = duplicated)
//! field_count: u16 (LE)
//! per field:
//!   field_id: u16 (LE) length + bytes
//!   value: u32 (LE) length + bytes
//! ```

use crate::adapter::{AdapterStore, DataAdapter, InternalAdapter};
use crate::error::{Result, StoreError};
use crate::field::FieldValue;
use lattice_index::ByteKey;
use rustc_hash::FxHashSet;

/// Current row value serialization version.
pub const ROW_VERSION: u8 = 1;

const FLAG_DEDUP_ENABLED: u8 = 0b01;
const FLAG_DUPLICATED: u8 = 0b10;

/// The (partition, sort) key of a stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowKey {
    pub partition_key: ByteKey,
    pub sort_key: ByteKey,
}

/// A raw stored row: key plus the embedded value payload.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRow {
    pub key: RowKey,
    /// Internal adapter id embedded for compactness; the external adapter
    /// identifier never appears in rows.
    pub internal_adapter_id: u16,
    /// The record's natural primary key within its adapter's namespace.
    pub data_id: ByteKey,
    /// Whether this row participates in deduplication at all.
    pub dedup_enabled: bool,
    /// Whether the record is written redundantly across indexes.
    pub duplicated: bool,
    /// Stored fields as (field id, encoded value bytes).
    pub fields: Vec<(ByteKey, Vec<u8>)>,
}

impl EncodedRow {
    /// Serialize the value payload (everything except the key).
    pub fn value_to_binary(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32);
        buf.push(ROW_VERSION);
        buf.extend_from_slice(&self.internal_adapter_id.to_le_bytes());
        write_short_bytes(&mut buf, self.data_id.as_bytes());
        let mut flags = 0u8;
        if self.dedup_enabled {
            flags |= FLAG_DEDUP_ENABLED;
        }
        if self.duplicated {
            flags |= FLAG_DUPLICATED;
        }
        buf.push(flags);
        buf.extend_from_slice(&(self.fields.len() as u16).to_le_bytes());
        for (field_id, value) in &self.fields {
            write_short_bytes(&mut buf, field_id.as_bytes());
            buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
            buf.extend_from_slice(value);
        }
        buf
    }

    /// Parse a value payload back into a row under `key`.
    pub fn value_from_binary(key: RowKey, data: &[u8]) -> Result<EncodedRow> {
        let mut pos = 0usize;
        let version = read_u8(data, &mut pos)?;
        if version != ROW_VERSION {
            return Err(StoreError::Format(format!(
                "unsupported row version: {version}"
            )));
        }
        let internal_adapter_id = read_u16(data, &mut pos)?;
        let data_id = ByteKey::new(read_short_bytes(data, &mut pos)?);
        let flags = read_u8(data, &mut pos)?;
        let field_count = read_u16(data, &mut pos)? as usize;
        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            let field_id = ByteKey::new(read_short_bytes(data, &mut pos)?);
            let len = read_u32(data, &mut pos)? as usize;
            ensure_len(data, pos, len)?;
            fields.push((field_id, data[pos..pos + len].to_vec()));
            pos += len;
        }
        Ok(EncodedRow {
            key,
            internal_adapter_id,
            data_id,
            dedup_enabled: flags & FLAG_DEDUP_ENABLED != 0,
            duplicated: flags & FLAG_DUPLICATED != 0,
            fields,
        })
    }
}

/// The three field sets produced by decoding one row.
///
/// Built fresh per read operation and owned exclusively by it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowFieldSet {
    /// Fields consumed by the index strategy's dimensions.
    pub index_data: Vec<(ByteKey, FieldValue)>,
    /// Adapter-specific fields, opaque to the index.
    pub extended_data: Vec<(ByteKey, FieldValue)>,
    /// Fields not recognized by the current adapter schema, preserved raw.
    pub unknown_data: Vec<(ByteKey, Vec<u8>)>,
}

impl RowFieldSet {
    /// Look up a decoded value across the index and extended sets.
    pub fn get(&self, field_id: &ByteKey) -> Option<&FieldValue> {
        self.index_data
            .iter()
            .chain(&self.extended_data)
            .find(|(id, _)| id == field_id)
            .map(|(_, v)| v)
    }

    /// All decoded (field id, value) pairs.
    pub fn decoded(&self) -> impl Iterator<Item = &(ByteKey, FieldValue)> {
        self.index_data.iter().chain(&self.extended_data)
    }
}

/// A decoded row as seen by filters and statistics: ids, dedupe flags, and
/// the decoded field sets, before record reconstruction.
#[derive(Debug, Clone)]
pub struct RowEncoding {
    pub key: RowKey,
    pub internal_adapter_id: u16,
    pub data_id: ByteKey,
    pub dedup_enabled: bool,
    pub duplicated: bool,
    pub field_set: RowFieldSet,
}

/// Resolve the adapter for a row.
///
/// The caller-supplied adapter is verified against the row's embedded
/// internal id; on mismatch the adapter store is consulted. Verification
/// happens once per row, and the returned binding is carried rather than
/// re-derived, so a registry change mid-operation cannot tear the binding.
pub fn resolve_adapter<T>(
    row: &EncodedRow,
    supplied: Option<&InternalAdapter<T>>,
    store: Option<&dyn AdapterStore<T>>,
) -> Result<InternalAdapter<T>> {
    if let Some(adapter) = supplied {
        if adapter.internal_id() == row.internal_adapter_id {
            return Ok(adapter.clone());
        }
    }
    if let Some(store) = store {
        if let Some(adapter) = store.adapter(row.internal_adapter_id) {
            return Ok(adapter);
        }
    }
    Err(StoreError::AdapterMismatch {
        expected: supplied.map(InternalAdapter::internal_id),
        embedded: row.internal_adapter_id,
    })
}

/// Decode a row's fields through an adapter into the three field sets.
///
/// A field id with no reader is preserved as an unknown raw field; a field
/// that fails its reader is a format error for the whole row.
pub fn decode_row<T>(row: &EncodedRow, adapter: &dyn DataAdapter<T>) -> Result<RowEncoding> {
    let index_native: FxHashSet<ByteKey> = adapter
        .index_field_handlers()
        .iter()
        .flat_map(|h| h.native_field_ids())
        .collect();

    let mut field_set = RowFieldSet::default();
    for (field_id, bytes) in &row.fields {
        match adapter.field_reader(field_id) {
            Some(reader) => {
                let value = reader.read(bytes)?;
                if index_native.contains(field_id) {
                    field_set.index_data.push((field_id.clone(), value));
                } else {
                    field_set.extended_data.push((field_id.clone(), value));
                }
            }
            None => field_set.unknown_data.push((field_id.clone(), bytes.clone())),
        }
    }

    Ok(RowEncoding {
        key: row.key.clone(),
        internal_adapter_id: row.internal_adapter_id,
        data_id: row.data_id.clone(),
        dedup_enabled: row.dedup_enabled,
        duplicated: row.duplicated,
        field_set,
    })
}

// ---- Binary helpers ----

fn ensure_len(data: &[u8], pos: usize, need: usize) -> Result<()> {
    if pos + need > data.len() {
        Err(StoreError::Format(format!(
            "truncated row value (need {need} bytes at offset {pos}, have {})",
            data.len()
        )))
    } else {
        Ok(())
    }
}

fn read_u8(data: &[u8], pos: &mut usize) -> Result<u8> {
    ensure_len(data, *pos, 1)?;
    let v = data[*pos];
    *pos += 1;
    Ok(v)
}

fn read_u16(data: &[u8], pos: &mut usize) -> Result<u16> {
    ensure_len(data, *pos, 2)?;
    let v = u16::from_le_bytes(data[*pos..*pos + 2].try_into().unwrap());
    *pos += 2;
    Ok(v)
}

fn read_u32(data: &[u8], pos: &mut usize) -> Result<u32> {
    ensure_len(data, *pos, 4)?;
    let v = u32::from_le_bytes(data[*pos..*pos + 4].try_into().unwrap());
    *pos += 4;
    Ok(v)
}

fn write_short_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn read_short_bytes(data: &[u8], pos: &mut usize) -> Result<Vec<u8>> {
    let len = read_u16(data, pos)? as usize;
    ensure_len(data, *pos, len)?;
    let v = data[*pos..*pos + len].to_vec();
    *pos += len;
    Ok(v)
}
