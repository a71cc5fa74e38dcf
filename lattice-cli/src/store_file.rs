//! JSON store files.
//!
//! The CLI operates on a self-contained store file: index definitions
//! (serialized strategies), adapter bindings with their index mappings,
//! the raw rows, and the persisted statistics. Real backend drivers plug in
//! behind `StoreDriver`; the file format is CLI glue and lives here, not in
//! the core.

use crate::error::{CliError, CliResult};
use lattice_index::ByteKey;
use lattice_store::adapter::point::{PointAdapter, PointRecord, POINT_ADAPTER_ID};
use lattice_store::{
    InMemoryAdapterStore, InMemoryStatisticsStore, InternalAdapter, MemoryStoreDriver,
    PrimaryIndex, StatisticsStore, StoredEntry,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreFile {
    pub indices: Vec<IndexEntry>,
    pub adapters: Vec<AdapterEntry>,
    #[serde(default)]
    pub rows: Vec<RowEntry>,
    #[serde(default)]
    pub statistics: Vec<StatisticsEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    /// Hex-encoded serialized index (identifier + strategy configuration).
    pub index: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdapterEntry {
    pub adapter_id: String,
    pub internal_id: u16,
    /// Identifiers of the indexes this adapter writes to.
    pub index_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RowEntry {
    pub partition: String,
    pub sort: String,
    pub data_id: String,
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatisticsEntry {
    pub internal_id: u16,
    pub statistics_id: String,
    pub value: String,
}

/// A store file loaded into runnable form.
pub struct OpenStore {
    pub driver: Arc<MemoryStoreDriver>,
    pub indices: Vec<PrimaryIndex>,
    pub adapters: Vec<(InternalAdapter<PointRecord>, Vec<ByteKey>)>,
    pub adapter_store: Arc<InMemoryAdapterStore<PointRecord>>,
    pub statistics: Arc<InMemoryStatisticsStore>,
}

impl OpenStore {
    /// The index registered under `id`.
    pub fn index(&self, id: &ByteKey) -> Option<&PrimaryIndex> {
        self.indices.iter().find(|i| i.id() == id)
    }
}

impl StoreFile {
    /// Read and parse a store file.
    pub fn load(path: &Path) -> CliResult<StoreFile> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::Store(format!("cannot read store file '{}': {e}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            CliError::Store(format!("malformed store file '{}': {e}", path.display()))
        })
    }

    /// Serialize and write a store file.
    pub fn save(&self, path: &Path) -> CliResult<()> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            CliError::Store(format!("cannot serialize store file: {e}"))
        })?;
        std::fs::write(path, content).map_err(|e| {
            CliError::Store(format!("cannot write store file '{}': {e}", path.display()))
        })
    }

    /// Instantiate the drivers, indexes, adapters, and statistics the file
    /// describes.
    pub fn open(&self) -> CliResult<OpenStore> {
        let mut indices = Vec::with_capacity(self.indices.len());
        for entry in &self.indices {
            let bytes = decode_hex(&entry.index)
                .ok_or_else(|| CliError::Store(format!("index '{}': bad hex", entry.id)))?;
            let index = PrimaryIndex::from_binary(&bytes)
                .map_err(|e| CliError::Store(format!("index '{}': {e}", entry.id)))?;
            indices.push(index);
        }

        let mut adapters = Vec::with_capacity(self.adapters.len());
        let mut adapter_store = InMemoryAdapterStore::new();
        for entry in &self.adapters {
            // the point adapter is the only record type the CLI knows
            if entry.adapter_id != POINT_ADAPTER_ID {
                return Err(CliError::Store(format!(
                    "unknown adapter id '{}'",
                    entry.adapter_id
                )));
            }
            let bound = adapter_store.register(Arc::new(PointAdapter::new()), entry.internal_id);
            let index_ids = entry.index_ids.iter().map(|id| ByteKey::from(id.as_str())).collect();
            adapters.push((bound, index_ids));
        }

        let driver = Arc::new(MemoryStoreDriver::new());
        let mut entries = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            entries.push(StoredEntry {
                partition_key: decode_hex(&row.partition)
                    .ok_or_else(|| CliError::Store("row partition: bad hex".to_string()))?,
                sort_key: decode_hex(&row.sort)
                    .ok_or_else(|| CliError::Store("row sort key: bad hex".to_string()))?,
                data_id: decode_hex(&row.data_id)
                    .ok_or_else(|| CliError::Store("row data id: bad hex".to_string()))?,
                value: decode_hex(&row.value)
                    .ok_or_else(|| CliError::Store("row value: bad hex".to_string()))?,
            });
        }
        driver.import_entries(entries);

        let statistics = Arc::new(InMemoryStatisticsStore::new());
        for entry in &self.statistics {
            let id = ByteKey::new(decode_hex(&entry.statistics_id).ok_or_else(|| {
                CliError::Store("statistics id: bad hex".to_string())
            })?);
            let value = decode_hex(&entry.value)
                .ok_or_else(|| CliError::Store("statistics value: bad hex".to_string()))?;
            statistics
                .persist(entry.internal_id, &id, &value)
                .map_err(CliError::Core)?;
        }

        Ok(OpenStore {
            driver,
            indices,
            adapters,
            adapter_store: Arc::new(adapter_store),
            statistics,
        })
    }

    /// Fold runtime state back into the file's row and statistics sections.
    pub fn absorb(&mut self, open: &OpenStore) -> CliResult<()> {
        self.rows = open
            .driver
            .export_entries()
            .into_iter()
            .map(|e| RowEntry {
                partition: encode_hex(&e.partition_key),
                sort: encode_hex(&e.sort_key),
                data_id: encode_hex(&e.data_id),
                value: encode_hex(&e.value),
            })
            .collect();
        self.statistics = open
            .statistics
            .all()
            .map_err(CliError::Core)?
            .into_iter()
            .map(|(internal_id, id, value)| StatisticsEntry {
                internal_id,
                statistics_id: encode_hex(id.as_bytes()),
                value: encode_hex(&value),
            })
            .collect();
        Ok(())
    }
}

pub fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::init::default_store_file;

    #[test]
    fn test_hex_roundtrip() {
        let bytes = vec![0x00, 0x7f, 0xff, 0x10];
        assert_eq!(decode_hex(&encode_hex(&bytes)).unwrap(), bytes);
        assert!(decode_hex("abc").is_none());
        assert!(decode_hex("zz").is_none());
    }

    #[test]
    fn test_default_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let file = default_store_file();
        file.save(&path).unwrap();

        let loaded = StoreFile::load(&path).unwrap();
        let open = loaded.open().unwrap();
        assert_eq!(open.indices.len(), 1);
        assert_eq!(open.adapters.len(), 1);
        assert_eq!(open.adapters[0].0.internal_id(), 1);
        assert!(open.index(&ByteKey::from("spatial")).is_some());
    }

    #[test]
    fn test_unknown_adapter_rejected() {
        let mut file = default_store_file();
        file.adapters[0].adapter_id = "raster".to_string();
        assert!(file.open().is_err());
    }
}
