//! `lattice init`: create a store file with the default point schema.

use crate::error::{CliError, CliResult};
use crate::store_file::{encode_hex, AdapterEntry, IndexEntry, StoreFile};
use lattice_index::{DimensionDefinition, GridIndexStrategy};
use lattice_store::adapter::point::{LOCATION_FIELD, POINT_ADAPTER_ID};
use lattice_store::PrimaryIndex;
use std::path::Path;
use std::sync::Arc;

/// The default schema: one spatial grid index over the point adapter.
pub fn default_store_file() -> StoreFile {
    let strategy = GridIndexStrategy::new(
        "grid-xy",
        vec![
            DimensionDefinition::new(LOCATION_FIELD, -180.0, 180.0, 360)
                .expect("static dimension definition"),
            DimensionDefinition::new(LOCATION_FIELD, -90.0, 90.0, 180)
                .expect("static dimension definition"),
        ],
        16,
    )
    .expect("static strategy definition");
    let index = PrimaryIndex::new("spatial", Arc::new(strategy));

    StoreFile {
        indices: vec![IndexEntry {
            id: "spatial".to_string(),
            index: encode_hex(&index.to_binary()),
        }],
        adapters: vec![AdapterEntry {
            adapter_id: POINT_ADAPTER_ID.to_string(),
            internal_id: 1,
            index_ids: vec!["spatial".to_string()],
        }],
        rows: Vec::new(),
        statistics: Vec::new(),
    }
}

pub fn run(store: &Path) -> CliResult<()> {
    if store.exists() {
        return Err(CliError::Usage(format!(
            "store file '{}' already exists",
            store.display()
        )));
    }
    default_store_file().save(store)?;
    println!("Initialized store '{}'", store.display());
    Ok(())
}
