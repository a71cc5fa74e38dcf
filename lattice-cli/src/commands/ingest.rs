//! `lattice ingest`: parse local files and write them into a store.

use crate::error::{CliError, CliResult};
use crate::store_file::StoreFile;
use lattice_index::ByteKey;
use lattice_ingest::{IngestPlugin, LocalFileDriver, PointCsvPlugin};
use lattice_store::adapter::point::{PointRecord, POINT_ADAPTER_ID};
use lattice_store::{BaseIndexWriter, DataAdapter, IndexWriter, StoreDriver};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub fn run(store_path: &Path, input: &Path, extensions: &[String]) -> CliResult<()> {
    let mut file = StoreFile::load(store_path)?;
    let open = file.open()?;

    let (point_adapter, index_ids) = open
        .adapters
        .iter()
        .find(|(a, _)| a.adapter().adapter_id() == &ByteKey::from(POINT_ADAPTER_ID))
        .ok_or_else(|| CliError::Store("store has no point adapter".to_string()))?;

    // one writer per target index
    let mut writers = Vec::new();
    for index_id in index_ids {
        let index = open.index(index_id).ok_or_else(|| {
            CliError::Store(format!("adapter maps to unknown index '{index_id}'"))
        })?;
        writers.push(BaseIndexWriter::new(
            point_adapter.clone(),
            index.clone(),
            Arc::clone(&open.driver) as Arc<dyn StoreDriver>,
        ));
    }

    let plugin = PointCsvPlugin::new(index_ids.clone());
    let plugins: Vec<(&str, &dyn IngestPlugin<PointRecord>)> = vec![("point-csv", &plugin)];

    let mut driver = LocalFileDriver::new();
    if !extensions.is_empty() {
        driver = driver.with_extensions(extensions.to_vec());
    }

    let mut written = 0usize;
    let summary = driver.process_input(input, &plugins, |ingest_record| {
        for writer in &mut writers {
            writer.write(&ingest_record.record)?;
        }
        written += 1;
        Ok(())
    })?;
    for mut writer in writers {
        writer.close().map_err(CliError::Core)?;
    }

    file.absorb(&open)?;
    file.save(store_path)?;

    info!(
        files = summary.files_ingested,
        failed = summary.files_failed,
        records = written,
        "ingest written to store"
    );
    println!(
        "Ingested {} records from {} files ({} skipped, {} failed)",
        summary.records, summary.files_ingested, summary.files_skipped, summary.files_failed
    );
    Ok(())
}
