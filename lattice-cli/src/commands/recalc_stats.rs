//! `lattice recalc-stats`: recompute persisted statistics with full scans.
//!
//! For each adapter (optionally restricted to one), every mapped index is
//! scanned to completion with a `StatsCompositionTool` attached; the first
//! index of an adapter clears prior statistics, subsequent indexes update
//! incrementally.

use crate::error::{CliError, CliResult};
use crate::store_file::StoreFile;
use comfy_table::{ContentArrangement, Table};
use lattice_index::ByteKey;
use lattice_store::adapter::point::{PointAdapter, PointRecord};
use lattice_store::{
    execute_scan, DataAdapter, DataStatistics, ScanOptions, StatisticsProvider,
    StatisticsStore, StatsCompositionTool, StoreDriver,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

pub fn run(store_path: &Path, adapter_id: Option<&str>) -> CliResult<()> {
    let mut file = StoreFile::load(store_path)?;
    let open = file.open()?;

    let selected: Vec<_> = open
        .adapters
        .iter()
        .filter(|(adapter, _)| match adapter_id {
            Some(id) => adapter.adapter().adapter_id() == &ByteKey::from(id),
            None => true,
        })
        .collect();
    if selected.is_empty() {
        return Err(CliError::Usage(match adapter_id {
            Some(id) => format!("no adapter '{id}' in store"),
            None => "store has no adapters".to_string(),
        }));
    }

    // the concrete provider for the only record type the CLI knows
    let provider = PointAdapter::new();

    for (adapter, index_ids) in selected {
        let mut is_first_time = true;
        for index_id in index_ids {
            let index = open.index(index_id).ok_or_else(|| {
                CliError::Store(format!(
                    "adapter '{}' maps to unknown index '{index_id}'",
                    adapter.adapter().adapter_id()
                ))
            })?;

            let result = (|| -> CliResult<u64> {
                let mut tool = StatsCompositionTool::new(
                    &provider,
                    Arc::clone(&open.statistics) as Arc<dyn StatisticsStore>,
                    adapter.internal_id(),
                    is_first_time,
                )
                .map_err(CliError::Core)?;
                let stream = execute_scan(
                    Arc::clone(&open.driver) as Arc<dyn StoreDriver>,
                    index,
                    adapter.clone(),
                    Some(Arc::clone(&open.adapter_store)
                        as Arc<dyn lattice_store::AdapterStore<PointRecord>>),
                    &index.full_region(),
                    Vec::new(),
                    ScanOptions::default(),
                    Some(&mut tool),
                )
                .map_err(CliError::Core)?;
                let mut rows = 0u64;
                for record in stream {
                    record.map_err(CliError::Core)?;
                    rows += 1;
                }
                tool.close().map_err(CliError::Core)?;
                Ok(rows)
            })();

            match result {
                Ok(rows) => info!(
                    adapter = %adapter.adapter().adapter_id(),
                    index = %index.id(),
                    rows,
                    "statistics recalculated"
                ),
                Err(e) => {
                    error!(
                        store = %store_path.display(),
                        adapter = %adapter.adapter().adapter_id(),
                        index = %index.id(),
                        "error while writing statistics: {e}"
                    );
                    return Err(e);
                }
            }
            is_first_time = false;
        }
    }

    file.absorb(&open)?;
    file.save(store_path)?;
    print_statistics(&open)?;
    Ok(())
}

fn print_statistics(open: &crate::store_file::OpenStore) -> CliResult<()> {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["ADAPTER", "STATISTIC", "VALUE"]);

    let provider = PointAdapter::new();
    for (internal_id, statistics_id, value) in
        open.statistics.all().map_err(CliError::Core)?
    {
        let adapter_name = open
            .adapters
            .iter()
            .find(|(a, _)| a.internal_id() == internal_id)
            .map_or_else(
                || internal_id.to_string(),
                |(a, _)| a.adapter().adapter_id().to_string(),
            );
        // render through a fresh aggregate of the same kind
        let rendered = match provider.create_statistics(&statistics_id) {
            Some(mut statistic) => match statistic.merge_binary(&value) {
                Ok(()) => statistic.describe(),
                Err(_) => crate::store_file::encode_hex(&value),
            },
            None => crate::store_file::encode_hex(&value),
        };
        table.add_row(vec![adapter_name, statistics_id.to_string(), rendered]);
    }

    println!("{table}");
    Ok(())
}
