//! Scan execution: decompose, stream, decode, filter, observe, yield.
//!
//! `execute_scan` turns a query region into scan ranges, spawns one named
//! producer thread that drains the driver's paged feeds into a bounded
//! queue, and returns a lazy [`RecordStream`] pulling from the queue. Rows
//! are decoded through the matching adapter, pass the filter pipeline, are
//! observed by an optional statistics tool, and are finally rebuilt into
//! records.
//!
//! Dropping the stream closes the scan: the producer notices the closed
//! queue on its next push and stops fetching, so neither side hangs.

use crate::adapter::{AdapterStore, DataAdapter, InternalAdapter};
use crate::consumer::{row_queue, RowConsumer, DEFAULT_QUEUE_CAPACITY};
use crate::driver::{RowFeed, RowKeyRange, StoreDriver};
use crate::error::{Result, StoreError};
use crate::filter::{accept_all, QueryFilter};
use crate::model::{IndexModel, PrimaryIndex};
use crate::row::{decode_row, resolve_adapter};
use crate::stats::StatsCompositionTool;
use lattice_index::{NumericIndexStrategy, Region};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Scan tuning knobs.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Cap on the number of decomposed scan ranges; `None` means no forced
    /// coarsening.
    pub max_ranges: Option<usize>,
    /// Bound of the producer/consumer queue.
    pub queue_capacity: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            max_ranges: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Lazy record sequence produced by [`execute_scan`].
///
/// Yields one `Result` per surviving row; a row whose adapter cannot be
/// resolved or whose decode fails yields an error without ending the scan.
pub struct RecordStream<'o, T> {
    consumer: Option<RowConsumer>,
    adapter: InternalAdapter<T>,
    adapter_store: Option<Arc<dyn AdapterStore<T>>>,
    model: IndexModel,
    filters: Vec<Box<dyn QueryFilter>>,
    observer: Option<&'o mut StatsCompositionTool>,
    producer: Option<JoinHandle<()>>,
}

impl<T> RecordStream<'_, T> {
    /// Close the scan. Idempotent; also invoked on drop.
    pub fn close(&mut self) {
        // dropping the consumer closes the queue and unblocks the producer
        self.consumer = None;
        if let Some(handle) = self.producer.take() {
            if handle.join().is_err() {
                warn!("scan producer thread panicked");
            }
        }
    }
}

impl<T> Drop for RecordStream<'_, T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> Iterator for RecordStream<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let consumer = self.consumer.as_mut()?;
            if !consumer.has_next() {
                return None;
            }
            let row = match consumer.take_next() {
                Ok(row) => row,
                Err(e) => return Some(Err(e)),
            };

            let adapter =
                match resolve_adapter(&row, Some(&self.adapter), self.adapter_store.as_deref()) {
                    Ok(adapter) => adapter,
                    Err(e) => {
                        warn!(
                            embedded_adapter_id = row.internal_adapter_id,
                            data_id = %row.data_id,
                            "aborting row decode: {e}"
                        );
                        return Some(Err(e));
                    }
                };

            let encoding = match decode_row(&row, adapter.adapter().as_ref()) {
                Ok(encoding) => encoding,
                Err(e) => return Some(Err(e)),
            };

            if !accept_all(&self.filters, &self.model, &encoding) {
                continue;
            }
            if let Some(observer) = self.observer.as_mut() {
                observer.entry_ingested(&encoding);
            }

            let mut builder = adapter.adapter().builder();
            builder.set_fields(&encoding.field_set.index_data);
            builder.set_fields(&encoding.field_set.extended_data);
            return Some(builder.build(&encoding.data_id));
        }
    }
}

/// Execute a region scan against one index.
#[allow(clippy::too_many_arguments)]
pub fn execute_scan<'o, T>(
    driver: Arc<dyn StoreDriver>,
    index: &PrimaryIndex,
    adapter: InternalAdapter<T>,
    adapter_store: Option<Arc<dyn AdapterStore<T>>>,
    region: &Region,
    filters: Vec<Box<dyn QueryFilter>>,
    options: ScanOptions,
    observer: Option<&'o mut StatsCompositionTool>,
) -> Result<RecordStream<'o, T>> {
    let ranges = index.strategy().query_ranges(region, options.max_ranges)?;
    let targets: Vec<RowKeyRange> = ranges
        .iter()
        .map(|(partition, range)| RowKeyRange {
            partition_key: partition.clone(),
            range: range.clone(),
        })
        .collect();
    debug!(
        index = %index.id(),
        ranges = targets.len(),
        "scan decomposed"
    );

    let (mut producer, consumer) = row_queue(options.queue_capacity);
    let producer_handle = std::thread::Builder::new()
        .name("lattice-scan".into())
        .spawn(move || {
            'ranges: for target in targets {
                let mut feed = match driver.scan(&target) {
                    Ok(feed) => feed,
                    Err(e) => {
                        producer.fail(e.to_string());
                        return;
                    }
                };
                loop {
                    match feed.next_page() {
                        Ok(Some(page)) => {
                            for row in page {
                                if !producer.push(row) {
                                    // consumer gone, stop fetching
                                    break 'ranges;
                                }
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            producer.fail(e.to_string());
                            return;
                        }
                    }
                }
            }
            producer.finish();
        })
        .map_err(|e| StoreError::Backend(format!("failed to spawn scan thread: {e}")))?;

    Ok(RecordStream {
        consumer: Some(consumer),
        adapter,
        adapter_store,
        model: index.model().clone(),
        filters,
        observer,
        producer: Some(producer_handle),
    })
}
