//! Running statistics over scanned rows.
//!
//! Statistics recomputation is expressed as "run a scan with a composition
//! tool attached as an observer" rather than as a separate code path: the
//! tool routes every row passing through the scan into per-statistic
//! running aggregates and persists them when the scope closes, on every
//! exit path including scan failure.

use crate::error::{Result, StoreError};
use crate::row::RowEncoding;
use lattice_index::ByteKey;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

/// Identifier of a statistic kind (possibly parameterized by field).
pub type StatisticsId = ByteKey;

/// Identifier of the row-count statistic.
pub const COUNT_STATISTICS_ID: &str = "COUNT";

/// Identifier of the numeric-range statistic for one field.
pub fn numeric_range_statistics_id(field_id: &ByteKey) -> StatisticsId {
    let mut bytes = b"RANGE#".to_vec();
    bytes.extend_from_slice(field_id.as_bytes());
    ByteKey::new(bytes)
}

/// A running aggregate over scanned rows.
///
/// Persisted aggregates are opaque byte payloads keyed by (internal adapter
/// id, statistics id); merging decodes a persisted payload of the same kind
/// into the live aggregate.
pub trait DataStatistics: Send {
    /// This statistic's identifier.
    fn statistics_id(&self) -> &StatisticsId;

    /// Fold one observed row into the aggregate.
    fn entry_ingested(&mut self, row: &RowEncoding);

    /// Fold a persisted aggregate of the same kind into this one.
    fn merge_binary(&mut self, data: &[u8]) -> Result<()>;

    /// Serialize the aggregate state.
    fn to_binary(&self) -> Vec<u8>;

    /// Human-readable rendering for operator output.
    fn describe(&self) -> String;
}

/// Counts observed rows.
pub struct CountStatistics {
    id: StatisticsId,
    count: u64,
}

impl CountStatistics {
    /// A zeroed counter.
    pub fn new() -> Self {
        CountStatistics {
            id: ByteKey::from(COUNT_STATISTICS_ID),
            count: 0,
        }
    }

    /// Current count.
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl Default for CountStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStatistics for CountStatistics {
    fn statistics_id(&self) -> &StatisticsId {
        &self.id
    }

    fn entry_ingested(&mut self, _row: &RowEncoding) {
        self.count += 1;
    }

    fn merge_binary(&mut self, data: &[u8]) -> Result<()> {
        if data.len() != 8 {
            return Err(StoreError::Stats(format!(
                "count statistic payload must be 8 bytes, got {}",
                data.len()
            )));
        }
        self.count += u64::from_le_bytes(data.try_into().unwrap());
        Ok(())
    }

    fn to_binary(&self) -> Vec<u8> {
        self.count.to_le_bytes().to_vec()
    }

    fn describe(&self) -> String {
        format!("count={}", self.count)
    }
}

/// Tracks the numeric min/max of one field across observed rows.
pub struct NumericRangeStatistics {
    id: StatisticsId,
    field_id: ByteKey,
    min: f64,
    max: f64,
}

impl NumericRangeStatistics {
    /// An empty range aggregate for `field_id`.
    pub fn new(field_id: ByteKey) -> Self {
        NumericRangeStatistics {
            id: numeric_range_statistics_id(&field_id),
            field_id,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Whether any value has been observed.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Observed minimum, if any value was observed.
    pub fn min(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.min)
    }

    /// Observed maximum, if any value was observed.
    pub fn max(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.max)
    }
}

impl DataStatistics for NumericRangeStatistics {
    fn statistics_id(&self) -> &StatisticsId {
        &self.id
    }

    fn entry_ingested(&mut self, row: &RowEncoding) {
        if let Some(value) = row.field_set.get(&self.field_id).and_then(|v| v.as_f64()) {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
    }

    fn merge_binary(&mut self, data: &[u8]) -> Result<()> {
        if data.len() != 16 {
            return Err(StoreError::Stats(format!(
                "range statistic payload must be 16 bytes, got {}",
                data.len()
            )));
        }
        let min = f64::from_le_bytes(data[0..8].try_into().unwrap());
        let max = f64::from_le_bytes(data[8..16].try_into().unwrap());
        // an empty persisted range (min > max) folds in as a no-op
        if min <= max {
            self.min = self.min.min(min);
            self.max = self.max.max(max);
        }
        Ok(())
    }

    fn to_binary(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16);
        buf.extend_from_slice(&self.min.to_le_bytes());
        buf.extend_from_slice(&self.max.to_le_bytes());
        buf
    }

    fn describe(&self) -> String {
        if self.is_empty() {
            format!("range({})=empty", self.field_id)
        } else {
            format!("range({})=[{}, {}]", self.field_id, self.min, self.max)
        }
    }
}

/// Declares and constructs the statistics an adapter supports.
pub trait StatisticsProvider: Send + Sync {
    /// The statistic ids this provider supports.
    fn supported_statistics(&self) -> Vec<StatisticsId>;

    /// A fresh, empty aggregate for one supported id.
    fn create_statistics(&self, id: &StatisticsId) -> Option<Box<dyn DataStatistics>>;
}

/// Persistent statistics storage, keyed by (internal adapter id, statistics
/// id).
pub trait StatisticsStore: Send + Sync {
    /// Load a persisted aggregate payload.
    fn load(&self, adapter_id: u16, statistics_id: &StatisticsId) -> Result<Option<Vec<u8>>>;

    /// Persist an aggregate payload, replacing any prior value.
    fn persist(&self, adapter_id: u16, statistics_id: &StatisticsId, data: &[u8]) -> Result<()>;

    /// Remove every persisted aggregate for an adapter.
    fn remove_adapter(&self, adapter_id: u16) -> Result<()>;

    /// All persisted aggregates, for operator listings.
    fn all(&self) -> Result<Vec<(u16, StatisticsId, Vec<u8>)>>;
}

/// In-memory statistics store.
#[derive(Default)]
pub struct InMemoryStatisticsStore {
    inner: Mutex<BTreeMap<(u16, StatisticsId), Vec<u8>>>,
}

impl InMemoryStatisticsStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<(u16, StatisticsId), Vec<u8>>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl StatisticsStore for InMemoryStatisticsStore {
    fn load(&self, adapter_id: u16, statistics_id: &StatisticsId) -> Result<Option<Vec<u8>>> {
        Ok(self
            .lock()
            .get(&(adapter_id, statistics_id.clone()))
            .cloned())
    }

    fn persist(&self, adapter_id: u16, statistics_id: &StatisticsId, data: &[u8]) -> Result<()> {
        self.lock()
            .insert((adapter_id, statistics_id.clone()), data.to_vec());
        Ok(())
    }

    fn remove_adapter(&self, adapter_id: u16) -> Result<()> {
        self.lock().retain(|(a, _), _| *a != adapter_id);
        Ok(())
    }

    fn all(&self) -> Result<Vec<(u16, StatisticsId, Vec<u8>)>> {
        Ok(self
            .lock()
            .iter()
            .map(|((a, id), data)| (*a, id.clone(), data.clone()))
            .collect())
    }
}

/// Scoped aggregation over one scan for one (adapter, index) pair.
///
/// On creation with `is_first_time`, all prior persisted statistics for the
/// adapter are cleared. Every observed row updates the in-memory aggregates;
/// on close the aggregates are merged with any persisted state and written
/// back. Closing is guaranteed on every exit path: dropping an uncommitted
/// tool commits and logs a failure instead of panicking.
pub struct StatsCompositionTool {
    adapter_id: u16,
    store: Arc<dyn StatisticsStore>,
    statistics: Vec<Box<dyn DataStatistics>>,
    committed: bool,
}

impl StatsCompositionTool {
    /// Open a tool for an adapter's supported statistics.
    pub fn new(
        provider: &dyn StatisticsProvider,
        store: Arc<dyn StatisticsStore>,
        adapter_id: u16,
        is_first_time: bool,
    ) -> Result<Self> {
        if is_first_time {
            store.remove_adapter(adapter_id)?;
        }
        let statistics = provider
            .supported_statistics()
            .iter()
            .filter_map(|id| provider.create_statistics(id))
            .collect();
        Ok(StatsCompositionTool {
            adapter_id,
            store,
            statistics,
            committed: false,
        })
    }

    /// Observe one row.
    pub fn entry_ingested(&mut self, row: &RowEncoding) {
        for statistic in &mut self.statistics {
            statistic.entry_ingested(row);
        }
    }

    /// Human-readable rendering of the current aggregates.
    pub fn describe(&self) -> Vec<(StatisticsId, String)> {
        self.statistics
            .iter()
            .map(|s| (s.statistics_id().clone(), s.describe()))
            .collect()
    }

    fn commit(&mut self) -> Result<()> {
        if self.committed {
            return Ok(());
        }
        self.committed = true;
        for statistic in &mut self.statistics {
            let id = statistic.statistics_id().clone();
            if let Some(prior) = self.store.load(self.adapter_id, &id)? {
                statistic.merge_binary(&prior)?;
            }
            self.store
                .persist(self.adapter_id, &id, &statistic.to_binary())?;
        }
        debug!(
            adapter_id = self.adapter_id,
            statistics = self.statistics.len(),
            "statistics committed"
        );
        Ok(())
    }

    /// Merge with persisted state and write back.
    pub fn close(mut self) -> Result<()> {
        self.commit()
    }
}

impl Drop for StatsCompositionTool {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = self.commit() {
                error!(
                    adapter_id = self.adapter_id,
                    error = %e,
                    "failed to commit statistics on drop"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::point::PointAdapter;
    use crate::field::FieldValue;
    use crate::row::{RowFieldSet, RowKey};

    fn row(data_id: &str, x: f64) -> RowEncoding {
        RowEncoding {
            key: RowKey {
                partition_key: ByteKey::new(vec![0, 0]),
                sort_key: ByteKey::new(vec![0, 0, 0, 1]),
            },
            internal_adapter_id: 1,
            data_id: ByteKey::from(data_id),
            dedup_enabled: true,
            duplicated: false,
            field_set: RowFieldSet {
                index_data: vec![(ByteKey::from("x"), FieldValue::F64(x))],
                extended_data: Vec::new(),
                unknown_data: Vec::new(),
            },
        }
    }

    #[test]
    fn test_count_and_range_aggregation() {
        let mut count = CountStatistics::new();
        let mut range = NumericRangeStatistics::new(ByteKey::from("x"));
        for (i, x) in [3.0, -1.0, 7.5].iter().enumerate() {
            let r = row(&format!("d{i}"), *x);
            count.entry_ingested(&r);
            range.entry_ingested(&r);
        }
        assert_eq!(count.count(), 3);
        assert_eq!(range.min(), Some(-1.0));
        assert_eq!(range.max(), Some(7.5));
    }

    #[test]
    fn test_statistics_binary_roundtrip() {
        let mut range = NumericRangeStatistics::new(ByteKey::from("x"));
        range.entry_ingested(&row("a", 2.0));
        range.entry_ingested(&row("b", 9.0));

        let mut restored = NumericRangeStatistics::new(ByteKey::from("x"));
        restored.merge_binary(&range.to_binary()).unwrap();
        assert_eq!(restored.min(), Some(2.0));
        assert_eq!(restored.max(), Some(9.0));

        // empty range merges as a no-op
        let empty = NumericRangeStatistics::new(ByteKey::from("x"));
        restored.merge_binary(&empty.to_binary()).unwrap();
        assert_eq!(restored.min(), Some(2.0));
    }

    #[test]
    fn test_first_time_clears_then_incremental_merges() {
        let provider = PointAdapter::new();
        let store: Arc<dyn StatisticsStore> = Arc::new(InMemoryStatisticsStore::new());

        // seed a stale aggregate that the first run must clear
        store
            .persist(1, &ByteKey::from(COUNT_STATISTICS_ID), &999u64.to_le_bytes())
            .unwrap();

        let mut tool = StatsCompositionTool::new(&provider, Arc::clone(&store), 1, true).unwrap();
        for i in 0..100 {
            tool.entry_ingested(&row(&format!("d{i}"), i as f64));
        }
        tool.close().unwrap();

        let count_id = ByteKey::from(COUNT_STATISTICS_ID);
        let persisted = store.load(1, &count_id).unwrap().unwrap();
        assert_eq!(u64::from_le_bytes(persisted.try_into().unwrap()), 100);

        // incremental run observes 50 additional rows
        let mut tool = StatsCompositionTool::new(&provider, Arc::clone(&store), 1, false).unwrap();
        for i in 100..150 {
            tool.entry_ingested(&row(&format!("d{i}"), i as f64));
        }
        tool.close().unwrap();

        let persisted = store.load(1, &count_id).unwrap().unwrap();
        assert_eq!(u64::from_le_bytes(persisted.try_into().unwrap()), 150);
    }

    #[test]
    fn test_drop_commits_uncommitted_tool() {
        let provider = PointAdapter::new();
        let store: Arc<dyn StatisticsStore> = Arc::new(InMemoryStatisticsStore::new());
        {
            let mut tool =
                StatsCompositionTool::new(&provider, Arc::clone(&store), 2, true).unwrap();
            tool.entry_ingested(&row("a", 1.0));
            // dropped without close, e.g. a scan failure unwound the scope
        }
        let persisted = store
            .load(2, &ByteKey::from(COUNT_STATISTICS_ID))
            .unwrap()
            .unwrap();
        assert_eq!(u64::from_le_bytes(persisted.try_into().unwrap()), 1);
    }

    #[test]
    fn test_remove_adapter_scoped() {
        let store = InMemoryStatisticsStore::new();
        store
            .persist(1, &ByteKey::from(COUNT_STATISTICS_ID), &[0; 8])
            .unwrap();
        store
            .persist(2, &ByteKey::from(COUNT_STATISTICS_ID), &[0; 8])
            .unwrap();
        store.remove_adapter(1).unwrap();
        assert!(store
            .load(1, &ByteKey::from(COUNT_STATISTICS_ID))
            .unwrap()
            .is_none());
        assert!(store
            .load(2, &ByteKey::from(COUNT_STATISTICS_ID))
            .unwrap()
            .is_some());
    }
}
