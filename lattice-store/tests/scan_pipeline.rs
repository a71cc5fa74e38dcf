//! End-to-end pipeline tests: write through an adapter and strategy, scan
//! back through the streaming consumer, filters, and statistics.

use lattice_index::{
    ByteKey, DimensionDefinition, GridIndexStrategy, NumericData, NumericIndexStrategy, Region,
};
use lattice_store::{
    execute_scan, filter_from_binary, filter_to_binary, BaseIndexWriter, CoordinateRangeFilter,
    DataAdapter, DedupeFilter, FieldKind, FieldReader, FieldValue, FieldWriter,
    IndexFieldHandler, IndexValue, IndexWriter, InMemoryStatisticsStore, InternalAdapter,
    MemoryStoreDriver, NativeFieldHandler, PrimaryIndex, QueryFilter, Result, RowBuilder,
    ScanOptions, StatisticsStore, StatsCompositionTool, StoreDriver, COUNT_STATISTICS_ID,
};
use lattice_store::adapter::point::{PointAdapter, PointRecord};
use std::sync::Arc;

/// A record spanning an interval on the x axis, at a fixed y.
#[derive(Debug, Clone, PartialEq)]
struct SpanRecord {
    id: String,
    x_min: f64,
    x_max: f64,
    y: f64,
}

struct SpanHandler {
    field_id: ByteKey,
}

impl IndexFieldHandler<SpanRecord> for SpanHandler {
    fn index_field_id(&self) -> &ByteKey {
        &self.field_id
    }

    fn native_field_ids(&self) -> Vec<ByteKey> {
        vec![
            ByteKey::from("xmin"),
            ByteKey::from("xmax"),
            ByteKey::from("y"),
        ]
    }

    fn to_index_value(&self, entry: &SpanRecord) -> IndexValue {
        IndexValue {
            field_id: self.field_id.clone(),
            data: vec![
                NumericData::range(entry.x_min, entry.x_max),
                NumericData::value(entry.y),
            ],
        }
    }

    fn to_native_values(&self, value: &IndexValue) -> Vec<(ByteKey, FieldValue)> {
        let x = value.data.first().copied().unwrap_or(NumericData::value(0.0));
        let y = value.data.get(1).map_or(0.0, |d| d.min());
        vec![
            (ByteKey::from("xmin"), FieldValue::F64(x.min())),
            (ByteKey::from("xmax"), FieldValue::F64(x.max())),
            (ByteKey::from("y"), FieldValue::F64(y)),
        ]
    }
}

struct SpanAdapter {
    adapter_id: ByteKey,
    index_handlers: Vec<Box<dyn IndexFieldHandler<SpanRecord>>>,
    native_handlers: Vec<Box<dyn NativeFieldHandler<SpanRecord>>>,
}

impl SpanAdapter {
    fn new() -> Self {
        SpanAdapter {
            adapter_id: ByteKey::from("span"),
            index_handlers: vec![Box::new(SpanHandler {
                field_id: ByteKey::from("extent"),
            })],
            native_handlers: Vec::new(),
        }
    }
}

#[derive(Default)]
struct SpanBuilder {
    x_min: Option<f64>,
    x_max: Option<f64>,
    y: Option<f64>,
}

impl RowBuilder<SpanRecord> for SpanBuilder {
    fn set_field(&mut self, field_id: &ByteKey, value: FieldValue) {
        match field_id.render().as_str() {
            "xmin" => self.x_min = value.as_f64(),
            "xmax" => self.x_max = value.as_f64(),
            "y" => self.y = value.as_f64(),
            _ => {}
        }
    }

    fn build(&mut self, data_id: &ByteKey) -> Result<SpanRecord> {
        Ok(SpanRecord {
            id: data_id.render(),
            x_min: self.x_min.take().unwrap_or(0.0),
            x_max: self.x_max.take().unwrap_or(0.0),
            y: self.y.take().unwrap_or(0.0),
        })
    }
}

impl DataAdapter<SpanRecord> for SpanAdapter {
    fn adapter_id(&self) -> &ByteKey {
        &self.adapter_id
    }

    fn data_id(&self, entry: &SpanRecord) -> ByteKey {
        ByteKey::from(entry.id.as_str())
    }

    fn is_supported(&self, entry: &SpanRecord) -> bool {
        entry.x_min.is_finite() && entry.x_max.is_finite() && entry.y.is_finite()
    }

    fn index_field_handlers(&self) -> &[Box<dyn IndexFieldHandler<SpanRecord>>] {
        &self.index_handlers
    }

    fn native_field_handlers(&self) -> &[Box<dyn NativeFieldHandler<SpanRecord>>] {
        &self.native_handlers
    }

    fn field_reader(&self, field_id: &ByteKey) -> Option<FieldReader> {
        match field_id.render().as_str() {
            "xmin" | "xmax" | "y" => Some(FieldReader::new(FieldKind::F64)),
            _ => None,
        }
    }

    fn field_writer(&self, field_id: &ByteKey) -> Option<FieldWriter> {
        match field_id.render().as_str() {
            "xmin" | "xmax" | "y" => Some(FieldWriter::new(FieldKind::F64)),
            _ => None,
        }
    }

    fn builder(&self) -> Box<dyn RowBuilder<SpanRecord>> {
        Box::new(SpanBuilder::default())
    }
}

fn span_index() -> PrimaryIndex {
    let strategy = GridIndexStrategy::new(
        "grid",
        vec![
            DimensionDefinition::new("extent", 0.0, 100.0, 10).unwrap(),
            DimensionDefinition::new("extent", 0.0, 100.0, 10).unwrap(),
        ],
        1,
    )
    .unwrap();
    PrimaryIndex::new("span-index", Arc::new(strategy))
}

fn span_adapter() -> InternalAdapter<SpanRecord> {
    InternalAdapter::new(Arc::new(SpanAdapter::new()), 2)
}

fn scan_spans(
    driver: &Arc<MemoryStoreDriver>,
    index: &PrimaryIndex,
    region: &Region,
    filters: Vec<Box<dyn QueryFilter>>,
) -> Vec<SpanRecord> {
    let stream = execute_scan(
        Arc::clone(driver) as Arc<dyn StoreDriver>,
        index,
        span_adapter(),
        None,
        region,
        filters,
        ScanOptions::default(),
        None,
    )
    .unwrap();
    stream.map(|r| r.unwrap()).collect()
}

/// The partitioned duplicate-write scenario: a region spanning two bins is
/// written under both, and read-side deduplication only collapses the
/// duplicates in a cross-index dedupe scope.
#[test]
fn test_two_bin_duplicate_write_scenario() {
    let driver = Arc::new(MemoryStoreDriver::new());
    let index = span_index();

    let record = SpanRecord {
        id: "s1".to_string(),
        x_min: 15.0,
        x_max: 25.0,
        y: 5.0,
    };
    let mut writer = BaseIndexWriter::new(
        span_adapter(),
        index.clone(),
        Arc::clone(&driver) as Arc<dyn StoreDriver>,
    );
    let ids = writer.write(&record).unwrap();
    writer.close().unwrap();

    // two covering bins, two distinct sort keys
    assert_eq!(ids.len(), 2);
    let sort_keys: Vec<_> = ids.iter().map(|(_, s)| s.clone()).collect();
    assert_ne!(sort_keys[0], sort_keys[1]);

    let both_bins = Region::new(vec![
        NumericData::range(10.0, 29.0),
        NumericData::value(5.0),
    ]);

    // no dedupe: once per bin
    let rows = scan_spans(&driver, &index, &both_bins, Vec::new());
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.id == "s1"));

    // dedupe on, cross-index mode off: sibling entries of one index are not
    // duplicates of each other
    let rows = scan_spans(
        &driver,
        &index,
        &both_bins,
        vec![Box::new(DedupeFilter::new())],
    );
    assert_eq!(rows.len(), 2);

    // cross-index scope over the same filter instance: same data id
    // collapses to one row
    let rows = scan_spans(
        &driver,
        &index,
        &both_bins,
        vec![Box::new(DedupeFilter::cross_index())],
    );
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "s1");
    assert_eq!(rows[0].x_min, 15.0);
    assert_eq!(rows[0].x_max, 25.0);
}

/// Statistics recomputation scenario: a full scan with the tool attached
/// counts 100 records; an incremental scan of 50 additional records raises
/// the persisted count to 150.
#[test]
fn test_stats_scan_full_then_incremental() {
    let driver = Arc::new(MemoryStoreDriver::new());
    let strategy = GridIndexStrategy::new(
        "grid",
        vec![
            DimensionDefinition::new("location", 0.0, 100.0, 10).unwrap(),
            DimensionDefinition::new("location", 0.0, 100.0, 10).unwrap(),
        ],
        4,
    )
    .unwrap();
    let index = PrimaryIndex::new("points", Arc::new(strategy));
    let adapter = || InternalAdapter::new(Arc::new(PointAdapter::new()), 1);
    let provider = PointAdapter::new();
    let stats: Arc<dyn StatisticsStore> = Arc::new(InMemoryStatisticsStore::new());

    let mut writer = BaseIndexWriter::new(
        adapter(),
        index.clone(),
        Arc::clone(&driver) as Arc<dyn StoreDriver>,
    );
    for i in 0..100 {
        let x = (i % 50) as f64;
        let y = (i / 2) as f64;
        writer
            .write(&PointRecord::new(format!("p{i}"), x, y))
            .unwrap();
    }
    writer.close().unwrap();

    let mut tool = StatsCompositionTool::new(&provider, Arc::clone(&stats), 1, true).unwrap();
    {
        let stream = execute_scan(
            Arc::clone(&driver) as Arc<dyn StoreDriver>,
            &index,
            adapter(),
            None,
            &index.full_region(),
            Vec::new(),
            ScanOptions::default(),
            Some(&mut tool),
        )
        .unwrap();
        assert_eq!(stream.filter(|r| r.is_ok()).count(), 100);
    }
    tool.close().unwrap();

    let count_id = ByteKey::from(COUNT_STATISTICS_ID);
    let persisted = stats.load(1, &count_id).unwrap().unwrap();
    assert_eq!(u64::from_le_bytes(persisted.try_into().unwrap()), 100);

    // 50 additional records in a separate x band
    let mut writer = BaseIndexWriter::new(
        adapter(),
        index.clone(),
        Arc::clone(&driver) as Arc<dyn StoreDriver>,
    );
    for i in 100..150 {
        let x = 50.0 + (i % 50) as f64;
        let y = (i % 100) as f64;
        writer
            .write(&PointRecord::new(format!("p{i}"), x, y))
            .unwrap();
    }
    writer.close().unwrap();

    let new_band = Region::new(vec![
        NumericData::range(50.0, 100.0),
        NumericData::range(0.0, 100.0),
    ]);
    let mut tool = StatsCompositionTool::new(&provider, Arc::clone(&stats), 1, false).unwrap();
    {
        let stream = execute_scan(
            Arc::clone(&driver) as Arc<dyn StoreDriver>,
            &index,
            adapter(),
            None,
            &new_band,
            Vec::new(),
            ScanOptions::default(),
            Some(&mut tool),
        )
        .unwrap();
        assert_eq!(stream.filter(|r| r.is_ok()).count(), 50);
    }
    tool.close().unwrap();

    let persisted = stats.load(1, &count_id).unwrap().unwrap();
    assert_eq!(u64::from_le_bytes(persisted.try_into().unwrap()), 150);
}

/// Randomized end-to-end check: a region scan with the coordinate filter
/// returns exactly the points whose grid cell the region touches.
#[test]
fn test_random_points_scan_matches_bin_cover() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(23);
    let driver = Arc::new(MemoryStoreDriver::new());
    let strategy = GridIndexStrategy::new(
        "grid",
        vec![
            DimensionDefinition::new("location", 0.0, 100.0, 20).unwrap(),
            DimensionDefinition::new("location", 0.0, 100.0, 20).unwrap(),
        ],
        8,
    )
    .unwrap();
    let index = PrimaryIndex::new("points", Arc::new(strategy));
    let adapter = || InternalAdapter::new(Arc::new(PointAdapter::new()), 1);

    let points: Vec<PointRecord> = (0..200)
        .map(|i| {
            PointRecord::new(
                format!("p{i}"),
                rng.gen_range(0.0..=100.0),
                rng.gen_range(0.0..=100.0),
            )
        })
        .collect();
    let mut writer = BaseIndexWriter::new(
        adapter(),
        index.clone(),
        Arc::clone(&driver) as Arc<dyn StoreDriver>,
    );
    for point in &points {
        writer.write(point).unwrap();
    }
    writer.close().unwrap();

    for _ in 0..10 {
        let lo_x = rng.gen_range(0.0..80.0);
        let lo_y = rng.gen_range(0.0..80.0);
        let region = Region::new(vec![
            NumericData::range(lo_x, lo_x + rng.gen_range(0.0..20.0)),
            NumericData::range(lo_y, lo_y + rng.gen_range(0.0..20.0)),
        ]);
        let bins = index.strategy().coordinate_ranges(&region).unwrap();

        let mut expected: Vec<String> = points
            .iter()
            .filter(|p| {
                let cell = index
                    .strategy()
                    .insertion_ids(&Region::point(&[p.x, p.y]))
                    .unwrap();
                let (_, sort) = cell.iter().next().unwrap();
                let cell = index.strategy().cell_of(sort).unwrap();
                cell.iter().zip(&bins).all(|(&b, r)| r.contains(b))
            })
            .map(|p| p.id.clone())
            .collect();
        expected.sort();

        let filter =
            CoordinateRangeFilter::for_region(Arc::clone(index.strategy()), &region).unwrap();
        let stream = execute_scan(
            Arc::clone(&driver) as Arc<dyn StoreDriver>,
            &index,
            adapter(),
            None,
            &region,
            vec![Box::new(filter)],
            ScanOptions::default(),
            None,
        )
        .unwrap();
        let mut actual: Vec<String> = stream.map(|r| r.unwrap().id).collect();
        actual.sort();
        assert_eq!(actual, expected);
    }
}

/// Filters reconstruct identically through the tag-dispatched codec.
#[test]
fn test_filter_distribution_roundtrip() {
    let index = span_index();

    let dedupe = DedupeFilter::cross_index();
    let restored = filter_from_binary(&filter_to_binary(&dedupe)).unwrap();
    assert_eq!(restored.to_binary(), dedupe.to_binary());

    let region = Region::new(vec![
        NumericData::range(10.0, 29.0),
        NumericData::value(5.0),
    ]);
    let coord =
        CoordinateRangeFilter::for_region(Arc::clone(index.strategy()), &region).unwrap();
    let restored = filter_from_binary(&filter_to_binary(&coord)).unwrap();
    assert_eq!(restored.to_binary(), coord.to_binary());
}
