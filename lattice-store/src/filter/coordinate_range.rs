//! Coordinate-range re-validation filter.
//!
//! `query_ranges` may legitimately over-approximate the query region
//! (coarsening under a range cap pads trailing dimensions). This filter
//! re-checks, using the strategy's per-dimension coordinate decomposition,
//! that a returned row's cell genuinely falls within the originally
//! requested bins.

use super::{FilterKind, QueryFilter};
use crate::error::{Result, StoreError};
use crate::model::IndexModel;
use crate::row::RowEncoding;
use lattice_index::{strategy_from_binary, BinRange, NumericIndexStrategy, Region};
use std::sync::Arc;
use tracing::warn;

/// Accepts rows whose sort-key cell lies within the requested bin ranges.
pub struct CoordinateRangeFilter {
    strategy: Arc<dyn NumericIndexStrategy>,
    ranges: Vec<BinRange>,
}

impl CoordinateRangeFilter {
    /// Filter on explicit per-dimension bin ranges.
    pub fn new(strategy: Arc<dyn NumericIndexStrategy>, ranges: Vec<BinRange>) -> Self {
        CoordinateRangeFilter { strategy, ranges }
    }

    /// Filter on the bins a query region touches.
    pub fn for_region(
        strategy: Arc<dyn NumericIndexStrategy>,
        region: &Region,
    ) -> Result<Self> {
        let ranges = strategy.coordinate_ranges(region)?;
        Ok(CoordinateRangeFilter { strategy, ranges })
    }

    /// The per-dimension bin ranges this filter checks.
    pub fn ranges(&self) -> &[BinRange] {
        &self.ranges
    }

    /// Reconstruct from [`QueryFilter::to_binary`] output.
    pub fn from_binary(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(StoreError::Format(
                "truncated coordinate range filter".to_string(),
            ));
        }
        let strategy_len = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
        if data.len() < 4 + strategy_len + 2 {
            return Err(StoreError::Format(
                "truncated coordinate range filter strategy".to_string(),
            ));
        }
        let strategy = strategy_from_binary(&data[4..4 + strategy_len])?;
        let mut pos = 4 + strategy_len;
        let dim_count =
            u16::from_le_bytes(data[pos..pos + 2].try_into().unwrap()) as usize;
        pos += 2;
        if data.len() < pos + dim_count * 8 {
            return Err(StoreError::Format(
                "truncated coordinate range filter ranges".to_string(),
            ));
        }
        let mut ranges = Vec::with_capacity(dim_count);
        for _ in 0..dim_count {
            let min_bin = u32::from_le_bytes(data[pos..pos + 4].try_into().unwrap());
            let max_bin = u32::from_le_bytes(data[pos + 4..pos + 8].try_into().unwrap());
            pos += 8;
            ranges.push(BinRange::new(min_bin, max_bin));
        }
        Ok(CoordinateRangeFilter { strategy, ranges })
    }
}

impl QueryFilter for CoordinateRangeFilter {
    fn accept(&self, _model: &IndexModel, row: &RowEncoding) -> bool {
        let cell = match self.strategy.cell_of(&row.key.sort_key) {
            Ok(cell) => cell,
            Err(e) => {
                // a key this strategy cannot decode cannot be re-validated
                warn!(
                    sort_key = %row.key.sort_key,
                    error = %e,
                    "rejecting row with undecodable sort key"
                );
                return false;
            }
        };
        if cell.len() != self.ranges.len() {
            return false;
        }
        cell.iter()
            .zip(&self.ranges)
            .all(|(&bin, range)| range.contains(bin))
    }

    fn kind(&self) -> FilterKind {
        FilterKind::CoordinateRange
    }

    fn to_binary(&self) -> Vec<u8> {
        let strategy = self.strategy.to_binary();
        let mut buf = Vec::with_capacity(4 + strategy.len() + 2 + self.ranges.len() * 8);
        buf.extend_from_slice(&(strategy.len() as u32).to_le_bytes());
        buf.extend_from_slice(&strategy);
        buf.extend_from_slice(&(self.ranges.len() as u16).to_le_bytes());
        for range in &self.ranges {
            buf.extend_from_slice(&range.min_bin.to_le_bytes());
            buf.extend_from_slice(&range.max_bin.to_le_bytes());
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::{RowFieldSet, RowKey};
    use lattice_index::{ByteKey, DimensionDefinition, GridIndexStrategy, NumericData};

    fn strategy() -> Arc<dyn NumericIndexStrategy> {
        Arc::new(
            GridIndexStrategy::new(
                "grid",
                vec![
                    DimensionDefinition::new("x", 0.0, 100.0, 10).unwrap(),
                    DimensionDefinition::new("y", 0.0, 100.0, 10).unwrap(),
                ],
                2,
            )
            .unwrap(),
        )
    }

    fn row_at(strategy: &Arc<dyn NumericIndexStrategy>, x: f64, y: f64) -> RowEncoding {
        let ids = strategy
            .insertion_ids(&Region::point(&[x, y]))
            .unwrap();
        let (partition, sort) = ids.iter().next().unwrap();
        RowEncoding {
            key: RowKey {
                partition_key: partition.clone(),
                sort_key: sort.clone(),
            },
            internal_adapter_id: 1,
            data_id: ByteKey::from("r"),
            dedup_enabled: true,
            duplicated: false,
            field_set: RowFieldSet::default(),
        }
    }

    #[test]
    fn test_rejects_rows_outside_requested_bins() {
        let s = strategy();
        let region = Region::new(vec![
            NumericData::range(10.0, 39.0),
            NumericData::range(10.0, 39.0),
        ]);
        let filter = CoordinateRangeFilter::for_region(Arc::clone(&s), &region).unwrap();
        let model = IndexModel::new(vec![]);

        assert!(filter.accept(&model, &row_at(&s, 15.0, 35.0)));
        // inside the coarse scan ranges a capped decomposition would cover,
        // outside the requested bins
        assert!(!filter.accept(&model, &row_at(&s, 15.0, 75.0)));
        assert!(!filter.accept(&model, &row_at(&s, 95.0, 15.0)));
    }

    #[test]
    fn test_rejects_undecodable_sort_key() {
        let s = strategy();
        let filter =
            CoordinateRangeFilter::new(Arc::clone(&s), vec![BinRange::new(0, 9), BinRange::new(0, 9)]);
        let model = IndexModel::new(vec![]);
        let mut row = row_at(&s, 1.0, 1.0);
        row.key.sort_key = ByteKey::new(vec![1, 2, 3]);
        assert!(!filter.accept(&model, &row));
    }

    #[test]
    fn test_binary_roundtrip() {
        let s = strategy();
        let region = Region::new(vec![
            NumericData::range(20.0, 59.0),
            NumericData::value(45.0),
        ]);
        let filter = CoordinateRangeFilter::for_region(Arc::clone(&s), &region).unwrap();
        let restored = CoordinateRangeFilter::from_binary(&filter.to_binary()).unwrap();
        assert_eq!(restored.ranges(), filter.ranges());

        let model = IndexModel::new(vec![]);
        for (x, y) in [(25.0, 45.0), (65.0, 45.0), (25.0, 90.0)] {
            let row = row_at(&s, x, y);
            assert_eq!(filter.accept(&model, &row), restored.accept(&model, &row));
        }
    }
}
