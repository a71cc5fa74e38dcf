//! Multi-dimensional numeric regions.

use crate::dimension::NumericData;
use crate::error::{IndexError, Result};

/// A multi-dimensional numeric region: one datum per index dimension, in the
/// index's dimension order.
///
/// A point is a degenerate region where every datum is a single value.
/// Regions are plain data; validation against a concrete index's declared
/// ranges happens in the strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    data: Vec<NumericData>,
}

impl Region {
    /// Create a region from per-dimension data.
    pub fn new(data: Vec<NumericData>) -> Self {
        Region { data }
    }

    /// Create a degenerate point region.
    pub fn point(coords: &[f64]) -> Self {
        Region {
            data: coords.iter().map(|&c| NumericData::value(c)).collect(),
        }
    }

    /// Number of dimensions.
    pub fn dimensions(&self) -> usize {
        self.data.len()
    }

    /// Per-dimension data, in index dimension order.
    pub fn data(&self) -> &[NumericData] {
        &self.data
    }

    /// Datum for one dimension.
    pub fn datum(&self, dim: usize) -> Option<&NumericData> {
        self.data.get(dim)
    }

    /// Reject regions with non-finite endpoints or the wrong arity.
    pub fn validate(&self, expected_dimensions: usize) -> Result<()> {
        if self.data.len() != expected_dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: expected_dimensions,
                actual: self.data.len(),
            });
        }
        for (i, d) in self.data.iter().enumerate() {
            if !d.is_finite() {
                return Err(IndexError::InvalidRegion(format!(
                    "non-finite endpoint in dimension {i}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_region() {
        let r = Region::point(&[1.0, 2.0]);
        assert_eq!(r.dimensions(), 2);
        assert!(!r.data()[0].is_range());
        assert_eq!(r.data()[1].min(), 2.0);
    }

    #[test]
    fn test_validate_arity_and_finiteness() {
        let r = Region::point(&[1.0, 2.0]);
        assert!(r.validate(2).is_ok());
        assert!(matches!(
            r.validate(3),
            Err(IndexError::DimensionMismatch { .. })
        ));

        let bad = Region::new(vec![NumericData::value(f64::NAN)]);
        assert!(matches!(bad.validate(1), Err(IndexError::InvalidRegion(_))));
    }
}
