//! Randomized invariant checks for the grid strategy.
//!
//! Seeded, so failures reproduce: every insertion key must decode to a cell
//! overlapping its region, and decomposed query ranges must cover every
//! insertion key of the same region, capped or not.

use lattice_index::{
    DimensionDefinition, GridIndexStrategy, NumericData, NumericIndexStrategy, Region,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_strategy(rng: &mut StdRng) -> GridIndexStrategy {
    let dims = rng.gen_range(1..=3);
    let dimensions = (0..dims)
        .map(|i| {
            let min = rng.gen_range(-1000.0..0.0);
            let max = rng.gen_range(1.0..1000.0);
            let bins = rng.gen_range(2..40);
            DimensionDefinition::new(format!("d{i}"), min, max, bins).unwrap()
        })
        .collect();
    GridIndexStrategy::new("fuzz-grid", dimensions, rng.gen_range(1..8)).unwrap()
}

fn random_region(rng: &mut StdRng, strategy: &GridIndexStrategy) -> Region {
    Region::new(
        strategy
            .dimensions()
            .iter()
            .map(|dim| {
                let a = rng.gen_range(dim.min..=dim.max);
                if rng.gen_bool(0.5) {
                    NumericData::value(a)
                } else {
                    let b = rng.gen_range(dim.min..=dim.max);
                    NumericData::range(a, b)
                }
            })
            .collect(),
    )
}

#[test]
fn test_insertion_cells_always_overlap_region() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let strategy = random_strategy(&mut rng);
        let region = random_region(&mut rng, &strategy);
        let ids = strategy.insertion_ids(&region).unwrap();
        assert!(!ids.is_empty());

        for (_, sort_key) in ids.iter() {
            let cell = strategy.cell_of(sort_key).unwrap();
            let spans = strategy.cell_span(&cell).unwrap();
            for (span, datum) in spans.iter().zip(region.data()) {
                assert!(
                    span.overlaps(datum.min(), datum.max()),
                    "cell {cell:?} disjoint from region {region:?}"
                );
            }
        }
    }
}

#[test]
fn test_query_ranges_cover_insertions_with_and_without_cap() {
    let mut rng = StdRng::seed_from_u64(11);
    for round in 0..50 {
        let strategy = random_strategy(&mut rng);
        let region = random_region(&mut rng, &strategy);
        let ids = strategy.insertion_ids(&region).unwrap();

        for cap in [None, Some(64), Some(4), Some(1)] {
            let ranges = strategy.query_ranges(&region, cap).unwrap();
            if let Some(cap) = cap {
                // the cap is honored down to the partition-layout floor
                let floor = strategy.coordinate_ranges(&region).unwrap()[0].count() as usize;
                assert!(
                    ranges.range_count() <= cap.max(floor),
                    "round {round}: {} ranges for cap {cap}",
                    ranges.range_count()
                );
            }
            for (partition, sort_key) in ids.iter() {
                let covered = ranges
                    .iter()
                    .any(|(p, r)| p == partition && r.contains(sort_key));
                assert!(
                    covered,
                    "round {round}: insertion key not covered under cap {cap:?}"
                );
            }
        }
    }
}

#[test]
fn test_binary_roundtrip_preserves_all_outputs() {
    let mut rng = StdRng::seed_from_u64(13);
    for _ in 0..20 {
        let strategy = random_strategy(&mut rng);
        let restored = lattice_index::strategy_from_binary(&strategy.to_binary()).unwrap();
        let region = random_region(&mut rng, &strategy);
        assert_eq!(
            strategy.insertion_ids(&region).unwrap(),
            restored.insertion_ids(&region).unwrap()
        );
        assert_eq!(
            strategy.query_ranges(&region, Some(8)).unwrap(),
            restored.query_ranges(&region, Some(8)).unwrap()
        );
        assert_eq!(
            strategy.coordinate_ranges(&region).unwrap(),
            restored.coordinate_ranges(&region).unwrap()
        );
    }
}
