//! Index strategies: regions in, keys and scan ranges out.
//!
//! A strategy owns the mapping between multi-dimensional numeric regions and
//! the flat key space of a sorted store. It produces *insertion ids* (every
//! (partition, sort) key pair a region must be written under) and *query
//! ranges* (contiguous scan intervals covering a query region), and it owns
//! the partitioning policy.
//!
//! The only strategy shipped here is [`GridIndexStrategy`], a row-major
//! uniform grid: each dimension contributes a fixed-width big-endian bin
//! index to the sort key, so byte order within a partition equals row-major
//! cell order.
//!
//! # Serialized form
//!
//! Strategies serialize their full configuration so a reader constructed
//! later reproduces identical encodings:
//!
//! ```text
//! LGS1 (lattice grid strategy v1)
//!
//!   magic: "LGS1" (4B)
//!   version: u8
//!   kind: u8 (1 = grid)
//!   id_len: u16 (LE) + id bytes
//!   partition_count: u16 (LE)
//!   dim_count: u16 (LE)
//!   per dimension:
//!     field_id_len: u16 (LE) + field id bytes
//!     min: f64 (LE)
//!     max: f64 (LE)
//!     bins: u32 (LE)
//!   crc32: u32 (LE) -- CRC32 of all preceding bytes
//! ```

use crate::byte_key::ByteKey;
use crate::coordinate::BinRange;
use crate::dimension::{DimensionDefinition, NumericData};
use crate::error::{IndexError, Result};
use crate::region::Region;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Magic bytes for serialized strategies.
pub const STRATEGY_MAGIC: &[u8; 4] = b"LGS1";

/// Current strategy serialization version.
pub const STRATEGY_VERSION: u8 = 1;

/// Kind tag for [`GridIndexStrategy`].
const KIND_GRID: u8 = 1;

/// Insertion keys for one record within one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinglePartitionInsertionIds {
    /// The partition these sort keys live in.
    pub partition_key: ByteKey,
    /// Sort keys within the partition, in key order.
    pub sort_keys: Vec<ByteKey>,
}

/// The full set of (partition, sort) key pairs a region is written under.
///
/// A region overlapping multiple grid cells produces one pair per cell. This
/// duplication is intentional and reconciled at read time by the dedupe
/// filter, not prevented at write time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertionIds {
    partitions: Vec<SinglePartitionInsertionIds>,
}

impl InsertionIds {
    /// An empty id set.
    pub fn empty() -> Self {
        InsertionIds::default()
    }

    /// Build from per-partition groups.
    pub fn new(partitions: Vec<SinglePartitionInsertionIds>) -> Self {
        InsertionIds { partitions }
    }

    /// Per-partition groups, ordered by partition key.
    pub fn partitions(&self) -> &[SinglePartitionInsertionIds] {
        &self.partitions
    }

    /// Total number of (partition, sort) pairs.
    pub fn len(&self) -> usize {
        self.partitions.iter().map(|p| p.sort_keys.len()).sum()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate all (partition, sort) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&ByteKey, &ByteKey)> {
        self.partitions
            .iter()
            .flat_map(|p| p.sort_keys.iter().map(move |s| (&p.partition_key, s)))
    }

    /// Union with another id set, merging per-partition groups.
    ///
    /// Used by the index-dependent writer to combine the ids of expanded
    /// sub-records into a single result for the original caller.
    pub fn union(self, other: InsertionIds) -> InsertionIds {
        let mut merged: BTreeMap<ByteKey, Vec<ByteKey>> = BTreeMap::new();
        for part in self.partitions.into_iter().chain(other.partitions) {
            let keys = merged.entry(part.partition_key).or_default();
            keys.extend(part.sort_keys);
        }
        let partitions = merged
            .into_iter()
            .map(|(partition_key, mut sort_keys)| {
                sort_keys.sort();
                sort_keys.dedup();
                SinglePartitionInsertionIds {
                    partition_key,
                    sort_keys,
                }
            })
            .collect();
        InsertionIds { partitions }
    }
}

/// An inclusive sort-key interval within one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKeyRange {
    /// First key of the scan, inclusive.
    pub start: ByteKey,
    /// Last key of the scan, inclusive.
    pub end: ByteKey,
}

impl SortKeyRange {
    /// Whether `sort_key` falls inside this interval.
    pub fn contains(&self, sort_key: &ByteKey) -> bool {
        self.start.as_bytes() <= sort_key.as_bytes() && sort_key.as_bytes() <= self.end.as_bytes()
    }
}

/// Scan intervals for one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionQueryRanges {
    /// Partition the intervals are scanned in.
    pub partition_key: ByteKey,
    /// Intervals in ascending key order.
    pub ranges: Vec<SortKeyRange>,
}

/// The decomposed scan ranges for a query region.
///
/// The union of the decoded coordinate spans is always a superset of the
/// query region; minimizing the interval count is a goal, not a correctness
/// requirement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRanges {
    partitions: Vec<PartitionQueryRanges>,
}

impl QueryRanges {
    /// Build from per-partition groups.
    pub fn new(partitions: Vec<PartitionQueryRanges>) -> Self {
        QueryRanges { partitions }
    }

    /// Per-partition groups, ordered by partition key.
    pub fn partitions(&self) -> &[PartitionQueryRanges] {
        &self.partitions
    }

    /// Total number of scan intervals.
    pub fn range_count(&self) -> usize {
        self.partitions.iter().map(|p| p.ranges.len()).sum()
    }

    /// Whether more than one interval must be scanned.
    pub fn is_multi_range(&self) -> bool {
        self.range_count() > 1
    }

    /// Iterate all (partition, interval) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&ByteKey, &SortKeyRange)> {
        self.partitions
            .iter()
            .flat_map(|p| p.ranges.iter().map(move |r| (&p.partition_key, r)))
    }
}

/// The index-strategy contract.
///
/// Implementations must be deterministic: identical input and identical
/// configuration produce identical keys, so re-insertion is idempotent.
pub trait NumericIndexStrategy: Send + Sync {
    /// Strategy identifier, embedded in the serialized form.
    fn id(&self) -> &ByteKey;

    /// The ordered dimensions of this index. Fixed for the strategy's
    /// lifetime; this order is the canonical field-position ordering.
    fn dimensions(&self) -> &[DimensionDefinition];

    /// Number of leading key bytes used as the partition key. Fixed per
    /// instance.
    fn partition_key_length(&self) -> usize;

    /// Length of every sort key this strategy produces.
    fn sort_key_length(&self) -> usize;

    /// Every (partition, sort) key pair `region` must be written under.
    fn insertion_ids(&self, region: &Region) -> Result<InsertionIds>;

    /// Decomposed scan ranges covering `region`.
    ///
    /// `max_ranges` caps the number of intervals; when the cap forces
    /// coarsening the result is still a superset of the region. `None`
    /// means no forced coarsening.
    fn query_ranges(&self, region: &Region, max_ranges: Option<usize>) -> Result<QueryRanges>;

    /// Per-dimension bin ranges `region` touches, used by filters that
    /// re-check precise overlap after a coarse scan.
    fn coordinate_ranges(&self, region: &Region) -> Result<Vec<BinRange>>;

    /// Decode a sort key back into per-dimension bin coordinates.
    fn cell_of(&self, sort_key: &ByteKey) -> Result<Vec<u32>>;

    /// Numeric span covered by a cell, one datum per dimension.
    fn cell_span(&self, cell: &[u32]) -> Result<Vec<NumericData>>;

    /// Serialize the full configuration. See the module docs for the format.
    fn to_binary(&self) -> Vec<u8>;
}

/// Row-major uniform grid strategy.
///
/// Sort keys are the concatenation of one big-endian `u32` bin index per
/// dimension. The partition key is the leading dimension's bin modulo the
/// partition count, encoded as a big-endian `u16`: every contiguous run that
/// fixes the leading dimension stays inside one partition.
#[derive(Debug, Clone, PartialEq)]
pub struct GridIndexStrategy {
    id: ByteKey,
    dimensions: Vec<DimensionDefinition>,
    partition_count: u16,
}

impl GridIndexStrategy {
    /// Create a strategy over the given dimensions.
    pub fn new(
        id: impl Into<ByteKey>,
        dimensions: Vec<DimensionDefinition>,
        partition_count: u16,
    ) -> Result<Self> {
        if dimensions.is_empty() {
            return Err(IndexError::InvalidRegion(
                "strategy requires at least one dimension".to_string(),
            ));
        }
        if partition_count == 0 {
            return Err(IndexError::InvalidRegion(
                "strategy requires at least one partition".to_string(),
            ));
        }
        Ok(GridIndexStrategy {
            id: id.into(),
            dimensions,
            partition_count,
        })
    }

    /// Number of partitions keys are spread across.
    pub fn partition_count(&self) -> u16 {
        self.partition_count
    }

    fn partition_key_of(&self, leading_bin: u32) -> ByteKey {
        let p = (leading_bin as u64 % self.partition_count as u64) as u16;
        ByteKey::new(p.to_be_bytes().to_vec())
    }

    fn sort_key_of(&self, cell: &[u32]) -> ByteKey {
        let mut bytes = Vec::with_capacity(cell.len() * 4);
        for bin in cell {
            bytes.extend_from_slice(&bin.to_be_bytes());
        }
        ByteKey::new(bytes)
    }

    /// Sort key with explicit bins for the leading dimensions and uniform
    /// fill bytes for the rest. Fill 0x00 gives the lowest possible suffix,
    /// 0xFF the highest; both are only ever used as scan bounds.
    fn padded_sort_key(&self, prefix: &[u32], ranged_bin: u32, fill: u8) -> ByteKey {
        let mut bytes = Vec::with_capacity(self.sort_key_length());
        for bin in prefix {
            bytes.extend_from_slice(&bin.to_be_bytes());
        }
        bytes.extend_from_slice(&ranged_bin.to_be_bytes());
        bytes.resize(self.sort_key_length(), fill);
        ByteKey::new(bytes)
    }

    fn bin_ranges(&self, region: &Region) -> Result<Vec<BinRange>> {
        region.validate(self.dimensions.len())?;
        self.dimensions
            .iter()
            .zip(region.data())
            .map(|(dim, datum)| dim.bins_of(datum))
            .collect()
    }

    /// Decompose a one-dimensional region: one interval per run of
    /// consecutive bins that share a partition. With a single partition this
    /// collapses to one interval.
    fn query_ranges_1d(&self, br: BinRange) -> QueryRanges {
        let mut groups: BTreeMap<ByteKey, Vec<SortKeyRange>> = BTreeMap::new();
        let mut run_start = br.min_bin;
        let mut run_partition = self.partition_key_of(br.min_bin);
        for bin in br.iter().skip(1) {
            let p = self.partition_key_of(bin);
            if p != run_partition {
                groups.entry(run_partition).or_default().push(SortKeyRange {
                    start: self.sort_key_of(&[run_start]),
                    end: self.sort_key_of(&[bin - 1]),
                });
                run_start = bin;
                run_partition = p;
            }
        }
        groups.entry(run_partition).or_default().push(SortKeyRange {
            start: self.sort_key_of(&[run_start]),
            end: self.sort_key_of(&[br.max_bin]),
        });

        QueryRanges::new(
            groups
                .into_iter()
                .map(|(partition_key, ranges)| PartitionQueryRanges {
                    partition_key,
                    ranges,
                })
                .collect(),
        )
    }
}

impl NumericIndexStrategy for GridIndexStrategy {
    fn id(&self) -> &ByteKey {
        &self.id
    }

    fn dimensions(&self) -> &[DimensionDefinition] {
        &self.dimensions
    }

    fn partition_key_length(&self) -> usize {
        2
    }

    fn sort_key_length(&self) -> usize {
        self.dimensions.len() * 4
    }

    fn insertion_ids(&self, region: &Region) -> Result<InsertionIds> {
        let bin_ranges = self.bin_ranges(region)?;
        let mut groups: BTreeMap<ByteKey, Vec<ByteKey>> = BTreeMap::new();
        for cell in CellOdometer::new(&bin_ranges) {
            let partition = self.partition_key_of(cell[0]);
            groups
                .entry(partition)
                .or_default()
                .push(self.sort_key_of(&cell));
        }
        Ok(InsertionIds::new(
            groups
                .into_iter()
                .map(|(partition_key, sort_keys)| SinglePartitionInsertionIds {
                    partition_key,
                    sort_keys,
                })
                .collect(),
        ))
    }

    fn query_ranges(&self, region: &Region, max_ranges: Option<usize>) -> Result<QueryRanges> {
        let bin_ranges = self.bin_ranges(region)?;
        let d = self.dimensions.len();
        if d == 1 {
            return Ok(self.query_ranges_1d(bin_ranges[0]));
        }

        // j is the ranged dimension: dimensions before it are enumerated
        // bin-by-bin, dimensions after it are covered by fill bytes. The
        // leading dimension is always enumerated because it determines the
        // partition, so coarsening bottoms out at j == 1.
        let mut j = d - 1;
        if let Some(cap) = max_ranges {
            let count_at = |j: usize| -> u128 {
                bin_ranges[..j].iter().map(|r| r.count() as u128).product()
            };
            while j > 1 && count_at(j) > cap as u128 {
                j -= 1;
            }
        }

        let mut groups: BTreeMap<ByteKey, Vec<SortKeyRange>> = BTreeMap::new();
        for prefix in CellOdometer::new(&bin_ranges[..j]) {
            let partition = self.partition_key_of(prefix[0]);
            let range = SortKeyRange {
                start: self.padded_sort_key(&prefix, bin_ranges[j].min_bin, 0x00),
                end: self.padded_sort_key(&prefix, bin_ranges[j].max_bin, 0xFF),
            };
            groups.entry(partition).or_default().push(range);
        }
        Ok(QueryRanges::new(
            groups
                .into_iter()
                .map(|(partition_key, ranges)| PartitionQueryRanges {
                    partition_key,
                    ranges,
                })
                .collect(),
        ))
    }

    fn coordinate_ranges(&self, region: &Region) -> Result<Vec<BinRange>> {
        self.bin_ranges(region)
    }

    fn cell_of(&self, sort_key: &ByteKey) -> Result<Vec<u32>> {
        let bytes = sort_key.as_bytes();
        if bytes.len() != self.sort_key_length() {
            return Err(IndexError::Format(format!(
                "sort key length {} does not match strategy ({} dimensions)",
                bytes.len(),
                self.dimensions.len()
            )));
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes(c.try_into().unwrap()))
            .collect())
    }

    fn cell_span(&self, cell: &[u32]) -> Result<Vec<NumericData>> {
        if cell.len() != self.dimensions.len() {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions.len(),
                actual: cell.len(),
            });
        }
        Ok(self
            .dimensions
            .iter()
            .zip(cell)
            .map(|(dim, &bin)| dim.bin_span(bin))
            .collect())
    }

    fn to_binary(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(STRATEGY_MAGIC);
        buf.push(STRATEGY_VERSION);
        buf.push(KIND_GRID);
        write_bytes(&mut buf, self.id.as_bytes());
        buf.extend_from_slice(&self.partition_count.to_le_bytes());
        buf.extend_from_slice(&(self.dimensions.len() as u16).to_le_bytes());
        for dim in &self.dimensions {
            write_bytes(&mut buf, dim.field_id.as_bytes());
            buf.extend_from_slice(&dim.min.to_le_bytes());
            buf.extend_from_slice(&dim.max.to_le_bytes());
            buf.extend_from_slice(&dim.bins.to_le_bytes());
        }
        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }
}

/// Reconstruct a strategy from its serialized form.
///
/// The kind tag selects the concrete implementation; the registry is
/// resolved here, once per load, rather than per record.
pub fn strategy_from_binary(data: &[u8]) -> Result<Arc<dyn NumericIndexStrategy>> {
    if data.len() < 10 {
        return Err(IndexError::Format("strategy blob too short".to_string()));
    }
    if &data[0..4] != STRATEGY_MAGIC {
        return Err(IndexError::Format("invalid strategy magic".to_string()));
    }
    let body = &data[..data.len() - 4];
    let expected_crc = u32::from_le_bytes(data[data.len() - 4..].try_into().unwrap());
    let actual_crc = crc32fast::hash(body);
    if actual_crc != expected_crc {
        return Err(IndexError::Format(format!(
            "strategy CRC32 mismatch: expected {expected_crc:08x}, got {actual_crc:08x}"
        )));
    }

    let mut pos = 4;
    let version = read_u8(body, &mut pos)?;
    if version != STRATEGY_VERSION {
        return Err(IndexError::Format(format!(
            "unsupported strategy version: {version}"
        )));
    }
    let kind = read_u8(body, &mut pos)?;
    if kind != KIND_GRID {
        return Err(IndexError::UnknownStrategy(ByteKey::new(vec![kind])));
    }

    let id = ByteKey::new(read_bytes(body, &mut pos)?);
    let partition_count = read_u16(body, &mut pos)?;
    let dim_count = read_u16(body, &mut pos)? as usize;
    let mut dimensions = Vec::with_capacity(dim_count);
    for _ in 0..dim_count {
        let field_id = ByteKey::new(read_bytes(body, &mut pos)?);
        let min = f64::from_le_bytes(read_array::<8>(body, &mut pos)?);
        let max = f64::from_le_bytes(read_array::<8>(body, &mut pos)?);
        let bins = read_u32(body, &mut pos)?;
        dimensions.push(DimensionDefinition::new(field_id, min, max, bins)?);
    }
    Ok(Arc::new(GridIndexStrategy::new(
        id,
        dimensions,
        partition_count,
    )?))
}

// ---- Binary helpers ----

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn ensure_len(data: &[u8], pos: usize, need: usize) -> Result<()> {
    if pos + need > data.len() {
        Err(IndexError::Format(format!(
            "truncated strategy blob (need {need} bytes at offset {pos}, have {})",
            data.len()
        )))
    } else {
        Ok(())
    }
}

fn read_u8(data: &[u8], pos: &mut usize) -> Result<u8> {
    ensure_len(data, *pos, 1)?;
    let v = data[*pos];
    *pos += 1;
    Ok(v)
}

fn read_u16(data: &[u8], pos: &mut usize) -> Result<u16> {
    Ok(u16::from_le_bytes(read_array::<2>(data, pos)?))
}

fn read_u32(data: &[u8], pos: &mut usize) -> Result<u32> {
    Ok(u32::from_le_bytes(read_array::<4>(data, pos)?))
}

fn read_array<const N: usize>(data: &[u8], pos: &mut usize) -> Result<[u8; N]> {
    ensure_len(data, *pos, N)?;
    let arr = data[*pos..*pos + N].try_into().unwrap();
    *pos += N;
    Ok(arr)
}

fn read_bytes(data: &[u8], pos: &mut usize) -> Result<Vec<u8>> {
    let len = read_u16(data, pos)? as usize;
    ensure_len(data, *pos, len)?;
    let v = data[*pos..*pos + len].to_vec();
    *pos += len;
    Ok(v)
}

/// Row-major iterator over the cells of a multi-dimensional bin box.
///
/// The last dimension varies fastest, matching sort-key order within a
/// fixed prefix.
struct CellOdometer {
    ranges: Vec<BinRange>,
    current: Vec<u32>,
    done: bool,
}

impl CellOdometer {
    fn new(ranges: &[BinRange]) -> Self {
        CellOdometer {
            ranges: ranges.to_vec(),
            current: ranges.iter().map(|r| r.min_bin).collect(),
            done: ranges.is_empty(),
        }
    }
}

impl Iterator for CellOdometer {
    type Item = Vec<u32>;

    fn next(&mut self) -> Option<Vec<u32>> {
        if self.done {
            return None;
        }
        let cell = self.current.clone();
        // advance, last dimension fastest
        let mut i = self.ranges.len();
        loop {
            if i == 0 {
                self.done = true;
                break;
            }
            i -= 1;
            if self.current[i] < self.ranges[i].max_bin {
                self.current[i] += 1;
                for j in i + 1..self.ranges.len() {
                    self.current[j] = self.ranges[j].min_bin;
                }
                break;
            }
        }
        Some(cell)
    }
}
