//! Index models and primary indexes.
//!
//! An [`IndexModel`] is the canonical field-position ordering shared by the
//! record codec and the index strategy: index dimensions first, in the
//! index's fixed dimension order. A [`PrimaryIndex`] binds an identifier to
//! a strategy and its model; it is created at schema-definition time and
//! referenced, never mutated, by every read and write touching that layout.

use crate::error::{Result, StoreError};
use lattice_index::{
    strategy_from_binary, ByteKey, NumericData, NumericIndexStrategy, Region,
};
use std::sync::Arc;

/// Canonical ordering of the common index fields of one index.
///
/// Multiple dimensions may carry the same field id (a geometry field feeding
/// two axes); position lookups return the first matching dimension, matching
/// the codec's ordinal contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexModel {
    dimension_fields: Vec<ByteKey>,
}

impl IndexModel {
    /// Build a model from dimension field ids, in dimension order.
    pub fn new(dimension_fields: Vec<ByteKey>) -> Self {
        IndexModel { dimension_fields }
    }

    /// Dimension field ids in index order.
    pub fn dimension_fields(&self) -> &[ByteKey] {
        &self.dimension_fields
    }

    /// Number of dimensions.
    pub fn dimension_count(&self) -> usize {
        self.dimension_fields.len()
    }

    /// Ordinal of the first dimension carrying `field_id`.
    pub fn position_of(&self, field_id: &ByteKey) -> Option<usize> {
        self.dimension_fields.iter().position(|f| f == field_id)
    }

    /// Field id at a dimension ordinal.
    pub fn field_at(&self, position: usize) -> Option<&ByteKey> {
        self.dimension_fields.get(position)
    }
}

/// One physical key layout: an identifier, an index strategy, and the
/// derived field model.
#[derive(Clone)]
pub struct PrimaryIndex {
    id: ByteKey,
    strategy: Arc<dyn NumericIndexStrategy>,
    model: IndexModel,
}

impl PrimaryIndex {
    /// Bind an identifier to a strategy.
    pub fn new(id: impl Into<ByteKey>, strategy: Arc<dyn NumericIndexStrategy>) -> Self {
        let model = IndexModel::new(
            strategy
                .dimensions()
                .iter()
                .map(|d| d.field_id.clone())
                .collect(),
        );
        PrimaryIndex {
            id: id.into(),
            strategy,
            model,
        }
    }

    /// Index identifier.
    pub fn id(&self) -> &ByteKey {
        &self.id
    }

    /// The index strategy.
    pub fn strategy(&self) -> &Arc<dyn NumericIndexStrategy> {
        &self.strategy
    }

    /// The canonical field model.
    pub fn model(&self) -> &IndexModel {
        &self.model
    }

    /// The region spanning the full declared range of every dimension.
    ///
    /// Used for full scans (statistics recomputation).
    pub fn full_region(&self) -> Region {
        Region::new(
            self.strategy
                .dimensions()
                .iter()
                .map(|d| NumericData::range(d.min, d.max))
                .collect(),
        )
    }

    /// Serialize identifier + strategy configuration.
    pub fn to_binary(&self) -> Vec<u8> {
        let strategy = self.strategy.to_binary();
        let mut buf = Vec::with_capacity(2 + self.id.len() + strategy.len());
        buf.extend_from_slice(&(self.id.len() as u16).to_le_bytes());
        buf.extend_from_slice(self.id.as_bytes());
        buf.extend_from_slice(&strategy);
        buf
    }

    /// Reconstruct an index from [`to_binary`](Self::to_binary) output.
    pub fn from_binary(data: &[u8]) -> Result<PrimaryIndex> {
        if data.len() < 2 {
            return Err(StoreError::Format("truncated index blob".to_string()));
        }
        let id_len = u16::from_le_bytes(data[0..2].try_into().unwrap()) as usize;
        if data.len() < 2 + id_len {
            return Err(StoreError::Format("truncated index id".to_string()));
        }
        let id = ByteKey::new(data[2..2 + id_len].to_vec());
        let strategy = strategy_from_binary(&data[2 + id_len..])?;
        Ok(PrimaryIndex::new(id, strategy))
    }
}

impl std::fmt::Debug for PrimaryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimaryIndex")
            .field("id", &self.id)
            .field("strategy", &self.strategy.id())
            .field("dimensions", &self.model.dimension_count())
            .finish()
    }
}
