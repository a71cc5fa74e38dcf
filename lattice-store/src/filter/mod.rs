//! Query filters.
//!
//! Filters are polymorphic over one capability: accept or reject a decoded
//! row against an index model. A pipeline is an ordered slice of filters
//! evaluated left to right with short-circuit on the first rejection.
//!
//! Every filter serializes to bytes and reconstructs identically so it can
//! be distributed to remote execution contexts; reconstruction is
//! tag-dispatched through [`filter_from_binary`].

pub mod coordinate_range;
pub mod dedupe;

pub use coordinate_range::CoordinateRangeFilter;
pub use dedupe::DedupeFilter;

use crate::error::{Result, StoreError};
use crate::model::IndexModel;
use crate::row::RowEncoding;

/// Tag identifying a filter kind in serialized form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Dedupe = 1,
    CoordinateRange = 2,
}

/// A predicate over decoded rows.
pub trait QueryFilter: Send + Sync {
    /// Whether the row passes this filter.
    fn accept(&self, model: &IndexModel, row: &RowEncoding) -> bool;

    /// The filter's serialization tag.
    fn kind(&self) -> FilterKind;

    /// Serialize the filter's configuration (never its per-execution
    /// state).
    fn to_binary(&self) -> Vec<u8>;
}

/// Serialize a filter with its dispatch tag.
pub fn filter_to_binary(filter: &dyn QueryFilter) -> Vec<u8> {
    let payload = filter.to_binary();
    let mut buf = Vec::with_capacity(1 + payload.len());
    buf.push(filter.kind() as u8);
    buf.extend_from_slice(&payload);
    buf
}

/// Reconstruct a filter from [`filter_to_binary`] output.
pub fn filter_from_binary(data: &[u8]) -> Result<Box<dyn QueryFilter>> {
    let (&tag, payload) = data
        .split_first()
        .ok_or_else(|| StoreError::Format("empty filter blob".to_string()))?;
    match tag {
        t if t == FilterKind::Dedupe as u8 => {
            Ok(Box::new(DedupeFilter::from_binary(payload)?))
        }
        t if t == FilterKind::CoordinateRange as u8 => {
            Ok(Box::new(CoordinateRangeFilter::from_binary(payload)?))
        }
        other => Err(StoreError::Format(format!("unknown filter tag {other}"))),
    }
}

/// Evaluate a pipeline left to right, short-circuiting on first rejection.
pub fn accept_all(filters: &[Box<dyn QueryFilter>], model: &IndexModel, row: &RowEncoding) -> bool {
    filters.iter().all(|f| f.accept(model, row))
}
