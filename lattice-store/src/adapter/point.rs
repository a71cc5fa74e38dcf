//! Built-in adapter for 2-D point records.
//!
//! `PointRecord` is the reference record type used by the CLI, the ingest
//! plugins, and the test suites: an identified point in a two-axis plane
//! with an optional label. Its adapter demonstrates the fan-out of one
//! logical index field ("location") into two stored fields ("x", "y").

use super::{
    DataAdapter, IndexFieldHandler, IndexValue, NativeFieldHandler, RowBuilder,
};
use crate::error::Result;
use crate::field::{FieldKind, FieldReader, FieldValue, FieldWriter};
use crate::stats::{
    numeric_range_statistics_id, CountStatistics, DataStatistics, NumericRangeStatistics,
    StatisticsId, StatisticsProvider, COUNT_STATISTICS_ID,
};
use lattice_index::{ByteKey, NumericData};

/// The common index field fed by a point's coordinates.
pub const LOCATION_FIELD: &str = "location";
/// Stored field for the first axis.
pub const X_FIELD: &str = "x";
/// Stored field for the second axis.
pub const Y_FIELD: &str = "y";
/// Stored field for the optional label.
pub const LABEL_FIELD: &str = "label";
/// External adapter identifier.
pub const POINT_ADAPTER_ID: &str = "point";

/// An identified point with an optional label.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRecord {
    /// Natural primary key within the point adapter's namespace.
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub label: Option<String>,
}

impl PointRecord {
    /// Create a labeled point.
    pub fn new(id: impl Into<String>, x: f64, y: f64) -> Self {
        PointRecord {
            id: id.into(),
            x,
            y,
            label: None,
        }
    }

    /// Attach a label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

struct LocationHandler {
    field_id: ByteKey,
}

impl IndexFieldHandler<PointRecord> for LocationHandler {
    fn index_field_id(&self) -> &ByteKey {
        &self.field_id
    }

    fn native_field_ids(&self) -> Vec<ByteKey> {
        vec![ByteKey::from(X_FIELD), ByteKey::from(Y_FIELD)]
    }

    fn to_index_value(&self, entry: &PointRecord) -> IndexValue {
        IndexValue {
            field_id: self.field_id.clone(),
            data: vec![NumericData::value(entry.x), NumericData::value(entry.y)],
        }
    }

    fn to_native_values(&self, value: &IndexValue) -> Vec<(ByteKey, FieldValue)> {
        let x = value.data.first().map_or(0.0, |d| d.min());
        let y = value.data.get(1).map_or(0.0, |d| d.min());
        vec![
            (ByteKey::from(X_FIELD), FieldValue::F64(x)),
            (ByteKey::from(Y_FIELD), FieldValue::F64(y)),
        ]
    }
}

struct LabelHandler {
    field_id: ByteKey,
}

impl NativeFieldHandler<PointRecord> for LabelHandler {
    fn field_id(&self) -> &ByteKey {
        &self.field_id
    }

    fn field_value(&self, entry: &PointRecord) -> FieldValue {
        FieldValue::Text(entry.label.clone().unwrap_or_default())
    }
}

/// Adapter for [`PointRecord`].
pub struct PointAdapter {
    adapter_id: ByteKey,
    index_handlers: Vec<Box<dyn IndexFieldHandler<PointRecord>>>,
    native_handlers: Vec<Box<dyn NativeFieldHandler<PointRecord>>>,
}

impl PointAdapter {
    /// Create the point adapter.
    pub fn new() -> Self {
        PointAdapter {
            adapter_id: ByteKey::from(POINT_ADAPTER_ID),
            index_handlers: vec![Box::new(LocationHandler {
                field_id: ByteKey::from(LOCATION_FIELD),
            })],
            native_handlers: vec![Box::new(LabelHandler {
                field_id: ByteKey::from(LABEL_FIELD),
            })],
        }
    }
}

impl Default for PointAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct PointBuilder {
    x: Option<f64>,
    y: Option<f64>,
    label: Option<String>,
}

impl RowBuilder<PointRecord> for PointBuilder {
    fn set_field(&mut self, field_id: &ByteKey, value: FieldValue) {
        if field_id == &ByteKey::from(X_FIELD) {
            self.x = value.as_f64();
        } else if field_id == &ByteKey::from(Y_FIELD) {
            self.y = value.as_f64();
        } else if field_id == &ByteKey::from(LABEL_FIELD) {
            self.label = value.as_text().map(str::to_string);
        }
    }

    fn build(&mut self, data_id: &ByteKey) -> Result<PointRecord> {
        Ok(PointRecord {
            id: data_id.render(),
            x: self.x.take().unwrap_or(0.0),
            y: self.y.take().unwrap_or(0.0),
            label: self.label.take().filter(|l| !l.is_empty()),
        })
    }
}

impl DataAdapter<PointRecord> for PointAdapter {
    fn adapter_id(&self) -> &ByteKey {
        &self.adapter_id
    }

    fn data_id(&self, entry: &PointRecord) -> ByteKey {
        ByteKey::from(entry.id.as_str())
    }

    fn is_supported(&self, entry: &PointRecord) -> bool {
        entry.x.is_finite() && entry.y.is_finite()
    }

    fn index_field_handlers(&self) -> &[Box<dyn IndexFieldHandler<PointRecord>>] {
        &self.index_handlers
    }

    fn native_field_handlers(&self) -> &[Box<dyn NativeFieldHandler<PointRecord>>] {
        &self.native_handlers
    }

    fn field_reader(&self, field_id: &ByteKey) -> Option<FieldReader> {
        match field_id.render().as_str() {
            X_FIELD | Y_FIELD => Some(FieldReader::new(FieldKind::F64)),
            LABEL_FIELD => Some(FieldReader::new(FieldKind::Text)),
            _ => None,
        }
    }

    fn field_writer(&self, field_id: &ByteKey) -> Option<FieldWriter> {
        match field_id.render().as_str() {
            X_FIELD | Y_FIELD => Some(FieldWriter::new(FieldKind::F64)),
            LABEL_FIELD => Some(FieldWriter::new(FieldKind::Text)),
            _ => None,
        }
    }

    fn builder(&self) -> Box<dyn RowBuilder<PointRecord>> {
        Box::new(PointBuilder::default())
    }
}

impl StatisticsProvider for PointAdapter {
    fn supported_statistics(&self) -> Vec<StatisticsId> {
        vec![
            ByteKey::from(COUNT_STATISTICS_ID),
            numeric_range_statistics_id(&ByteKey::from(X_FIELD)),
            numeric_range_statistics_id(&ByteKey::from(Y_FIELD)),
        ]
    }

    fn create_statistics(&self, id: &StatisticsId) -> Option<Box<dyn DataStatistics>> {
        if id == &ByteKey::from(COUNT_STATISTICS_ID) {
            return Some(Box::new(CountStatistics::new()));
        }
        for field in [X_FIELD, Y_FIELD] {
            let field = ByteKey::from(field);
            if id == &numeric_range_statistics_id(&field) {
                return Some(Box::new(NumericRangeStatistics::new(field)));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::DataAdapter;

    #[test]
    fn test_index_value_fans_out() {
        let adapter = PointAdapter::new();
        let record = PointRecord::new("p1", 3.0, -4.5);
        let handler = &adapter.index_field_handlers()[0];

        let value = handler.to_index_value(&record);
        assert_eq!(value.data.len(), 2);

        let natives = handler.to_native_values(&value);
        assert_eq!(
            natives,
            vec![
                (ByteKey::from(X_FIELD), FieldValue::F64(3.0)),
                (ByteKey::from(Y_FIELD), FieldValue::F64(-4.5)),
            ]
        );
    }

    #[test]
    fn test_roundtrip_through_builder() {
        let adapter = PointAdapter::new();
        let record = PointRecord::new("p7", 10.5, 20.25).with_label("depot");

        let mut fields = Vec::new();
        for handler in adapter.index_field_handlers() {
            let value = handler.to_index_value(&record);
            fields.extend(handler.to_native_values(&value));
        }
        for handler in adapter.native_field_handlers() {
            fields.push((handler.field_id().clone(), handler.field_value(&record)));
        }

        let mut builder = adapter.builder();
        builder.set_fields(&fields);
        let rebuilt = builder.build(&adapter.data_id(&record)).unwrap();
        assert_eq!(rebuilt, record);
    }

    #[test]
    fn test_is_supported_rejects_non_finite() {
        let adapter = PointAdapter::new();
        assert!(adapter.is_supported(&PointRecord::new("a", 0.0, 0.0)));
        assert!(!adapter.is_supported(&PointRecord::new("b", f64::NAN, 0.0)));
    }

    #[test]
    fn test_unknown_field_has_no_reader() {
        let adapter = PointAdapter::new();
        assert!(adapter.field_reader(&ByteKey::from("mystery")).is_none());
        assert!(adapter.field_writer(&ByteKey::from("mystery")).is_none());
    }
}
