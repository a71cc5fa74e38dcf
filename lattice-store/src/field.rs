//! Field value codec primitives.
//!
//! Every stored field is a tagged value with a per-kind binary form. The
//! original design dispatched reader/writer implementations through runtime
//! type lookups keyed by field id; here the handler variants are a tagged
//! enum resolved once per schema load, and adapters resolve a
//! [`FieldReader`]/[`FieldWriter`] by field id. Unknown field ids resolve to
//! `None` rather than an error, so unrecognized fields can be round-tripped
//! opaquely.
//!
//! # Wire format
//!
//! ```text
//! tag: u8 (1=u64, 2=i64, 3=f64, 4=bool, 5=text, 6=bytes)
//! payload:
//!   u64/i64/f64: 8 bytes (LE)
//!   bool: 1 byte
//!   text/bytes: u32 (LE) length + data
//! ```

use crate::error::{Result, StoreError};

/// The kind of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U64,
    I64,
    F64,
    Bool,
    Text,
    Bytes,
}

impl FieldKind {
    /// Stable wire tag for this kind, used when a field handler's
    /// configuration is shipped to a remote execution context.
    pub fn tag(self) -> u8 {
        match self {
            FieldKind::U64 => 1,
            FieldKind::I64 => 2,
            FieldKind::F64 => 3,
            FieldKind::Bool => 4,
            FieldKind::Text => 5,
            FieldKind::Bytes => 6,
        }
    }

    /// Inverse of [`tag`](Self::tag).
    pub fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            1 => FieldKind::U64,
            2 => FieldKind::I64,
            3 => FieldKind::F64,
            4 => FieldKind::Bool,
            5 => FieldKind::Text,
            6 => FieldKind::Bytes,
            other => {
                return Err(StoreError::Format(format!(
                    "unknown field value tag {other}"
                )))
            }
        })
    }
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    U64(u64),
    I64(i64),
    F64(f64),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// The kind of this value.
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::U64(_) => FieldKind::U64,
            FieldValue::I64(_) => FieldKind::I64,
            FieldValue::F64(_) => FieldKind::F64,
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Bytes(_) => FieldKind::Bytes,
        }
    }

    /// Numeric view of the value, if it has one. Used by range statistics.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::U64(v) => Some(*v as f64),
            FieldValue::I64(v) => Some(*v as f64),
            FieldValue::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Text view of the value, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Serialize to the tagged wire form.
    pub fn to_binary(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(9);
        buf.push(self.kind().tag());
        match self {
            FieldValue::U64(v) => buf.extend_from_slice(&v.to_le_bytes()),
            FieldValue::I64(v) => buf.extend_from_slice(&v.to_le_bytes()),
            FieldValue::F64(v) => buf.extend_from_slice(&v.to_le_bytes()),
            FieldValue::Bool(v) => buf.push(u8::from(*v)),
            FieldValue::Text(s) => {
                buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
                buf.extend_from_slice(s.as_bytes());
            }
            FieldValue::Bytes(b) => {
                buf.extend_from_slice(&(b.len() as u32).to_le_bytes());
                buf.extend_from_slice(b);
            }
        }
        buf
    }

    /// Parse from the tagged wire form.
    pub fn from_binary(data: &[u8]) -> Result<FieldValue> {
        let (&tag, rest) = data
            .split_first()
            .ok_or_else(|| StoreError::Format("empty field value".to_string()))?;
        let kind = FieldKind::from_tag(tag)?;
        let fixed = |n: usize| -> Result<&[u8]> {
            if rest.len() < n {
                Err(StoreError::Format(format!(
                    "truncated field value (need {n} bytes, have {})",
                    rest.len()
                )))
            } else {
                Ok(&rest[..n])
            }
        };
        Ok(match kind {
            FieldKind::U64 => FieldValue::U64(u64::from_le_bytes(fixed(8)?.try_into().unwrap())),
            FieldKind::I64 => FieldValue::I64(i64::from_le_bytes(fixed(8)?.try_into().unwrap())),
            FieldKind::F64 => FieldValue::F64(f64::from_le_bytes(fixed(8)?.try_into().unwrap())),
            FieldKind::Bool => FieldValue::Bool(fixed(1)?[0] != 0),
            FieldKind::Text | FieldKind::Bytes => {
                let len = u32::from_le_bytes(fixed(4)?.try_into().unwrap()) as usize;
                if rest.len() < 4 + len {
                    return Err(StoreError::Format("truncated field payload".to_string()));
                }
                let payload = &rest[4..4 + len];
                if kind == FieldKind::Text {
                    FieldValue::Text(
                        std::str::from_utf8(payload)
                            .map_err(|e| {
                                StoreError::Format(format!("invalid UTF-8 in text field: {e}"))
                            })?
                            .to_string(),
                    )
                } else {
                    FieldValue::Bytes(payload.to_vec())
                }
            }
        })
    }
}

/// Binary decoder for one field, resolved by field id from an adapter.
#[derive(Debug, Clone, Copy)]
pub struct FieldReader {
    kind: FieldKind,
}

impl FieldReader {
    /// A reader expecting values of `kind`.
    pub fn new(kind: FieldKind) -> Self {
        FieldReader { kind }
    }

    /// Decode a value, verifying it has the declared kind.
    pub fn read(&self, data: &[u8]) -> Result<FieldValue> {
        let value = FieldValue::from_binary(data)?;
        if value.kind() != self.kind {
            return Err(StoreError::Format(format!(
                "field kind mismatch: declared {:?}, stored {:?}",
                self.kind,
                value.kind()
            )));
        }
        Ok(value)
    }
}

/// Binary encoder for one field, resolved by field id from an adapter.
#[derive(Debug, Clone, Copy)]
pub struct FieldWriter {
    kind: FieldKind,
}

impl FieldWriter {
    /// A writer expecting values of `kind`.
    pub fn new(kind: FieldKind) -> Self {
        FieldWriter { kind }
    }

    /// Encode a value, verifying it has the declared kind.
    pub fn write(&self, value: &FieldValue) -> Result<Vec<u8>> {
        if value.kind() != self.kind {
            return Err(StoreError::Format(format!(
                "field kind mismatch: declared {:?}, got {:?}",
                self.kind,
                value.kind()
            )));
        }
        Ok(value.to_binary())
    }
}
