//! Byte-lexicographic key and identifier type.
//!
//! `ByteKey` is the single identifier currency across the index layer:
//! adapter ids, field ids, data ids, partition keys, and sort keys are all
//! byte sequences compared lexicographically. Ordering by raw bytes is what
//! makes encoded bin coordinates sort like numbers (see
//! [`crate::strategy::GridIndexStrategy`]).

use std::fmt;
use std::sync::Arc;

/// An immutable byte sequence with byte-lexicographic ordering.
///
/// Cheap to clone (`Arc`-backed); equality, ordering, and hashing are all
/// over the raw bytes.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteKey(Arc<[u8]>);

impl ByteKey {
    /// Create a key from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        ByteKey(bytes.into().into())
    }

    /// The empty key. Sorts before every non-empty key.
    pub fn empty() -> Self {
        ByteKey(Arc::from(&[][..]))
    }

    /// Raw bytes of this key.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy out the bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Render as UTF-8 if the bytes are printable, hex otherwise.
    ///
    /// Keys are frequently human-assigned names ("geometry", "point") but
    /// sort keys are packed binary; log output needs to handle both.
    pub fn render(&self) -> String {
        match std::str::from_utf8(&self.0) {
            Ok(s) if s.chars().all(|c| !c.is_control()) => s.to_string(),
            _ => self
                .0
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<String>(),
        }
    }
}

impl fmt::Debug for ByteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteKey({})", self.render())
    }
}

impl fmt::Display for ByteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for ByteKey {
    fn from(s: &str) -> Self {
        ByteKey::new(s.as_bytes().to_vec())
    }
}

impl From<String> for ByteKey {
    fn from(s: String) -> Self {
        ByteKey::new(s.into_bytes())
    }
}

impl From<Vec<u8>> for ByteKey {
    fn from(v: Vec<u8>) -> Self {
        ByteKey::new(v)
    }
}

impl From<&[u8]> for ByteKey {
    fn from(v: &[u8]) -> Self {
        ByteKey::new(v.to_vec())
    }
}

impl AsRef<[u8]> for ByteKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexicographic_ordering() {
        let a = ByteKey::new(vec![0x00, 0x01]);
        let b = ByteKey::new(vec![0x00, 0x02]);
        let c = ByteKey::new(vec![0x01]);
        let d = ByteKey::new(vec![0x00, 0x01, 0x00]);

        assert!(a < b);
        assert!(b < c);
        assert!(a < d);
        assert!(d < b);
        assert!(ByteKey::empty() < a);
    }

    #[test]
    fn test_render_printable_and_binary() {
        assert_eq!(ByteKey::from("geometry").render(), "geometry");
        assert_eq!(ByteKey::new(vec![0x00, 0xff]).render(), "00ff");
    }

    #[test]
    fn test_equality_and_hash_by_bytes() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(ByteKey::from("a"));
        set.insert(ByteKey::new(vec![b'a']));
        assert_eq!(set.len(), 1);
    }
}
