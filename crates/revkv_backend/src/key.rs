//! Byte-sequence keys.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A key in the store.
///
/// Keys are arbitrary byte sequences ordered bytewise. The ordering exists
/// for range operations and the internal map; it carries no semantic
/// meaning beyond that.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key(Vec<u8>);

impl Key {
    /// Creates a key from anything convertible to bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the key's bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the key, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Returns the key length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks whether the key is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl From<Vec<u8>> for Key {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Key {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_bytewise() {
        let a = Key::from("/a");
        let b = Key::from("/b");
        assert!(a < b);

        let short = Key::from("/a");
        let long = Key::from("/aa");
        assert!(short < long);
    }

    #[test]
    fn conversions_agree() {
        let from_str = Key::from("/x");
        let from_bytes = Key::from(b"/x".as_slice());
        let from_vec = Key::from(b"/x".to_vec());
        assert_eq!(from_str, from_bytes);
        assert_eq!(from_bytes, from_vec);
    }

    #[test]
    fn display_is_lossy_utf8() {
        let key = Key::new(vec![b'/', b'k', 0xff]);
        let s = format!("{key}");
        assert!(s.starts_with("/k"));
    }

    #[test]
    fn empty_key() {
        let key = Key::default();
        assert!(key.is_empty());
        assert_eq!(key.len(), 0);
    }
}
