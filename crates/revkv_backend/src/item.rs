//! Items and revision tokens.

use crate::key::Key;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;
use uuid::Uuid;

/// An opaque per-key version token.
///
/// A fresh revision is assigned on every successful mutation of a key.
/// Revisions are comparable for **equality only** - there is deliberately
/// no ordering, so callers cannot come to depend on any generation scheme.
///
/// The default (nil) revision never equals a backend-assigned one, so an
/// item constructed by a caller can never accidentally satisfy a
/// revision condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Revision(Uuid);

impl Revision {
    /// Mints a fresh, globally unique revision.
    ///
    /// Adapters call this when assigning the revision for a committed
    /// mutation; one atomic write mints exactly one revision for every
    /// key it touches.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored key-value pair.
///
/// Items returned by reads carry the key they were found at, the value,
/// the revision last assigned to that key, and the expiry if one was set.
///
/// Items supplied to writes only contribute their value and expiry; see
/// the individual operations for which fields are honored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// The key this item lives at.
    pub key: Key,
    /// The stored value.
    pub value: Vec<u8>,
    /// Version token assigned at the last mutation. Ignored on writes.
    pub revision: Revision,
    /// Absolute expiry time, if any. An expired item reads as absent.
    pub expires: Option<SystemTime>,
}

impl Item {
    /// Creates an item with no expiry and a nil revision.
    pub fn new(key: impl Into<Key>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            revision: Revision::default(),
            expires: None,
        }
    }

    /// Sets an absolute expiry time.
    #[must_use]
    pub fn with_expiry(mut self, at: SystemTime) -> Self {
        self.expires = Some(at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn generated_revisions_are_unique() {
        let r1 = Revision::generate();
        let r2 = Revision::generate();
        assert_ne!(r1, r2);
    }

    #[test]
    fn default_revision_never_matches_generated() {
        let assigned = Revision::generate();
        assert_ne!(Revision::default(), assigned);
    }

    #[test]
    fn new_item_has_nil_revision_and_no_expiry() {
        let item = Item::new("/k", b"v".to_vec());
        assert_eq!(item.revision, Revision::default());
        assert!(item.expires.is_none());
    }

    #[test]
    fn with_expiry_sets_deadline() {
        let at = UNIX_EPOCH + Duration::from_secs(1_000);
        let item = Item::new("/k", b"v".to_vec()).with_expiry(at);
        assert_eq!(item.expires, Some(at));
    }
}
