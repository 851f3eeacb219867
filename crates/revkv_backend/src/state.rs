//! Shared key/value state and the conditional-action evaluator.
//!
//! Both adapters keep their live data in a [`KvState`] and rely on the
//! adapter's own lock for thread safety; nothing in here synchronizes.
//! Keeping the evaluator in one place guarantees the two adapters agree
//! on every edge of the atomic-write contract.

use crate::error::{BackendError, BackendResult};
use crate::item::{Item, Revision};
use crate::key::Key;
use crate::txn::{Action, Condition, ConditionalAction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::time::SystemTime;

/// One stored value with its bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Entry {
    pub(crate) value: Vec<u8>,
    pub(crate) revision: Revision,
    pub(crate) expires: Option<SystemTime>,
}

impl Entry {
    fn expired(&self, now: SystemTime) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    fn to_item(&self, key: &Key) -> Item {
        Item {
            key: key.clone(),
            value: self.value.clone(),
            revision: self.revision,
            expires: self.expires,
        }
    }
}

/// The whole keyspace: a bytewise-ordered map of live entries.
///
/// Expired entries are indistinguishable from absent ones at this layer's
/// surface; they are dropped lazily when a mutation runs into them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct KvState {
    entries: BTreeMap<Key, Entry>,
}

impl KvState {
    /// Number of entries, including not-yet-collected expired ones.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn live(&self, key: &Key, now: SystemTime) -> Option<&Entry> {
        self.entries.get(key).filter(|entry| !entry.expired(now))
    }

    pub(crate) fn get(&self, key: &Key, now: SystemTime) -> BackendResult<Item> {
        self.live(key, now)
            .map(|entry| entry.to_item(key))
            .ok_or_else(|| BackendError::not_found(key.clone()))
    }

    /// Upserts the item's key and returns the assigned revision.
    ///
    /// Honors the item's key, value, and expiry; the revision field on
    /// the input is ignored.
    pub(crate) fn put(&mut self, item: Item) -> Revision {
        let revision = Revision::generate();
        self.entries.insert(
            item.key,
            Entry {
                value: item.value,
                revision,
                expires: item.expires,
            },
        );
        revision
    }

    pub(crate) fn delete(&mut self, key: &Key, now: SystemTime) -> BackendResult<()> {
        match self.entries.get(key) {
            Some(entry) if !entry.expired(now) => {
                self.entries.remove(key);
                Ok(())
            }
            Some(_) => {
                // Collect the expired entry while we are here.
                self.entries.remove(key);
                Err(BackendError::not_found(key.clone()))
            }
            None => Err(BackendError::not_found(key.clone())),
        }
    }

    pub(crate) fn get_range(
        &self,
        start: &Key,
        end: &Key,
        limit: usize,
        now: SystemTime,
    ) -> BackendResult<Vec<Item>> {
        if start > end {
            return Err(BackendError::bad_parameter("range start is after range end"));
        }
        let bounds = (Bound::Included(start.clone()), Bound::Included(end.clone()));
        let mut items = Vec::new();
        for (key, entry) in self.entries.range(bounds) {
            if entry.expired(now) {
                continue;
            }
            items.push(entry.to_item(key));
            if limit != 0 && items.len() == limit {
                break;
            }
        }
        Ok(items)
    }

    /// Removes every key in the inclusive range, expired entries included.
    pub(crate) fn delete_range(&mut self, start: &Key, end: &Key) -> BackendResult<()> {
        if start > end {
            return Err(BackendError::bad_parameter("range start is after range end"));
        }
        let bounds = (Bound::Included(start.clone()), Bound::Included(end.clone()));
        let doomed: Vec<Key> = self
            .entries
            .range(bounds)
            .map(|(key, _)| key.clone())
            .collect();
        for key in doomed {
            self.entries.remove(&key);
        }
        Ok(())
    }

    fn holds(&self, condition: &Condition, key: &Key, now: SystemTime) -> bool {
        match condition {
            Condition::Whatever => true,
            Condition::NotExists => self.live(key, now).is_none(),
            Condition::Revision(expected) => self
                .live(key, now)
                .is_some_and(|entry| entry.revision == *expected),
        }
    }

    /// Evaluates and applies an atomic write batch.
    ///
    /// Every condition is checked against the pre-batch state before any
    /// action runs; a single failing condition aborts the whole batch
    /// with no state change. On commit, every put and delete in the
    /// batch shares one freshly minted revision, which is returned.
    ///
    /// Conditions are pure predicates, so their evaluation order cannot
    /// change the outcome. Actions apply in batch order; where one batch
    /// names a key twice, the later action wins.
    ///
    /// The caller is responsible for batch validation (size bounds) and
    /// for holding whatever lock makes this call exclusive.
    pub(crate) fn atomic_write(
        &mut self,
        batch: Vec<ConditionalAction>,
        now: SystemTime,
    ) -> BackendResult<Revision> {
        for entry in &batch {
            if !self.holds(&entry.condition, &entry.key, now) {
                return Err(BackendError::ConditionFailed);
            }
        }

        let revision = Revision::generate();
        for entry in batch {
            match entry.action {
                Action::Put(item) => {
                    // The action binds to the conditional action's key;
                    // the item's own key and revision are ignored.
                    self.entries.insert(
                        entry.key,
                        Entry {
                            value: item.value,
                            revision,
                            expires: item.expires,
                        },
                    );
                }
                Action::Delete => {
                    self.entries.remove(&entry.key);
                }
                Action::Nop => {}
            }
        }
        Ok(revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn now() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_000)
    }

    #[test]
    fn put_then_get_roundtrips() {
        let mut state = KvState::default();
        let revision = state.put(Item::new("/a", b"v".to_vec()));

        let item = state.get(&Key::from("/a"), now()).unwrap();
        assert_eq!(item.value, b"v");
        assert_eq!(item.revision, revision);
        assert_eq!(item.key, Key::from("/a"));
    }

    #[test]
    fn put_assigns_fresh_revision_each_time() {
        let mut state = KvState::default();
        let r1 = state.put(Item::new("/a", b"v1".to_vec()));
        let r2 = state.put(Item::new("/a", b"v1".to_vec()));
        assert_ne!(r1, r2);
    }

    #[test]
    fn delete_missing_key_is_not_found() {
        let mut state = KvState::default();
        let err = state.delete(&Key::from("/nope"), now()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn expired_entry_reads_as_absent() {
        let mut state = KvState::default();
        let t0 = now();
        state.put(Item::new("/a", b"v".to_vec()).with_expiry(t0 + Duration::from_secs(5)));

        assert!(state.get(&Key::from("/a"), t0).is_ok());
        let err = state
            .get(&Key::from("/a"), t0 + Duration::from_secs(5))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn not_exists_holds_for_expired_entry() {
        let mut state = KvState::default();
        let t0 = now();
        state.put(Item::new("/a", b"v".to_vec()).with_expiry(t0 + Duration::from_secs(1)));

        let later = t0 + Duration::from_secs(2);
        assert!(state.holds(&Condition::NotExists, &Key::from("/a"), later));
        assert!(!state.holds(&Condition::NotExists, &Key::from("/a"), t0));
    }

    #[test]
    fn revision_condition_fails_after_recreate() {
        let mut state = KvState::default();
        let first = state.put(Item::new("/a", b"v1".to_vec()));
        state.delete(&Key::from("/a"), now()).unwrap();
        state.put(Item::new("/a", b"v1".to_vec()));

        assert!(!state.holds(&Condition::Revision(first), &Key::from("/a"), now()));
    }

    #[test]
    fn failed_batch_changes_nothing() {
        let mut state = KvState::default();
        let revision = state.put(Item::new("/a", b"old".to_vec()));

        let batch = vec![
            ConditionalAction::new(
                "/a",
                Condition::NotExists,
                Action::Put(Item::new("", b"new".to_vec())),
            ),
            ConditionalAction::new(
                "/b",
                Condition::Whatever,
                Action::Put(Item::new("", b"b".to_vec())),
            ),
        ];
        let err = state.atomic_write(batch, now()).unwrap_err();
        assert!(err.is_condition_failed());

        let item = state.get(&Key::from("/a"), now()).unwrap();
        assert_eq!(item.value, b"old");
        assert_eq!(item.revision, revision);
        assert!(state.get(&Key::from("/b"), now()).unwrap_err().is_not_found());
    }

    #[test]
    fn committed_batch_shares_one_revision() {
        let mut state = KvState::default();
        let batch = vec![
            ConditionalAction::new(
                "/a",
                Condition::Whatever,
                Action::Put(Item::new("", b"a".to_vec())),
            ),
            ConditionalAction::new(
                "/b",
                Condition::Whatever,
                Action::Put(Item::new("", b"b".to_vec())),
            ),
        ];
        let revision = state.atomic_write(batch, now()).unwrap();

        assert_eq!(state.get(&Key::from("/a"), now()).unwrap().revision, revision);
        assert_eq!(state.get(&Key::from("/b"), now()).unwrap().revision, revision);
    }

    #[test]
    fn conditions_see_pre_batch_state() {
        // A batch that deletes /a can still gate another entry on /a
        // existing: conditions evaluate before any action runs.
        let mut state = KvState::default();
        let revision = state.put(Item::new("/a", b"v".to_vec()));

        let batch = vec![
            ConditionalAction::new("/a", Condition::Revision(revision), Action::Delete),
            ConditionalAction::new("/a", Condition::Revision(revision), Action::Nop),
        ];
        state.atomic_write(batch, now()).unwrap();
        assert!(state.get(&Key::from("/a"), now()).unwrap_err().is_not_found());
    }

    #[test]
    fn duplicate_key_last_action_wins() {
        let mut state = KvState::default();
        let batch = vec![
            ConditionalAction::new(
                "/a",
                Condition::Whatever,
                Action::Put(Item::new("", b"first".to_vec())),
            ),
            ConditionalAction::new(
                "/a",
                Condition::Whatever,
                Action::Put(Item::new("", b"second".to_vec())),
            ),
        ];
        state.atomic_write(batch, now()).unwrap();
        assert_eq!(state.get(&Key::from("/a"), now()).unwrap().value, b"second");
    }

    #[test]
    fn range_respects_bounds_and_limit() {
        let mut state = KvState::default();
        for name in ["/r/a", "/r/b", "/r/c", "/s/a"] {
            state.put(Item::new(name, b"v".to_vec()));
        }

        let all = state
            .get_range(&Key::from("/r/"), &Key::from("/r/z"), 0, now())
            .unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].key < w[1].key));

        let two = state
            .get_range(&Key::from("/r/"), &Key::from("/r/z"), 2, now())
            .unwrap();
        assert_eq!(two.len(), 2);
        assert_eq!(two[0].key, Key::from("/r/a"));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let state = KvState::default();
        let err = state
            .get_range(&Key::from("/z"), &Key::from("/a"), 0, now())
            .unwrap_err();
        assert!(matches!(err, BackendError::BadParameter { .. }));
    }

    #[test]
    fn delete_range_removes_exactly_covered_keys() {
        let mut state = KvState::default();
        for name in ["/r/a", "/r/b", "/s/a"] {
            state.put(Item::new(name, b"v".to_vec()));
        }

        state
            .delete_range(&Key::from("/r/"), &Key::from("/r/z"))
            .unwrap();
        assert!(state.get(&Key::from("/r/a"), now()).unwrap_err().is_not_found());
        assert!(state.get(&Key::from("/r/b"), now()).unwrap_err().is_not_found());
        assert!(state.get(&Key::from("/s/a"), now()).is_ok());
    }
}
