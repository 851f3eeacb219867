//! In-memory backend.

use crate::backend::Backend;
use crate::clock::{Clock, SystemClock};
use crate::context::Context;
use crate::error::BackendResult;
use crate::item::{Item, Revision};
use crate::key::Key;
use crate::state::KvState;
use crate::txn::{validate_batch, ConditionalAction};
use parking_lot::Mutex;
use std::sync::Arc;

/// An in-memory backend.
///
/// Suitable for unit tests, integration tests, and ephemeral stores that
/// don't need persistence. All state lives behind a single mutex, which
/// doubles as the linearization point: every operation - including the
/// whole check-then-apply sequence of an atomic write - runs under the
/// lock, so reads always observe the latest committed state and no
/// caller can observe a partially applied batch.
///
/// # Example
///
/// ```rust
/// use revkv_backend::{Backend, Context, Item, MemoryBackend};
///
/// let backend = MemoryBackend::new();
/// let ctx = Context::background();
///
/// let revision = backend.put(&ctx, Item::new("/greeting", b"hello".to_vec())).unwrap();
/// let item = backend.get(&ctx, &"/greeting".into()).unwrap();
/// assert_eq!(item.value, b"hello");
/// assert_eq!(item.revision, revision);
/// ```
pub struct MemoryBackend {
    state: Mutex<KvState>,
    clock: Arc<dyn Clock>,
}

impl MemoryBackend {
    /// Creates an empty backend on the OS clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty backend on the given clock.
    ///
    /// Tests pass a [`crate::ManualClock`] here to drive expiry
    /// deterministically.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(KvState::default()),
            clock,
        }
    }

    /// Number of stored entries, counting expired ones not yet collected.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    /// Checks whether the backend holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

impl Backend for MemoryBackend {
    fn get(&self, ctx: &Context, key: &Key) -> BackendResult<Item> {
        ctx.check()?;
        let now = self.clock.now();
        self.state.lock().get(key, now)
    }

    fn put(&self, ctx: &Context, item: Item) -> BackendResult<Revision> {
        ctx.check()?;
        Ok(self.state.lock().put(item))
    }

    fn delete(&self, ctx: &Context, key: &Key) -> BackendResult<()> {
        ctx.check()?;
        let now = self.clock.now();
        self.state.lock().delete(key, now)
    }

    fn atomic_write(
        &self,
        ctx: &Context,
        batch: Vec<ConditionalAction>,
    ) -> BackendResult<Revision> {
        ctx.check()?;
        validate_batch(&batch)?;
        let now = self.clock.now();
        self.state.lock().atomic_write(batch, now)
    }

    fn get_range(
        &self,
        ctx: &Context,
        start: &Key,
        end: &Key,
        limit: usize,
    ) -> BackendResult<Vec<Item>> {
        ctx.check()?;
        let now = self.clock.now();
        self.state.lock().get_range(start, end, limit, now)
    }

    fn delete_range(&self, ctx: &Context, start: &Key, end: &Key) -> BackendResult<()> {
        ctx.check()?;
        self.state.lock().delete_range(start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::BackendError;
    use crate::txn::{Action, Condition};
    use std::time::Duration;

    fn ctx() -> Context {
        Context::background()
    }

    #[test]
    fn get_missing_key_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend.get(&ctx(), &"/nope".into()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn put_get_delete_cycle() {
        let backend = MemoryBackend::new();
        let key = Key::from("/cycle");

        let revision = backend
            .put(&ctx(), Item::new("/cycle", b"v".to_vec()))
            .unwrap();
        let item = backend.get(&ctx(), &key).unwrap();
        assert_eq!(item.value, b"v");
        assert_eq!(item.revision, revision);

        backend.delete(&ctx(), &key).unwrap();
        assert!(backend.get(&ctx(), &key).unwrap_err().is_not_found());
        assert!(backend.delete(&ctx(), &key).unwrap_err().is_not_found());
    }

    #[test]
    fn each_put_advances_revision() {
        let backend = MemoryBackend::new();
        let r1 = backend
            .put(&ctx(), Item::new("/k", b"same".to_vec()))
            .unwrap();
        let r2 = backend
            .put(&ctx(), Item::new("/k", b"same".to_vec()))
            .unwrap();
        assert_ne!(r1, r2);
        assert_eq!(backend.get(&ctx(), &"/k".into()).unwrap().revision, r2);
    }

    #[test]
    fn atomic_write_stale_revision_fails() {
        let backend = MemoryBackend::new();
        let stale = backend.put(&ctx(), Item::new("/k", b"v1".to_vec())).unwrap();
        backend.put(&ctx(), Item::new("/k", b"v2".to_vec())).unwrap();

        let err = backend
            .atomic_write(
                &ctx(),
                vec![ConditionalAction::new(
                    "/k",
                    Condition::Revision(stale),
                    Action::Put(Item::new("", b"v3".to_vec())),
                )],
            )
            .unwrap_err();
        assert!(err.is_condition_failed());
        assert_eq!(backend.get(&ctx(), &"/k".into()).unwrap().value, b"v2");
    }

    #[test]
    fn canceled_context_aborts_before_effect() {
        let backend = MemoryBackend::new();
        let (canceled, handle) = Context::with_cancel();
        handle.cancel();

        let err = backend
            .put(&canceled, Item::new("/k", b"v".to_vec()))
            .unwrap_err();
        assert!(matches!(err, BackendError::Canceled));
        assert!(backend.get(&ctx(), &"/k".into()).unwrap_err().is_not_found());
    }

    #[test]
    fn expiry_follows_manual_clock() {
        let clock = Arc::new(ManualClock::new());
        let backend = MemoryBackend::with_clock(clock.clone());
        let deadline = clock.now() + Duration::from_secs(60);

        backend
            .put(&ctx(), Item::new("/ttl", b"v".to_vec()).with_expiry(deadline))
            .unwrap();
        assert!(backend.get(&ctx(), &"/ttl".into()).is_ok());

        clock.advance(Duration::from_secs(61));
        assert!(backend.get(&ctx(), &"/ttl".into()).unwrap_err().is_not_found());
    }

    #[test]
    fn range_operations_round_trip() {
        let backend = MemoryBackend::new();
        for name in ["/q/a", "/q/b", "/q/c"] {
            backend.put(&ctx(), Item::new(name, b"v".to_vec())).unwrap();
        }

        let items = backend
            .get_range(&ctx(), &"/q/".into(), &"/q/z".into(), 0)
            .unwrap();
        assert_eq!(items.len(), 3);

        backend
            .delete_range(&ctx(), &"/q/".into(), &"/q/b".into())
            .unwrap();
        let rest = backend
            .get_range(&ctx(), &"/q/".into(), &"/q/z".into(), 0)
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].key, Key::from("/q/c"));
    }
}
