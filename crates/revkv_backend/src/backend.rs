//! Backend trait definition.

use crate::context::Context;
use crate::error::BackendResult;
use crate::item::{Item, Revision};
use crate::key::Key;
use crate::txn::ConditionalAction;

/// A key-value store with revision-gated atomic writes.
///
/// Implementations are called concurrently from arbitrarily many threads
/// and are the sole synchronization boundary: each operation is
/// individually atomic, and [`Backend::atomic_write`] is a serializable
/// transaction with respect to every other concurrent call.
///
/// # Invariants
///
/// - Reads are linearizable: a read issued after a committed write (by
///   any caller) observes that write. Weakly-consistent implementations
///   violate the contract and livelock retry loops under contention.
/// - Every successful mutation of a key assigns it a fresh revision;
///   all keys written by one `atomic_write` share a single revision.
/// - No operation blocks waiting for a condition to become true;
///   `atomic_write` commits or fails fast with
///   [`BackendError::ConditionFailed`].
/// - A canceled or expired [`Context`] aborts the call before any
///   effect, never mid-application.
///
/// # Implementors
///
/// - [`super::MemoryBackend`] - ephemeral, for tests and caches
/// - [`super::FileBackend`] - durable snapshot-backed store
///
/// [`BackendError::ConditionFailed`]: crate::BackendError::ConditionFailed
pub trait Backend: Send + Sync {
    /// Reads the item at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] if the key is absent or
    /// expired.
    ///
    /// [`BackendError::NotFound`]: crate::BackendError::NotFound
    fn get(&self, ctx: &Context, key: &Key) -> BackendResult<Item>;

    /// Unconditionally upserts `item` at its own key.
    ///
    /// Honors the item's key, value, and expiry; the revision field on
    /// the input is ignored. Returns the freshly assigned revision.
    ///
    /// # Errors
    ///
    /// Returns an error only on context abort or storage fault.
    fn put(&self, ctx: &Context, item: Item) -> BackendResult<Revision>;

    /// Removes the item at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] if the key is absent or
    /// expired.
    ///
    /// [`BackendError::NotFound`]: crate::BackendError::NotFound
    fn delete(&self, ctx: &Context, key: &Key) -> BackendResult<()>;

    /// Evaluates a batch of per-key conditions and, only if every one
    /// holds, applies every associated action - all invisibly to
    /// concurrent readers until commit.
    ///
    /// All puts and deletes in a committed batch receive the same new
    /// revision, which is returned. A successful call always advances
    /// the revision of every written key, even when the new value equals
    /// the old one.
    ///
    /// # Errors
    ///
    /// - [`BackendError::BadParameter`] if the batch is empty or has
    ///   more than [`MAX_ATOMIC_WRITE_SIZE`] entries; storage is not
    ///   touched.
    /// - [`BackendError::ConditionFailed`] if any condition does not
    ///   hold; no action is applied. Check with
    ///   [`BackendError::is_condition_failed`], not message text.
    ///
    /// [`BackendError::BadParameter`]: crate::BackendError::BadParameter
    /// [`BackendError::ConditionFailed`]: crate::BackendError::ConditionFailed
    /// [`BackendError::is_condition_failed`]: crate::BackendError::is_condition_failed
    /// [`MAX_ATOMIC_WRITE_SIZE`]: crate::MAX_ATOMIC_WRITE_SIZE
    fn atomic_write(&self, ctx: &Context, batch: Vec<ConditionalAction>)
        -> BackendResult<Revision>;

    /// Reads items with `start <= key <= end`, ascending by key,
    /// truncated to `limit` entries (0 means unlimited).
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::BadParameter`] if `start > end`.
    ///
    /// [`BackendError::BadParameter`]: crate::BackendError::BadParameter
    fn get_range(
        &self,
        ctx: &Context,
        start: &Key,
        end: &Key,
        limit: usize,
    ) -> BackendResult<Vec<Item>>;

    /// Removes every key with `start <= key <= end` as one atomic
    /// mutation. An empty range is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::BadParameter`] if `start > end`.
    ///
    /// [`BackendError::BadParameter`]: crate::BackendError::BadParameter
    fn delete_range(&self, ctx: &Context, start: &Key, end: &Key) -> BackendResult<()>;
}
