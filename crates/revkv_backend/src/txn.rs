//! Conditional atomic write batches.

use crate::error::{BackendError, BackendResult};
use crate::item::{Item, Revision};
use crate::key::Key;

/// Maximum number of [`ConditionalAction`] entries in one atomic write.
///
/// The bound sits comfortably inside common engine transaction ceilings
/// (etcd ships with a 128-operation transaction limit by default).
/// Enforcement is exact: a batch of this size commits, one entry more is
/// rejected before touching storage.
pub const MAX_ATOMIC_WRITE_SIZE: usize = 64;

/// A predicate over the current state of one key.
///
/// Conditions are pure: evaluating one never changes state, and the
/// evaluation order within a batch cannot affect the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Always holds, regardless of the key's state.
    Whatever,
    /// Holds iff the key is absent (an expired item counts as absent).
    NotExists,
    /// Holds iff the key exists and its current revision equals the
    /// token. Any mismatch fails, including the key having been deleted
    /// and recreated since the token was observed.
    Revision(Revision),
}

/// A mutation to apply to one key if every condition in the batch holds.
#[derive(Debug, Clone)]
pub enum Action {
    /// Upsert the key with the item's value and expiry.
    ///
    /// The key and revision fields of the supplied item are ignored; the
    /// action binds to its [`ConditionalAction`]'s key, and the revision
    /// is assigned at commit.
    Put(Item),
    /// Remove the key. Removing an absent key is not an error.
    Delete,
    /// Change nothing. Used to gate the batch on this key's condition.
    Nop,
}

/// One entry of an atomic write batch: a key, a predicate on that key's
/// current state, and the mutation to apply if the whole batch commits.
#[derive(Debug, Clone)]
pub struct ConditionalAction {
    /// The key the condition and action bind to.
    pub key: Key,
    /// Predicate that must hold for the batch to commit.
    pub condition: Condition,
    /// Mutation applied when every predicate in the batch holds.
    pub action: Action,
}

impl ConditionalAction {
    /// Creates a conditional action.
    pub fn new(key: impl Into<Key>, condition: Condition, action: Action) -> Self {
        Self {
            key: key.into(),
            condition,
            action,
        }
    }
}

/// Validates an atomic write batch before any storage is touched.
///
/// # Errors
///
/// Returns [`BackendError::BadParameter`] if the batch is empty or has
/// more than [`MAX_ATOMIC_WRITE_SIZE`] entries. Both are caller bugs,
/// not retryable outcomes.
pub fn validate_batch(batch: &[ConditionalAction]) -> BackendResult<()> {
    if batch.is_empty() {
        return Err(BackendError::bad_parameter("atomic write batch is empty"));
    }
    if batch.len() > MAX_ATOMIC_WRITE_SIZE {
        return Err(BackendError::bad_parameter(format!(
            "atomic write batch has {} entries, limit is {}",
            batch.len(),
            MAX_ATOMIC_WRITE_SIZE
        )));
    }
    Ok(())
}
