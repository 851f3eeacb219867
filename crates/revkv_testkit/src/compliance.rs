//! The backend compliance suite.
//!
//! Every function here asserts one slice of the atomic-write contract
//! against an arbitrary [`Backend`]. Adapter crates run
//! [`run_compliance_suite`] against a fresh instance to prove they honor
//! the same semantics as the reference adapters. Each scenario uses its
//! own key prefix, so the whole suite can run against one backend.
//!
//! Violations panic, so the functions slot directly into `#[test]`
//! bodies.

use revkv_backend::{
    Action, Backend, Clock, Condition, ConditionalAction, Context, Item, Key, ManualClock,
    Revision, MAX_ATOMIC_WRITE_SIZE,
};
use std::thread;
use std::time::Duration;

/// Asserts the move pattern: delete the source gated on its last-read
/// revision while unconditionally putting the destination.
///
/// The first attempt commits; replaying the identical batch fails with
/// the condition-failed outcome because the source revision is stale.
pub fn verify_move<B: Backend + ?Sized>(backend: &B) {
    let ctx = Context::background();
    let val = b"cargo".to_vec();

    let revision = backend
        .put(&ctx, Item::new("/move/src", val.clone()))
        .expect("seed source");

    let batch = |revision: Revision| {
        vec![
            ConditionalAction::new("/move/src", Condition::Revision(revision), Action::Delete),
            ConditionalAction::new(
                "/move/dst",
                Condition::Whatever,
                Action::Put(Item::new("", val.clone())),
            ),
        ]
    };

    backend
        .atomic_write(&ctx, batch(revision))
        .expect("first move commits");

    let err = backend.get(&ctx, &"/move/src".into()).unwrap_err();
    assert!(err.is_not_found(), "source survived the move: {err}");
    let moved = backend.get(&ctx, &"/move/dst".into()).expect("destination");
    assert_eq!(moved.value, val);

    let err = backend.atomic_write(&ctx, batch(revision)).unwrap_err();
    assert!(
        err.is_condition_failed(),
        "replayed move must fail the condition, got: {err}"
    );
}

/// Asserts gating patterns: an update on one key conditioned on the
/// state of another, via both `NotExists` and `Revision` conditions.
pub fn verify_gating<B: Backend + ?Sized>(backend: &B) {
    let ctx = Context::background();
    let item_key = Key::from("/gate/item");
    let lock_key = Key::from("/gate/lock");

    let gated_put = |condition: Condition, value: &[u8]| {
        vec![
            ConditionalAction::new(lock_key.clone(), condition, Action::Nop),
            ConditionalAction::new(
                item_key.clone(),
                Condition::Whatever,
                Action::Put(Item::new("", value.to_vec())),
            ),
        ]
    };

    // Gate opens while the lock is absent.
    backend
        .atomic_write(&ctx, gated_put(Condition::NotExists, b"i1"))
        .expect("gate open");

    let lock_revision = backend
        .put(&ctx, Item::new("/gate/lock", b"l1".to_vec()))
        .expect("take lock");

    // Now the same batch must fail and leave the item alone.
    let err = backend
        .atomic_write(&ctx, gated_put(Condition::NotExists, b"i2"))
        .unwrap_err();
    assert!(err.is_condition_failed());
    assert_eq!(backend.get(&ctx, &item_key).unwrap().value, b"i1");

    // Gating on the lock's exact revision works while it is unchanged...
    backend
        .atomic_write(
            &ctx,
            gated_put(Condition::Revision(lock_revision), b"i3"),
        )
        .expect("revision gate");

    backend
        .put(&ctx, Item::new("/gate/lock", b"l2".to_vec()))
        .expect("bump lock");

    // ...and fails once the lock has moved on.
    let err = backend
        .atomic_write(
            &ctx,
            gated_put(Condition::Revision(lock_revision), b"i4"),
        )
        .unwrap_err();
    assert!(err.is_condition_failed());
    assert_eq!(backend.get(&ctx, &item_key).unwrap().value, b"i3");

    // Releasing the lock reopens the NotExists gate.
    backend.delete(&ctx, &lock_key).expect("release lock");
    backend
        .atomic_write(&ctx, gated_put(Condition::NotExists, b"i5"))
        .expect("gate reopened");

    backend
        .put(&ctx, Item::new("/gate/lock", b"l3".to_vec()))
        .expect("retake lock");
    let err = backend
        .atomic_write(&ctx, gated_put(Condition::NotExists, b"i6"))
        .unwrap_err();
    assert!(err.is_condition_failed());
    assert_eq!(backend.get(&ctx, &item_key).unwrap().value, b"i5");
}

/// Asserts exact enforcement of the batch size bound.
///
/// A batch one entry over the limit is rejected before touching storage;
/// truncated to the limit it commits, stamping every key with the same
/// returned revision. Also covers the all-or-nothing failure of a full
/// width batch and its revision-gated retry.
pub fn verify_batch_limit<B: Backend + ?Sized>(backend: &B) {
    let ctx = Context::background();
    let key_of = |i: usize| Key::from(format!("/limit/key-{i:03}"));

    let batch_of = |condition: fn(usize) -> Condition, value: &[u8]| -> Vec<ConditionalAction> {
        (0..=MAX_ATOMIC_WRITE_SIZE)
            .map(|i| {
                ConditionalAction::new(
                    key_of(i),
                    condition(i),
                    Action::Put(Item::new("", value.to_vec())),
                )
            })
            .collect()
    };

    // One entry over the limit: rejected up front, storage untouched.
    let oversized = batch_of(|_| Condition::NotExists, b"v1");
    assert_eq!(oversized.len(), MAX_ATOMIC_WRITE_SIZE + 1);
    backend
        .atomic_write(&ctx, oversized)
        .expect_err("oversized batch must be rejected");
    for i in 0..=MAX_ATOMIC_WRITE_SIZE {
        let err = backend.get(&ctx, &key_of(i)).unwrap_err();
        assert!(err.is_not_found(), "rejected batch touched key {i}");
    }

    // Exactly at the limit: commits, one shared revision.
    let mut batch = batch_of(|_| Condition::NotExists, b"v1");
    batch.truncate(MAX_ATOMIC_WRITE_SIZE);
    let rev1 = backend.atomic_write(&ctx, batch).expect("full-width commit");
    for i in 0..MAX_ATOMIC_WRITE_SIZE {
        let item = backend.get(&ctx, &key_of(i)).expect("committed key");
        assert_eq!(item.revision, rev1);
        assert_eq!(item.value, b"v1");
    }

    // Conditions no longer hold; the whole batch fails and nothing moves.
    let mut batch = batch_of(|_| Condition::NotExists, b"v2");
    batch.truncate(MAX_ATOMIC_WRITE_SIZE);
    let err = backend.atomic_write(&ctx, batch).unwrap_err();
    assert!(err.is_condition_failed());
    for i in 0..MAX_ATOMIC_WRITE_SIZE {
        let item = backend.get(&ctx, &key_of(i)).expect("unchanged key");
        assert_eq!(item.revision, rev1);
        assert_eq!(item.value, b"v1");
    }

    // Gated on the observed revision, the rewrite commits.
    let batch: Vec<ConditionalAction> = (0..MAX_ATOMIC_WRITE_SIZE)
        .map(|i| {
            ConditionalAction::new(
                key_of(i),
                Condition::Revision(rev1),
                Action::Put(Item::new("", b"v3".to_vec())),
            )
        })
        .collect();
    let rev2 = backend.atomic_write(&ctx, batch).expect("gated rewrite");
    for i in 0..MAX_ATOMIC_WRITE_SIZE {
        let item = backend.get(&ctx, &key_of(i)).expect("rewritten key");
        assert_eq!(item.revision, rev2);
        assert_eq!(item.value, b"v3");
    }
}

/// Asserts revision bookkeeping edge cases:
///
/// - the key embedded in a put action's item never leaks into storage,
/// - ineffectual rewrites still advance every touched key's revision,
/// - mixed put/delete and put/`Nop` batches commit as one unit.
pub fn verify_revision_semantics<B: Backend + ?Sized>(backend: &B) {
    let ctx = Context::background();
    let foo = Key::from("/rev/foo");
    let bar = Key::from("/rev/bar");
    let decoy = Key::from("/rev/decoy");

    let both = |foo_val: &[u8], bar_val: &[u8]| {
        vec![
            ConditionalAction::new(
                foo.clone(),
                Condition::Whatever,
                // The decoy key on the item must be ignored.
                Action::Put(Item::new("/rev/decoy", foo_val.to_vec())),
            ),
            ConditionalAction::new(
                bar.clone(),
                Condition::Whatever,
                Action::Put(Item::new("/rev/decoy", bar_val.to_vec())),
            ),
        ]
    };

    let rev1 = backend.atomic_write(&ctx, both(b"foo", b"bar")).unwrap();

    let foo_item = backend.get(&ctx, &foo).unwrap();
    assert_eq!(foo_item.key, foo);
    assert_eq!(foo_item.value, b"foo");
    assert_eq!(foo_item.revision, rev1);

    let bar_item = backend.get(&ctx, &bar).unwrap();
    assert_eq!(bar_item.key, bar);
    assert_eq!(bar_item.value, b"bar");
    assert_eq!(bar_item.revision, rev1);

    let err = backend.get(&ctx, &decoy).unwrap_err();
    assert!(err.is_not_found(), "decoy key was written");

    // Identical values again: the revision must still advance.
    let rev2 = backend.atomic_write(&ctx, both(b"foo", b"bar")).unwrap();
    assert_ne!(rev1, rev2);
    assert_eq!(backend.get(&ctx, &foo).unwrap().revision, rev2);
    assert_eq!(backend.get(&ctx, &bar).unwrap().revision, rev2);

    // Partially redundant: every touched key moves to the new revision.
    let rev3 = backend
        .atomic_write(&ctx, both(b"foo", b"changed"))
        .unwrap();
    assert_eq!(backend.get(&ctx, &foo).unwrap().revision, rev3);
    let bar_item = backend.get(&ctx, &bar).unwrap();
    assert_eq!(bar_item.value, b"changed");
    assert_eq!(bar_item.revision, rev3);

    // Put and delete across keys commit as one unit.
    let rev4 = backend
        .atomic_write(
            &ctx,
            vec![
                ConditionalAction::new(
                    foo.clone(),
                    Condition::Whatever,
                    Action::Put(Item::new("", b"foo".to_vec())),
                ),
                ConditionalAction::new(bar.clone(), Condition::Whatever, Action::Delete),
            ],
        )
        .unwrap();
    assert_eq!(backend.get(&ctx, &foo).unwrap().revision, rev4);
    assert!(backend.get(&ctx, &bar).unwrap_err().is_not_found());

    // A pure-gating entry mutates nothing but still gates the commit.
    let rev5 = backend
        .atomic_write(
            &ctx,
            vec![
                ConditionalAction::new(
                    foo.clone(),
                    Condition::Whatever,
                    Action::Put(Item::new("", b"foo".to_vec())),
                ),
                ConditionalAction::new(bar.clone(), Condition::NotExists, Action::Nop),
            ],
        )
        .unwrap();
    assert_eq!(backend.get(&ctx, &foo).unwrap().revision, rev5);
    assert!(backend.get(&ctx, &bar).unwrap_err().is_not_found());
}

/// Asserts no lost updates under contention.
///
/// Workers race read-modify-write loops gated on the revision they read.
/// Every failed attempt implies some other worker committed in between,
/// so with strongly consistent reads each worker meets its quota within
/// the shared attempt budget; afterwards the counter equals the total
/// number of successful increments.
///
/// Weakly consistent reads fail this test by starving every worker with
/// perpetually stale revisions.
pub fn verify_concurrent_increments<B: Backend + ?Sized>(
    backend: &B,
    workers: usize,
    per_worker: usize,
) {
    let ctx = Context::background();
    let counter = Key::from("/contend/counter");
    let total = workers * per_worker;

    backend
        .put(&ctx, Item::new("/contend/counter", b"0".to_vec()))
        .expect("seed counter");

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                let ctx = Context::background();
                let mut committed = 0usize;

                for _ in 0..total {
                    if committed == per_worker {
                        break;
                    }

                    let item = backend.get(&ctx, &counter).expect("read counter");
                    let current: u64 = std::str::from_utf8(&item.value)
                        .expect("counter is utf8")
                        .parse()
                        .expect("counter is numeric");

                    let attempt = backend.atomic_write(
                        &ctx,
                        vec![ConditionalAction::new(
                            counter.clone(),
                            Condition::Revision(item.revision),
                            Action::Put(Item::new("", (current + 1).to_string().into_bytes())),
                        )],
                    );

                    match attempt {
                        Ok(_) => committed += 1,
                        Err(err) if err.is_condition_failed() => continue,
                        Err(err) => panic!("backend fault during contention: {err}"),
                    }
                }

                assert_eq!(
                    committed, per_worker,
                    "worker starved; reads are not strongly consistent"
                );
            });
        }
    });

    let item = backend.get(&ctx, &counter).expect("final counter");
    let final_count: usize = std::str::from_utf8(&item.value)
        .expect("counter is utf8")
        .parse()
        .expect("counter is numeric");
    assert_eq!(final_count, total, "lost or double-applied increments");
}

/// Asserts that expiry tracks the backend's clock.
///
/// An item is visible until the manual clock passes its expiry, then
/// reads as absent: `get` fails not-found, `NotExists` holds, and a
/// stale `Revision` condition fails.
pub fn verify_expiry<B: Backend + ?Sized>(backend: &B, clock: &ManualClock) {
    let ctx = Context::background();
    let key = Key::from("/ttl/item");
    let deadline = clock.now() + Duration::from_secs(60);

    let revision = backend
        .put(
            &ctx,
            Item::new("/ttl/item", b"ephemeral".to_vec()).with_expiry(deadline),
        )
        .expect("seed expiring item");

    assert!(backend.get(&ctx, &key).is_ok());

    let gated = || {
        vec![
            ConditionalAction::new(key.clone(), Condition::NotExists, Action::Nop),
            ConditionalAction::new(
                "/ttl/marker",
                Condition::Whatever,
                Action::Put(Item::new("", b"after".to_vec())),
            ),
        ]
    };

    // Still alive: the NotExists gate holds the batch back.
    let err = backend.atomic_write(&ctx, gated()).unwrap_err();
    assert!(err.is_condition_failed());

    clock.advance(Duration::from_secs(61));

    let err = backend.get(&ctx, &key).unwrap_err();
    assert!(err.is_not_found(), "item outlived its expiry");

    // A revision observed before expiry no longer matches anything.
    let err = backend
        .atomic_write(
            &ctx,
            vec![ConditionalAction::new(
                key.clone(),
                Condition::Revision(revision),
                Action::Nop,
            )],
        )
        .unwrap_err();
    assert!(err.is_condition_failed());

    // The NotExists gate is open now.
    backend
        .atomic_write(&ctx, gated())
        .expect("gate opens after expiry");
    assert!(backend.get(&ctx, &"/ttl/marker".into()).is_ok());
}

/// Asserts range read and range delete behavior: inclusive bounds,
/// ascending order, limit truncation, and exact delete coverage.
pub fn verify_ranges<B: Backend + ?Sized>(backend: &B) {
    let ctx = Context::background();
    for name in ["/seq/a", "/seq/b", "/seq/c", "/seq/d", "/tail/a"] {
        backend
            .put(&ctx, Item::new(name, name.as_bytes().to_vec()))
            .expect("seed range");
    }

    let all = backend
        .get_range(&ctx, &"/seq/a".into(), &"/seq/d".into(), 0)
        .expect("inclusive range");
    assert_eq!(all.len(), 4);
    assert_eq!(all[0].key, Key::from("/seq/a"));
    assert_eq!(all[3].key, Key::from("/seq/d"));
    assert!(all.windows(2).all(|w| w[0].key < w[1].key));

    let capped = backend
        .get_range(&ctx, &"/seq/".into(), &"/seq/z".into(), 2)
        .expect("capped range");
    assert_eq!(capped.len(), 2);

    let err = backend
        .get_range(&ctx, &"/seq/z".into(), &"/seq/a".into(), 0)
        .unwrap_err();
    assert!(matches!(
        err,
        revkv_backend::BackendError::BadParameter { .. }
    ));

    backend
        .delete_range(&ctx, &"/seq/b".into(), &"/seq/c".into())
        .expect("range delete");
    let rest = backend
        .get_range(&ctx, &"/seq/".into(), &"/seq/z".into(), 0)
        .expect("post-delete range");
    assert_eq!(rest.len(), 2);
    assert_eq!(rest[0].key, Key::from("/seq/a"));
    assert_eq!(rest[1].key, Key::from("/seq/d"));
    assert!(backend.get(&ctx, &"/tail/a".into()).is_ok());
}

/// Runs the whole suite against one backend instance.
///
/// The backend must be freshly constructed: scenarios assume their key
/// prefixes start empty.
pub fn run_compliance_suite<B: Backend + ?Sized>(backend: &B, clock: &ManualClock) {
    verify_move(backend);
    verify_gating(backend);
    verify_batch_limit(backend);
    verify_revision_semantics(backend);
    verify_ranges(backend);
    verify_expiry(backend, clock);
    verify_concurrent_increments(backend, 8, 16);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{file_fixture, memory_fixture};

    #[test]
    fn memory_backend_is_compliant() {
        let fixture = memory_fixture();
        run_compliance_suite(&fixture.backend, &fixture.clock);
    }

    #[test]
    fn file_backend_is_compliant() {
        let fixture = file_fixture();
        run_compliance_suite(&fixture.backend, &fixture.clock);
    }

    #[test]
    fn file_backend_compliance_state_survives_reopen() {
        let fixture = file_fixture();
        verify_move(&fixture.backend);
        verify_batch_limit(&fixture.backend);

        let ctx = Context::background();
        let fixture = fixture.reopen();
        let moved = fixture
            .backend
            .get(&ctx, &"/move/dst".into())
            .expect("moved key after reopen");
        assert_eq!(moved.value, b"cargo");
    }

    #[test]
    fn suite_runs_against_trait_object() {
        let fixture = memory_fixture();
        let backend: &dyn Backend = &fixture.backend;
        verify_move(backend);
        verify_gating(backend);
    }
}
