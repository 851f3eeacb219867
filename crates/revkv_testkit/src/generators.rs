//! Property-based test generators using proptest.
//!
//! Strategies draw keys from a deliberately small space so generated
//! workloads collide often - collisions are where conditional-write
//! semantics earn their keep.

use proptest::prelude::*;
use revkv_backend::{Action, Backend, Condition, ConditionalAction, Context, Item, Key};
use std::collections::BTreeMap;

/// Strategy for keys in a small, collision-prone space.
pub fn key_strategy() -> impl Strategy<Value = Key> {
    prop::string::string_regex("/[a-d]/[a-d]")
        .expect("valid key regex")
        .prop_map(Key::from)
}

/// Strategy for arbitrary small values.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

/// One step of a generated workload.
#[derive(Debug, Clone)]
pub enum WorkloadOp {
    /// Unconditional single-key upsert.
    Put {
        /// Target key.
        key: Key,
        /// New value.
        value: Vec<u8>,
    },
    /// Single-key delete (may target an absent key).
    Delete {
        /// Target key.
        key: Key,
    },
    /// Atomic upsert gated on the key's current state: `Revision` of the
    /// last-read item if present, `NotExists` otherwise.
    Swap {
        /// Target key.
        key: Key,
        /// New value.
        value: Vec<u8>,
    },
    /// Atomic put of `key` gated on `gate` being absent.
    GatedPut {
        /// Key whose absence opens the gate.
        gate: Key,
        /// Target key.
        key: Key,
        /// New value.
        value: Vec<u8>,
    },
}

/// Strategy for one workload step.
pub fn op_strategy() -> impl Strategy<Value = WorkloadOp> {
    prop_oneof![
        (key_strategy(), value_strategy())
            .prop_map(|(key, value)| WorkloadOp::Put { key, value }),
        key_strategy().prop_map(|key| WorkloadOp::Delete { key }),
        (key_strategy(), value_strategy())
            .prop_map(|(key, value)| WorkloadOp::Swap { key, value }),
        (key_strategy(), key_strategy(), value_strategy())
            .prop_map(|(gate, key, value)| WorkloadOp::GatedPut { gate, key, value }),
    ]
}

/// Strategy for a whole workload.
pub fn workload_strategy() -> impl Strategy<Value = Vec<WorkloadOp>> {
    prop::collection::vec(op_strategy(), 0..48)
}

/// Applies one op to the backend and to a plain map model, asserting
/// that both agree on the outcome.
pub fn apply_workload_op<B: Backend + ?Sized>(
    backend: &B,
    model: &mut BTreeMap<Key, Vec<u8>>,
    op: WorkloadOp,
) {
    let ctx = Context::background();
    match op {
        WorkloadOp::Put { key, value } => {
            backend
                .put(&ctx, Item::new(key.clone(), value.clone()))
                .expect("unconditional put");
            model.insert(key, value);
        }
        WorkloadOp::Delete { key } => {
            let existed = model.remove(&key).is_some();
            let outcome = backend.delete(&ctx, &key);
            match outcome {
                Ok(()) => assert!(existed, "backend deleted a key the model lacks"),
                Err(err) if err.is_not_found() => {
                    assert!(!existed, "backend missed a key the model holds");
                }
                Err(err) => panic!("unexpected delete error: {err}"),
            }
        }
        WorkloadOp::Swap { key, value } => {
            let condition = match backend.get(&ctx, &key) {
                Ok(item) => Condition::Revision(item.revision),
                Err(err) if err.is_not_found() => Condition::NotExists,
                Err(err) => panic!("unexpected get error: {err}"),
            };
            // Single-threaded workload: the snapshot cannot go stale,
            // so the swap must commit.
            backend
                .atomic_write(
                    &ctx,
                    vec![ConditionalAction::new(
                        key.clone(),
                        condition,
                        Action::Put(Item::new("", value.clone())),
                    )],
                )
                .expect("swap against fresh snapshot");
            model.insert(key, value);
        }
        WorkloadOp::GatedPut { gate, key, value } => {
            let batch = vec![
                ConditionalAction::new(gate.clone(), Condition::NotExists, Action::Nop),
                ConditionalAction::new(
                    key.clone(),
                    Condition::Whatever,
                    Action::Put(Item::new("", value.clone())),
                ),
            ];
            // A gate entry on the same key checks before the action
            // applies, so the gate also opens when key == gate.
            let open = !model.contains_key(&gate);
            match backend.atomic_write(&ctx, batch) {
                Ok(_) => {
                    assert!(open, "backend committed through a closed gate");
                    model.insert(key, value);
                }
                Err(err) if err.is_condition_failed() => {
                    assert!(!open, "backend refused an open gate");
                }
                Err(err) => panic!("unexpected atomic write error: {err}"),
            }
        }
    }
}

/// Asserts that the backend's visible state equals the model.
pub fn assert_matches_model<B: Backend + ?Sized>(backend: &B, model: &BTreeMap<Key, Vec<u8>>) {
    let ctx = Context::background();
    let everything = backend
        .get_range(&ctx, &Key::default(), &Key::new(vec![0xff; 16]), 0)
        .expect("full range scan");

    assert_eq!(
        everything.len(),
        model.len(),
        "backend and model hold different key counts"
    );
    for item in everything {
        let expected = model
            .get(&item.key)
            .unwrap_or_else(|| panic!("backend holds unexpected key {}", item.key));
        assert_eq!(&item.value, expected, "value mismatch at {}", item.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{file_fixture, memory_fixture};

    proptest! {
        #[test]
        fn memory_backend_matches_model(ops in workload_strategy()) {
            let fixture = memory_fixture();
            let mut model = BTreeMap::new();
            for op in ops {
                apply_workload_op(&fixture.backend, &mut model, op);
            }
            assert_matches_model(&fixture.backend, &model);
        }

        #[test]
        fn failed_writes_leave_memory_backend_untouched(
            ops in workload_strategy(),
            key in key_strategy(),
            value in value_strategy(),
        ) {
            let fixture = memory_fixture();
            let mut model = BTreeMap::new();
            for op in ops {
                apply_workload_op(&fixture.backend, &mut model, op);
            }

            // A revision that was never assigned can never match, so
            // this batch must fail and change nothing.
            let ctx = Context::background();
            let err = fixture.backend.atomic_write(&ctx, vec![
                ConditionalAction::new(
                    key,
                    Condition::Revision(revkv_backend::Revision::generate()),
                    Action::Put(Item::new("", value)),
                ),
            ]).unwrap_err();
            prop_assert!(err.is_condition_failed());
            assert_matches_model(&fixture.backend, &model);
        }
    }

    proptest! {
        // The file backend persists a snapshot per commit; keep the
        // case count low enough for CI.
        #![proptest_config(ProptestConfig::with_cases(32))]
        #[test]
        fn file_backend_matches_model_across_reopen(ops in workload_strategy()) {
            let fixture = file_fixture();
            let mut model = BTreeMap::new();
            for op in ops {
                apply_workload_op(&fixture.backend, &mut model, op);
            }

            let fixture = fixture.reopen();
            assert_matches_model(&fixture.backend, &model);
        }
    }
}
