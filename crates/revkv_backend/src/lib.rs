//! # revkv Backend
//!
//! Key-value backend contract with revision-gated atomic writes.
//!
//! This crate defines the [`Backend`] trait - strongly consistent reads,
//! single-key writes, and an atomic write that evaluates a batch of
//! per-key conditions and, only if every one holds, applies every
//! associated action - plus two reference adapters implementing it.
//!
//! ## Design Principles
//!
//! - Coordination is optimistic: no lock primitive is exposed; callers
//!   express it through conditions on revision and existence.
//! - Revisions are opaque tokens, comparable for equality only.
//! - A failed atomic write never leaves partial state behind.
//! - Adapters must be `Send + Sync`; the backend is the sole
//!   synchronization boundary for its callers.
//!
//! ## Available Backends
//!
//! - [`MemoryBackend`] - ephemeral, for tests and caches
//! - [`FileBackend`] - durable, snapshot-per-commit persistence
//!
//! ## Example
//!
//! The canonical contention pattern: read, compute, write gated on the
//! revision that was read, retry on conflict.
//!
//! ```rust
//! use revkv_backend::{
//!     Action, Backend, Condition, ConditionalAction, Context, Item, MemoryBackend,
//! };
//!
//! let backend = MemoryBackend::new();
//! let ctx = Context::background();
//! backend.put(&ctx, Item::new("/counter", b"41".to_vec())).unwrap();
//!
//! loop {
//!     let current = backend.get(&ctx, &"/counter".into()).unwrap();
//!     let next = (std::str::from_utf8(&current.value).unwrap()
//!         .parse::<u64>().unwrap() + 1).to_string();
//!
//!     match backend.atomic_write(&ctx, vec![ConditionalAction::new(
//!         "/counter",
//!         Condition::Revision(current.revision),
//!         Action::Put(Item::new("", next.into_bytes())),
//!     )]) {
//!         Ok(_) => break,
//!         Err(err) if err.is_condition_failed() => continue,
//!         Err(err) => panic!("backend fault: {err}"),
//!     }
//! }
//!
//! let item = backend.get(&ctx, &"/counter".into()).unwrap();
//! assert_eq!(item.value, b"42");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod clock;
mod context;
mod error;
mod file;
mod item;
mod key;
mod memory;
mod state;
mod txn;

pub use backend::Backend;
pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{CancelHandle, Context};
pub use error::{BackendError, BackendResult};
pub use file::FileBackend;
pub use item::{Item, Revision};
pub use key::Key;
pub use memory::MemoryBackend;
pub use txn::{validate_batch, Action, Condition, ConditionalAction, MAX_ATOMIC_WRITE_SIZE};
