//! File-backed backend.

use crate::backend::Backend;
use crate::clock::{Clock, SystemClock};
use crate::context::Context;
use crate::error::{BackendError, BackendResult};
use crate::item::{Item, Revision};
use crate::key::Key;
use crate::state::KvState;
use crate::txn::{validate_batch, ConditionalAction};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// File names within the backend directory.
const SNAPSHOT_FILE: &str = "SNAPSHOT";
const LOCK_FILE: &str = "LOCK";

/// A durable backend that persists the whole keyspace as one snapshot.
///
/// The live state is an in-memory map; every mutation first writes the
/// updated map to a temporary file in the backend directory and
/// atomically renames it over the snapshot, then commits the map in
/// memory. A mutation whose persist fails therefore leaves neither the
/// file nor the in-memory state changed, and a crash mid-write leaves
/// the previous snapshot intact.
///
/// # Durability
///
/// - The temporary file is fsynced before the rename.
/// - The directory is fsynced after the rename so the name change
///   itself survives power loss.
///
/// # Concurrency
///
/// One process at a time: an exclusive advisory lock on a `LOCK` file
/// guards the directory. Within the process, a single mutex serializes
/// all operations, exactly like [`super::MemoryBackend`].
pub struct FileBackend {
    dir: PathBuf,
    state: Mutex<KvState>,
    clock: Arc<dyn Clock>,
    /// Held for the backend's lifetime; dropping it releases the lock.
    _lock_file: File,
}

impl std::fmt::Debug for FileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackend")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl FileBackend {
    /// Opens or creates a backend directory on the OS clock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another process holds the directory lock (`Unavailable`)
    /// - The snapshot exists but cannot be decoded (`Corrupted`)
    /// - An I/O error occurs
    pub fn open(dir: &Path) -> BackendResult<Self> {
        Self::open_with_clock(dir, Arc::new(SystemClock))
    }

    /// Opens or creates a backend directory on the given clock.
    pub fn open_with_clock(dir: &Path, clock: Arc<dyn Clock>) -> BackendResult<Self> {
        std::fs::create_dir_all(dir)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(BackendError::unavailable(
                "another process holds the backend lock",
            ));
        }

        let state = Self::load_snapshot(&dir.join(SNAPSHOT_FILE))?;
        debug!(entries = state.len(), dir = %dir.display(), "opened file backend");

        Ok(Self {
            dir: dir.to_path_buf(),
            state: Mutex::new(state),
            clock,
            _lock_file: lock_file,
        })
    }

    /// Returns the backend directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn load_snapshot(path: &Path) -> BackendResult<KvState> {
        if !path.exists() {
            return Ok(KvState::default());
        }
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Ok(KvState::default());
        }
        ciborium::from_reader(file)
            .map_err(|err| BackendError::corrupted(format!("snapshot decode: {err}")))
    }

    /// Writes `state` to the snapshot atomically.
    fn persist(&self, state: &KvState) -> BackendResult<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        ciborium::into_writer(state, &mut tmp)
            .map_err(|err| BackendError::unavailable(format!("snapshot encode: {err}")))?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.dir.join(SNAPSHOT_FILE))
            .map_err(|err| BackendError::Io(err.error))?;

        // Fsync the directory so the rename is durable.
        File::open(&self.dir)?.sync_all()?;
        Ok(())
    }

    /// Runs a mutation against a copy of the state, persists the copy,
    /// and only then makes it live. Keeps disk and memory in lockstep:
    /// a failed persist (or a failed mutation) changes nothing.
    fn mutate<T>(&self, op: impl FnOnce(&mut KvState) -> BackendResult<T>) -> BackendResult<T> {
        let mut guard = self.state.lock();
        let mut next = guard.clone();
        let out = op(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(out)
    }
}

impl Backend for FileBackend {
    fn get(&self, ctx: &Context, key: &Key) -> BackendResult<Item> {
        ctx.check()?;
        let now = self.clock.now();
        self.state.lock().get(key, now)
    }

    fn put(&self, ctx: &Context, item: Item) -> BackendResult<Revision> {
        ctx.check()?;
        self.mutate(|state| Ok(state.put(item)))
    }

    fn delete(&self, ctx: &Context, key: &Key) -> BackendResult<()> {
        ctx.check()?;
        let now = self.clock.now();
        self.mutate(|state| state.delete(key, now))
    }

    fn atomic_write(
        &self,
        ctx: &Context,
        batch: Vec<ConditionalAction>,
    ) -> BackendResult<Revision> {
        ctx.check()?;
        validate_batch(&batch)?;
        let now = self.clock.now();
        self.mutate(|state| state.atomic_write(batch, now))
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
        self.mutate(|state| state.delete_range(start, end))
    }
}
