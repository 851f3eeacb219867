//! Backend fixtures.
//!
//! Factories that pair a backend with the manual clock driving it, so
//! suites control time deterministically. File fixtures keep their
//! temporary directory alive for the fixture's lifetime.

use revkv_backend::{FileBackend, ManualClock, MemoryBackend};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// An in-memory backend plus the clock it runs on.
pub struct MemoryFixture {
    /// The backend under test.
    pub backend: MemoryBackend,
    /// Handle to the backend's clock.
    pub clock: Arc<ManualClock>,
}

/// Creates an in-memory backend on a manual clock.
#[must_use]
pub fn memory_fixture() -> MemoryFixture {
    let clock = Arc::new(ManualClock::new());
    let backend = MemoryBackend::with_clock(clock.clone());
    MemoryFixture { backend, clock }
}

/// A file backend plus its clock, rooted in a temporary directory.
pub struct FileFixture {
    /// The backend under test.
    pub backend: FileBackend,
    /// Handle to the backend's clock.
    pub clock: Arc<ManualClock>,
    /// Directory the backend persists into.
    pub dir: PathBuf,
    /// Kept alive so the directory outlives the backend.
    _temp_dir: TempDir,
}

/// Creates a file backend in a fresh temporary directory.
#[must_use]
pub fn file_fixture() -> FileFixture {
    let temp_dir = TempDir::new().expect("create temp directory");
    let dir = temp_dir.path().join("store");
    let clock = Arc::new(ManualClock::new());
    let backend =
        FileBackend::open_with_clock(&dir, clock.clone()).expect("open file backend");
    FileFixture {
        backend,
        clock,
        dir,
        _temp_dir: temp_dir,
    }
}

impl FileFixture {
    /// Drops the backend and reopens the same directory.
    ///
    /// Exercises recovery: everything committed before the call must be
    /// visible after it.
    #[must_use]
    pub fn reopen(self) -> Self {
        let Self {
            backend,
            clock,
            dir,
            _temp_dir,
        } = self;
        drop(backend);

        let backend =
            FileBackend::open_with_clock(&dir, clock.clone()).expect("reopen file backend");
        Self {
            backend,
            clock,
            dir,
            _temp_dir,
        }
    }
}

/// Runs a closure against a fresh in-memory fixture.
pub fn with_memory_backend<F, R>(f: F) -> R
where
    F: FnOnce(&MemoryBackend, &ManualClock) -> R,
{
    let fixture = memory_fixture();
    f(&fixture.backend, &fixture.clock)
}

/// Runs a closure against a fresh file fixture.
pub fn with_file_backend<F, R>(f: F) -> R
where
    F: FnOnce(&FileBackend, &ManualClock) -> R,
{
    let fixture = file_fixture();
    f(&fixture.backend, &fixture.clock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use revkv_backend::{Backend, Context, Item};

    #[test]
    fn memory_fixture_is_empty() {
        let fixture = memory_fixture();
        assert!(fixture.backend.is_empty());
    }

    #[test]
    fn file_fixture_recovers_across_reopen() {
        let ctx = Context::background();
        let fixture = file_fixture();
        fixture
            .backend
            .put(&ctx, Item::new("/kept", b"v".to_vec()))
            .unwrap();

        let fixture = fixture.reopen();
        let item = fixture.backend.get(&ctx, &"/kept".into()).unwrap();
        assert_eq!(item.value, b"v");
    }

    #[test]
    fn closure_helpers_run() {
        with_memory_backend(|backend, _clock| {
            let ctx = Context::background();
            backend.put(&ctx, Item::new("/x", b"1".to_vec())).unwrap();
            assert_eq!(backend.get(&ctx, &"/x".into()).unwrap().value, b"1");
        });
    }
}
