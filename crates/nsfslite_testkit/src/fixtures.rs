//! Test fixtures and store helpers.
//!
//! Provides temporary stores that can be closed and reopened in place, so
//! tests can check what survives a restart or a crash.

use crate::faults::SharedBackend;
use nsfslite_core::{Config, Engine, VariableId};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

enum Location {
    Memory {
        data: SharedBackend,
        wal: SharedBackend,
    },
    File {
        _dir: TempDir,
        db: PathBuf,
        wal: PathBuf,
    },
}

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The engine instance.
    pub engine: Engine,
    config: Config,
    location: Location,
}

impl TestStore {
    /// Creates a store over shared in-memory backends.
    pub fn memory() -> Self {
        Self::memory_with_config(Config::default())
    }

    /// Creates an in-memory store with a custom configuration.
    pub fn memory_with_config(config: Config) -> Self {
        let data = SharedBackend::new();
        let wal = SharedBackend::new();
        Self::over_backends(config, data, wal)
    }

    /// Opens a store over existing shared backends.
    pub fn over_backends(config: Config, data: SharedBackend, wal: SharedBackend) -> Self {
        let engine = Engine::open_with_backends(config.clone(), data.boxed(), wal.boxed())
            .expect("Failed to open in-memory store");
        Self {
            engine,
            config,
            location: Location::Memory { data, wal },
        }
    }

    /// Creates a file-backed store in a temporary directory.
    pub fn file() -> Self {
        Self::file_with_config(Config::default())
    }

    /// Creates a file-backed store with a custom configuration.
    pub fn file_with_config(config: Config) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let db = dir.path().join("store.nsfs");
        let wal = dir.path().join("store.wal");
        let engine = Engine::open(&db, &wal, config.clone()).expect("Failed to open file store");
        Self {
            engine,
            config,
            location: Location::File { _dir: dir, db, wal },
        }
    }

    /// Closes the engine cleanly and opens a new one on the same bytes.
    pub fn reopen(self) -> Self {
        let Self {
            engine,
            config,
            location,
        } = self;
        engine.close().expect("Failed to close store");
        drop(engine);

        let engine = match &location {
            Location::Memory { data, wal } => {
                Engine::open_with_backends(config.clone(), data.boxed(), wal.boxed())
            }
            Location::File { db, wal, .. } => Engine::open(db, wal, config.clone()),
        }
        .expect("Failed to reopen store");

        Self {
            engine,
            config,
            location,
        }
    }

    /// Abandons the engine without closing it and recovers from whatever
    /// bytes the backends hold right now.
    ///
    /// Only in-memory stores can be crashed.
    pub fn crash(self) -> Self {
        let Location::Memory { data, wal } = &self.location else {
            panic!("only in-memory stores can be crashed");
        };
        let data = data.restart();
        let wal = wal.restart();
        let config = self.config.clone();
        drop(self);
        Self::over_backends(config, data, wal)
    }

    /// Returns the storage-file and WAL backends of an in-memory store.
    pub fn backends(&self) -> Option<(&SharedBackend, &SharedBackend)> {
        match &self.location {
            Location::Memory { data, wal } => Some((data, wal)),
            Location::File { .. } => None,
        }
    }

    /// Returns the storage-file and WAL paths of a file-backed store.
    pub fn paths(&self) -> Option<(&Path, &Path)> {
        match &self.location {
            Location::File { db, wal, .. } => Some((db.as_path(), wal.as_path())),
            Location::Memory { .. } => None,
        }
    }
}

impl std::ops::Deref for TestStore {
    type Target = Engine;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

/// Runs a test with a temporary in-memory store.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&Engine) -> R,
{
    let store = TestStore::memory();
    f(&store.engine)
}

/// Creates a store holding the given variables, each committed on its own.
pub fn populated_store(vars: &[(&str, &[u8])]) -> (TestStore, Vec<VariableId>) {
    let store = TestStore::memory();
    let ids = vars
        .iter()
        .map(|(name, bytes)| {
            let id = store
                .create_variable(name, None)
                .expect("Failed to create variable");
            store.insert(id, None, 0, bytes).expect("Failed to insert");
            id
        })
        .collect();
    (store, ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_reopens_with_data() {
        let (store, ids) = populated_store(&[("a", b"one"), ("b", b"two")]);
        let store = store.reopen();
        assert_eq!(store.read_all(ids[0]).unwrap(), b"one");
        assert_eq!(store.read_all(ids[1]).unwrap(), b"two");
    }

    #[test]
    fn file_store_reopens_with_data() {
        let store = TestStore::file();
        assert!(store.paths().is_some());
        let id = store.create_variable("v", None).unwrap();
        store.insert(id, None, 0, b"persisted").unwrap();

        let store = store.reopen();
        assert_eq!(store.read_all(id).unwrap(), b"persisted");
    }

    #[test]
    fn crash_keeps_committed_data() {
        let (store, ids) = populated_store(&[("a", b"abc")]);
        let store = store.crash();
        assert_eq!(store.read_all(ids[0]).unwrap(), b"abc");
    }
}
