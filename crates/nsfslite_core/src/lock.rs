//! Advisory lock beside the storage file.
//!
//! ```text
//! <db_path>        # storage file
//! <db_path>.lock   # held exclusively while an engine has the store open
//! ```

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Exclusive lock on a store, released on drop.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    _file: File,
}

impl StoreLock {
    /// Takes the lock for the store at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseLocked` if another process holds it, or an I/O
    /// error if the lock file cannot be created.
    pub fn acquire(db_path: &Path) -> CoreResult<Self> {
        let path = Self::lock_path(db_path);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked);
        }

        Ok(Self { path, _file: file })
    }

    /// Returns the lock file path for a storage file.
    #[must_use]
    pub fn lock_path(db_path: &Path) -> PathBuf {
        let mut name = OsString::from(db_path.as_os_str());
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Returns the path of the held lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
