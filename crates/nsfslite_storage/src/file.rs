//! OS file byte store.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A storage file or WAL on disk.
///
/// The length is tracked alongside the handle so bounds checks never hit
/// the filesystem. `sync` is `fsync` of data and length; `truncate` syncs
/// the new length immediately, since recovery relies on a cut tail staying
/// cut.
///
/// ```no_run
/// use nsfslite_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut wal = FileBackend::open(Path::new("store.wal")).unwrap();
/// wal.append(b"record").unwrap();
/// wal.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    inner: Mutex<OpenFile>,
}

#[derive(Debug)]
struct OpenFile {
    file: File,
    len: u64,
}

impl OpenFile {
    fn write_all_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.len = self.len.max(offset + data.len() as u64);
        Ok(())
    }
}

impl FileBackend {
    /// Opens `path`, creating an empty file if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::open_with(path, true)
    }

    /// Opens `path` without creating it.
    ///
    /// Read-only tooling uses this so a mistyped path is an error rather
    /// than a fresh empty store.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file is missing or cannot be opened.
    pub fn open_existing(path: &Path) -> StorageResult<Self> {
        Self::open_with(path, false)
    }

    /// Like [`Self::open`], creating missing parent directories first.
    ///
    /// # Errors
    ///
    /// Returns `Io` if a directory or the file cannot be created.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)?,
            _ => {}
        }
        Self::open(path)
    }

    fn open_with(path: &Path, create: bool) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .truncate(false)
            .open(path)?;
        let len = file.metadata()?.len();
        tracing::trace!(path = %path.display(), len, "opened backing file");

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(OpenFile { file, len }),
        })
    }

    /// Path this backend was opened with.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut inner = self.inner.lock();
        let size = inner.len;
        match offset.checked_add(len as u64) {
            Some(end) if end <= size => {}
            _ => return Err(StorageError::ReadPastEnd { offset, len, size }),
        }

        let mut buf = vec![0u8; len];
        if len > 0 {
            inner.file.seek(SeekFrom::Start(offset))?;
            inner.file.read_exact(&mut buf)?;
        }
        Ok(buf)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        let inner = self.inner.get_mut();
        if offset > inner.len {
            return Err(StorageError::WriteGap {
                offset,
                size: inner.len,
            });
        }
        if data.is_empty() {
            return Ok(());
        }
        inner.write_all_at(offset, data)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let inner = self.inner.get_mut();
        let at = inner.len;
        if !data.is_empty() {
            inner.write_all_at(at, data)?;
        }
        Ok(at)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.inner.get_mut().file.flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.inner.lock().len)
    }

    fn sync(&mut self) -> StorageResult<()> {
        let file = &mut self.inner.get_mut().file;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let inner = self.inner.get_mut();
        if new_size > inner.len {
            return Err(StorageError::TruncateBeyondEnd {
                new_size,
                size: inner.len,
            });
        }
        inner.file.set_len(new_size)?;
        inner.file.sync_all()?;
        inner.len = new_size;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn fresh(name: &str) -> (TempDir, PathBuf, FileBackend) {
        let dir = tempdir().unwrap();
        let path = dir.path().join(name);
        let backend = FileBackend::open(&path).unwrap();
        (dir, path, backend)
    }

    #[test]
    fn open_creates_empty_store_file() {
        let (_dir, path, backend) = fresh("store.nsfs");
        assert!(path.exists());
        assert_eq!(backend.size().unwrap(), 0);
        assert_eq!(backend.path(), path);
    }

    #[test]
    fn inspecting_a_missing_file_creates_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("typo.nsfs");
        assert!(matches!(
            FileBackend::open_existing(&path),
            Err(StorageError::Io(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn wal_records_land_back_to_back() {
        let (_dir, _path, mut wal) = fresh("store.wal");
        assert_eq!(wal.append(b"begin").unwrap(), 0);
        assert_eq!(wal.append(b"").unwrap(), 5);
        assert_eq!(wal.append(b"commit").unwrap(), 5);
        assert_eq!(wal.read_at(0, 11).unwrap(), b"begincommit");
    }

    #[test]
    fn header_slot_rewritten_and_tail_extended() {
        let (_dir, _path, mut data) = fresh("store.nsfs");
        data.append(b"slotA-extent").unwrap();
        data.write_at(4, b"B").unwrap();
        data.write_at(10, b"NTS").unwrap();
        assert_eq!(data.size().unwrap(), 13);
        assert_eq!(data.read_at(0, 13).unwrap(), b"slotB-exteNTS");

        assert!(matches!(
            data.write_at(14, b"x"),
            Err(StorageError::WriteGap { offset: 14, size: 13 })
        ));
        assert!(matches!(
            data.read_at(12, 2),
            Err(StorageError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn synced_bytes_survive_reopen() {
        let (dir, path, mut data) = fresh("store.nsfs");
        data.append(b"header").unwrap();
        data.write_at(0, b"H").unwrap();
        data.sync().unwrap();
        drop(data);

        let reopened = FileBackend::open_existing(&path).unwrap();
        assert_eq!(reopened.size().unwrap(), 6);
        assert_eq!(reopened.read_at(0, 6).unwrap(), b"Header");
        drop(dir);
    }

    #[test]
    fn truncate_cuts_the_file_on_disk() {
        let (_dir, path, mut wal) = fresh("store.wal");
        wal.append(b"record torn").unwrap();
        wal.truncate(6).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 6);

        // appends continue from the cut
        assert_eq!(wal.append(b"!").unwrap(), 6);
        assert_eq!(wal.read_at(0, 7).unwrap(), b"record!");

        assert!(matches!(
            wal.truncate(100),
            Err(StorageError::TruncateBeyondEnd { new_size: 100, size: 7 })
        ));
    }

    #[test]
    fn parent_directories_are_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("store.nsfs");
        let backend = FileBackend::open_with_create_dirs(&path).unwrap();
        assert!(path.exists());
        assert_eq!(backend.size().unwrap(), 0);
    }
}
