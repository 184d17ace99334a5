//! Heap-backed byte store.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::ops::Range;
use std::sync::Arc;

/// A storage file or WAL held in a `Vec<u8>`.
///
/// Used by `Engine::open_in_memory`, unit tests and benchmarks. Nothing
/// survives the process.
///
/// Clones share one buffer. A test keeps a clone of each of the two files,
/// hands the others to an engine and drops that engine to stand in for a
/// crash; the kept clones then hold exactly what a reopened store would see.
///
/// ```rust
/// use nsfslite_storage::{InMemoryBackend, StorageBackend};
///
/// let mut wal = InMemoryBackend::new();
/// let kept = wal.clone();
/// wal.append(b"record").unwrap();
/// drop(wal);
/// assert_eq!(kept.data(), b"record");
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    bytes: Arc<RwLock<Vec<u8>>>,
}

impl InMemoryBackend {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing image, e.g. one captured before a crash.
    #[must_use]
    pub fn with_data(image: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(RwLock::new(image)),
        }
    }

    /// Snapshot of the current image.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.bytes.read().clone()
    }
}

/// Index range for `len` bytes at `offset`, if all of them exist.
fn span(offset: u64, len: usize, size: usize) -> Option<Range<usize>> {
    let start = usize::try_from(offset).ok()?;
    let end = start.checked_add(len)?;
    (end <= size).then_some(start..end)
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let bytes = self.bytes.read();
        span(offset, len, bytes.len())
            .map(|range| bytes[range].to_vec())
            .ok_or(StorageError::ReadPastEnd {
                offset,
                len,
                size: bytes.len() as u64,
            })
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        let mut bytes = self.bytes.write();
        let size = bytes.len();
        let start = match usize::try_from(offset) {
            Ok(start) if start <= size => start,
            _ => {
                return Err(StorageError::WriteGap {
                    offset,
                    size: size as u64,
                })
            }
        };

        let overlap = data.len().min(size - start);
        bytes[start..start + overlap].copy_from_slice(&data[..overlap]);
        bytes.extend_from_slice(&data[overlap..]);
        Ok(())
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut bytes = self.bytes.write();
        let at = bytes.len() as u64;
        bytes.extend_from_slice(data);
        Ok(at)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.bytes.read().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut bytes = self.bytes.write();
        let size = bytes.len() as u64;
        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd { new_size, size });
        }
        bytes.truncate(new_size as usize);
        Ok(())
    }
}
