//! WAL writer and reader.

use crate::codec::compute_crc32;
use crate::error::{CoreError, CoreResult};
use crate::wal::record::{WalRecord, WAL_MAGIC, WAL_VERSION};
use nsfslite_storage::StorageBackend;
use parking_lot::Mutex;
use std::sync::Arc;

/// Header size for WAL records.
/// magic (4) + version (2) + type (1) + length (4) = 11 bytes
pub(crate) const HEADER_SIZE: usize = 11;

/// CRC size.
pub(crate) const CRC_SIZE: usize = 4;

/// Encodes a record with its envelope.
///
/// # Errors
///
/// Returns `InvalidArgument` if the payload exceeds `max_payload` bytes.
pub fn encode_record(record: &WalRecord, max_payload: usize) -> CoreResult<Vec<u8>> {
    let payload = record.encode_payload()?;
    if payload.len() > max_payload.min(WalRecord::MAX_PAYLOAD_SIZE) {
        return Err(CoreError::invalid_argument(format!(
            "WAL record payload too large: {} bytes exceeds maximum of {} bytes",
            payload.len(),
            max_payload.min(WalRecord::MAX_PAYLOAD_SIZE)
        )));
    }

    let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    data.extend_from_slice(&WAL_MAGIC);
    data.extend_from_slice(&WAL_VERSION.to_le_bytes());
    data.push(record.record_type().as_byte());
    // bounded by MAX_PAYLOAD_SIZE above
    data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    data.extend_from_slice(&payload);

    let crc = compute_crc32(&data);
    data.extend_from_slice(&crc.to_le_bytes());
    Ok(data)
}

/// Manages WAL writes and reads.
///
/// The `WalManager` provides append-only writes to the WAL and supports
/// reading records for recovery.
pub struct WalManager {
    /// Storage backend for WAL data.
    backend: Arc<Mutex<Box<dyn StorageBackend>>>,
    /// Whether to sync after each append.
    sync_on_write: bool,
    /// Largest accepted record payload.
    max_record_size: usize,
}

impl WalManager {
    /// Creates a new WAL manager.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_write: bool) -> Self {
        Self {
            backend: Arc::new(Mutex::new(backend)),
            sync_on_write,
            max_record_size: WalRecord::MAX_PAYLOAD_SIZE,
        }
    }

    /// Sets the largest accepted record payload.
    #[must_use]
    pub fn with_max_record_size(mut self, size: usize) -> Self {
        self.max_record_size = size;
        self
    }

    /// Appends a record to the WAL.
    ///
    /// Returns the offset where the record was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is too large or the write fails.
    pub fn append(&self, record: &WalRecord) -> CoreResult<u64> {
        self.append_batch(std::slice::from_ref(record))
    }

    /// Appends several records with a single backend write.
    ///
    /// Every record is encoded before anything is written, so an oversized
    /// record leaves the WAL untouched. Returns the offset of the first
    /// record.
    ///
    /// # Errors
    ///
    /// Returns an error if a payload is too large or the write fails.
    pub fn append_batch(&self, records: &[WalRecord]) -> CoreResult<u64> {
        let mut data = Vec::new();
        for record in records {
            data.extend_from_slice(&encode_record(record, self.max_record_size)?);
        }

        let mut backend = self.backend.lock();
        let offset = backend.append(&data)?;

        if self.sync_on_write {
            backend.sync()?;
        } else {
            backend.flush()?;
        }

        Ok(offset)
    }

    /// Flushes all pending writes to the OS.
    pub fn flush(&self) -> CoreResult<()> {
        self.backend.lock().flush()?;
        Ok(())
    }

    /// Forces written records to durable storage.
    pub fn sync(&self) -> CoreResult<()> {
        self.backend.lock().sync()?;
        Ok(())
    }

    /// Returns the current WAL size.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Returns a streaming iterator over WAL records.
    ///
    /// Records are read one-by-one from the storage backend, so memory use
    /// does not grow with the WAL.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be accessed.
    pub fn iter(&self) -> CoreResult<super::WalRecordIterator<'_>> {
        let backend = self.backend.lock();
        super::WalRecordIterator::new(backend, 0)
    }

    /// Reads all records from the WAL.
    ///
    /// Prefer [`Self::iter`] for large logs.
    pub fn read_all(&self) -> CoreResult<Vec<(u64, WalRecord)>> {
        self.iter()?.collect()
    }

    /// Truncates the WAL to the specified offset.
    ///
    /// Used to discard a partially written commit, and to reclaim space
    /// once every logged commit is applied to the storage file.
    pub fn truncate(&self, offset: u64) -> CoreResult<()> {
        let mut backend = self.backend.lock();
        backend.truncate(offset)?;
        Ok(())
    }

    /// Clears all data from the WAL.
    pub fn clear(&self) -> CoreResult<()> {
        self.truncate(0)
    }

    /// Returns the backend for testing purposes.
    ///
    /// This allows tests to directly manipulate the underlying storage
    /// to simulate crash scenarios like truncated writes or corruption.
    #[cfg(test)]
    pub(crate) fn get_backend_for_testing(&self) -> Arc<Mutex<Box<dyn StorageBackend>>> {
        Arc::clone(&self.backend)
    }
}

impl std::fmt::Debug for WalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalManager")
            .field("sync_on_write", &self.sync_on_write)
            .field("max_record_size", &self.max_record_size)
            .finish_non_exhaustive()
    }
}
