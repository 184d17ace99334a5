//! Streaming WAL record iterator and recovery scan.

use crate::codec::compute_crc32;
use crate::error::{CoreError, CoreResult};
use crate::types::{SequenceNumber, TransactionId};
use crate::wal::record::{WalRecord, WalRecordType, WAL_MAGIC, WAL_VERSION};
use crate::wal::writer::{CRC_SIZE, HEADER_SIZE};
use nsfslite_storage::StorageBackend;
use parking_lot::MutexGuard;
use std::collections::HashMap;

/// Chunk size for refilling the read buffer.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// A streaming iterator over WAL records.
///
/// Yields `(offset, record)` pairs. A record cut short by the end of the
/// log ends iteration cleanly; bad magic, unknown types, future versions
/// and CRC mismatches are yielded as errors, after which iteration stops.
pub struct WalRecordIterator<'a> {
    backend: MutexGuard<'a, Box<dyn StorageBackend>>,
    total_size: u64,
    /// Offset of the next unparsed record.
    current_offset: u64,
    buffer: Vec<u8>,
    buffer_pos: usize,
    buffer_len: usize,
    finished: bool,
}

impl<'a> WalRecordIterator<'a> {
    /// Creates a new streaming iterator starting at the given offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be determined.
    pub fn new(
        backend: MutexGuard<'a, Box<dyn StorageBackend>>,
        start_offset: u64,
    ) -> CoreResult<Self> {
        let total_size = backend.size()?;
        Ok(Self {
            backend,
            total_size,
            current_offset: start_offset,
            buffer: vec![0u8; READ_BUFFER_SIZE],
            buffer_pos: 0,
            buffer_len: 0,
            finished: false,
        })
    }

    /// Returns the offset just past the last record yielded so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.current_offset
    }

    /// Makes at least `min_bytes` available from the current position.
    ///
    /// Returns `false` if the log ends first. The buffer grows to fit
    /// records larger than the default chunk.
    fn ensure_buffered(&mut self, min_bytes: usize) -> CoreResult<bool> {
        let available = self.buffer_len - self.buffer_pos;
        if available >= min_bytes {
            return Ok(true);
        }

        let unread_in_log = self.total_size.saturating_sub(self.current_offset);
        if unread_in_log < min_bytes as u64 {
            return Ok(false);
        }

        self.buffer.copy_within(self.buffer_pos..self.buffer_len, 0);
        self.buffer_len = available;
        self.buffer_pos = 0;

        if min_bytes > self.buffer.len() {
            self.buffer.resize(min_bytes.next_power_of_two(), 0);
        }

        let not_buffered = unread_in_log - available as u64;
        let to_read = ((self.buffer.len() - self.buffer_len) as u64).min(not_buffered) as usize;
        if to_read > 0 {
            let read_offset = self.current_offset + self.buffer_len as u64;
            let data = self.backend.read_at(read_offset, to_read)?;
            self.buffer[self.buffer_len..self.buffer_len + data.len()].copy_from_slice(&data);
            self.buffer_len += data.len();
        }

        Ok(self.buffer_len - self.buffer_pos >= min_bytes)
    }

    fn read_next_record(&mut self) -> CoreResult<Option<(u64, WalRecord)>> {
        let start = self.current_offset;

        if !self.ensure_buffered(HEADER_SIZE)? {
            return Ok(None);
        }

        let header = &self.buffer[self.buffer_pos..self.buffer_pos + HEADER_SIZE];
        if header[0..4] != WAL_MAGIC {
            return Err(CoreError::wal_corruption(format!(
                "invalid magic at offset {start}"
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version == 0 || version > WAL_VERSION {
            return Err(CoreError::wal_corruption(format!(
                "unsupported version {version} at offset {start}"
            )));
        }

        let type_byte = header[6];
        let record_type = WalRecordType::from_byte(type_byte).ok_or_else(|| {
            CoreError::wal_corruption(format!(
                "unknown record type {type_byte} at offset {start}"
            ))
        })?;

        let payload_len =
            u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;
        let total_len = HEADER_SIZE + payload_len + CRC_SIZE;

        if !self.ensure_buffered(total_len)? {
            return Ok(None);
        }

        let record_bytes = &self.buffer[self.buffer_pos..self.buffer_pos + total_len];
        let (body, crc_bytes) = record_bytes.split_at(HEADER_SIZE + payload_len);
        let stored_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let computed_crc = compute_crc32(body);
        if stored_crc != computed_crc {
            return Err(CoreError::ChecksumMismatch {
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        let record = WalRecord::decode_payload(record_type, &body[HEADER_SIZE..])?;

        self.buffer_pos += total_len;
        self.current_offset += total_len as u64;

        Ok(Some((start, record)))
    }
}

impl Iterator for WalRecordIterator<'_> {
    type Item = CoreResult<(u64, WalRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_next_record() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// A committed transaction recovered from the WAL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedTransaction {
    /// Transaction ID.
    pub txid: TransactionId,
    /// Commit sequence number.
    pub sequence: SequenceNumber,
    /// Logged operations in submission order, without Begin/Commit.
    pub records: Vec<WalRecord>,
}

/// Result of scanning the WAL at open.
///
/// Groups operation records by transaction and keeps only transactions
/// whose commit marker made it to the log.
#[derive(Debug, Default)]
pub struct RecoveryScan {
    committed: Vec<CommittedTransaction>,
    pending: HashMap<TransactionId, Vec<WalRecord>>,
    max_txid: u64,
    max_seq: u64,
    /// Offset just past the last record that was read successfully.
    valid_len: u64,
    /// Error that ended the scan early in lenient mode.
    stopped_by: Option<String>,
}

impl RecoveryScan {
    /// Scans a WAL iterator.
    ///
    /// With `strict` set, any corruption is returned as an error. Otherwise
    /// the scan stops at the first bad record and remembers why.
    ///
    /// # Errors
    ///
    /// Returns the first corruption or I/O error in strict mode.
    pub fn scan(mut iter: WalRecordIterator<'_>, strict: bool) -> CoreResult<Self> {
        let mut scan = Self::default();

        for result in iter.by_ref() {
            let record = match result {
                Ok((_, record)) => record,
                Err(e) if strict => return Err(e),
                Err(e) => {
                    scan.stopped_by = Some(e.to_string());
                    break;
                }
            };
            scan.observe(record);
        }
        scan.valid_len = iter.position();

        scan.committed.sort_by_key(|txn| txn.sequence);
        Ok(scan)
    }

    fn observe(&mut self, record: WalRecord) {
        let txid = record.txid();
        self.max_txid = self.max_txid.max(txid.as_u64());

        match record {
            WalRecord::Begin { .. } => {
                self.pending.insert(txid, Vec::new());
            }
            WalRecord::Commit { sequence, .. } => {
                self.max_seq = self.max_seq.max(sequence.as_u64());
                let records = self.pending.remove(&txid).unwrap_or_default();
                self.committed.push(CommittedTransaction {
                    txid,
                    sequence,
                    records,
                });
            }
            other => self.pending.entry(txid).or_default().push(other),
        }
    }

    /// Returns committed transactions in sequence order.
    #[must_use]
    pub fn committed(&self) -> &[CommittedTransaction] {
        &self.committed
    }

    /// Consumes the scan, returning committed transactions in sequence order.
    #[must_use]
    pub fn into_committed(self) -> Vec<CommittedTransaction> {
        self.committed
    }

    /// Returns the number of transactions without a commit marker.
    #[must_use]
    pub fn uncommitted_count(&self) -> usize {
        self.pending.len()
    }

    /// Returns the next transaction ID to use.
    #[must_use]
    pub fn next_txid(&self) -> u64 {
        self.max_txid + 1
    }

    /// Returns the highest commit sequence found.
    #[must_use]
    pub fn max_seq(&self) -> SequenceNumber {
        SequenceNumber::new(self.max_seq)
    }

    /// Returns the length of the readable prefix of the log.
    #[must_use]
    pub fn valid_len(&self) -> u64 {
        self.valid_len
    }

    /// Returns why a lenient scan stopped early, if it did.
    #[must_use]
    pub fn stopped_by(&self) -> Option<&str> {
        self.stopped_by.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VariableId;
    use crate::wal::WalManager;
    use nsfslite_storage::InMemoryBackend;

    fn create_wal_with_records(records: &[WalRecord]) -> WalManager {
        let wal = WalManager::new(Box::new(InMemoryBackend::new()), false);
        for record in records {
            wal.append(record).unwrap();
        }
        wal
    }

    fn begin(txid: u64) -> WalRecord {
        WalRecord::Begin {
            txid: TransactionId::new(txid),
        }
    }

    fn insert(txid: u64, data: Vec<u8>) -> WalRecord {
        WalRecord::Insert {
            txid: TransactionId::new(txid),
            var_id: VariableId::new(1),
            offset: 0,
            data,
        }
    }

    fn commit(txid: u64, seq: u64) -> WalRecord {
        WalRecord::Commit {
            txid: TransactionId::new(txid),
            sequence: SequenceNumber::new(seq),
        }
    }

    #[test]
    fn iterator_empty_wal() {
        let wal = WalManager::new(Box::new(InMemoryBackend::new()), false);
        assert_eq!(wal.iter().unwrap().count(), 0);
    }

    #[test]
    fn iterator_multiple_records() {
        let records = vec![begin(1), insert(1, vec![1, 2, 3]), commit(1, 1)];
        let wal = create_wal_with_records(&records);

        let read: Vec<_> = wal.iter().unwrap().map(|r| r.unwrap().1).collect();
        assert_eq!(read, records);
    }

    #[test]
    fn iterator_many_records_cross_buffer_boundary() {
        let mut records = Vec::new();
        for i in 0..2_000u64 {
            records.push(begin(i));
            records.push(insert(i, vec![i as u8; 50]));
            records.push(commit(i, i));
        }
        let wal = create_wal_with_records(&records);

        let read: Vec<_> = wal.iter().unwrap().map(|r| r.unwrap().1).collect();
        assert_eq!(read.len(), records.len());
        assert_eq!(read, records);
    }

    #[test]
    fn iterator_large_record() {
        let large_payload = vec![0xAB; 128 * 1024];
        let wal = create_wal_with_records(&[insert(1, large_payload.clone())]);

        let records: Vec<_> = wal.iter().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
        match &records[0].1 {
            WalRecord::Insert { data, .. } => assert_eq!(data, &large_payload),
            other => panic!("expected insert record, got {other:?}"),
        }
    }

    #[test]
    fn truncated_tail_is_end_of_log() {
        let wal = create_wal_with_records(&[begin(1), insert(1, vec![9; 20]), commit(1, 1)]);
        let full = wal.size().unwrap();
        wal.truncate(full - 3).unwrap();

        let read: Vec<_> = wal.iter().unwrap().map(|r| r.unwrap().1).collect();
        assert_eq!(read, vec![begin(1), insert(1, vec![9; 20])]);
    }

    #[test]
    fn bad_magic_is_fatal() {
        let wal = create_wal_with_records(&[begin(1)]);
        {
            let backend = wal.get_backend_for_testing();
            backend.lock().write_at(0, b"XXXX").unwrap();
        }
        let results: Vec<_> = wal.iter().unwrap().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(CoreError::WalCorruption { .. })));
    }

    #[test]
    fn scan_keeps_only_committed() {
        let wal = create_wal_with_records(&[
            begin(1),
            insert(1, vec![1, 2, 3]),
            commit(1, 1),
            begin(2),
            insert(2, vec![4, 5, 6]),
        ]);

        let scan = RecoveryScan::scan(wal.iter().unwrap(), true).unwrap();
        assert_eq!(scan.committed().len(), 1);
        assert_eq!(scan.committed()[0].txid, TransactionId::new(1));
        assert_eq!(scan.committed()[0].records, vec![insert(1, vec![1, 2, 3])]);
        assert_eq!(scan.uncommitted_count(), 1);
        assert_eq!(scan.next_txid(), 3);
        assert_eq!(scan.max_seq(), SequenceNumber::new(1));
        assert_eq!(scan.valid_len(), wal.size().unwrap());
    }

    #[test]
    fn scan_orders_by_sequence() {
        let wal = create_wal_with_records(&[
            begin(1),
            begin(2),
            insert(2, vec![2]),
            insert(1, vec![1]),
            commit(2, 5),
            commit(1, 6),
        ]);

        let scan = RecoveryScan::scan(wal.iter().unwrap(), true).unwrap();
        let order: Vec<_> = scan.committed().iter().map(|t| t.txid.as_u64()).collect();
        assert_eq!(order, vec![2, 1]);
    }

    #[test]
    fn lenient_scan_stops_at_corruption() {
        let wal = create_wal_with_records(&[begin(1), insert(1, vec![1]), commit(1, 1)]);
        let good_len = wal.size().unwrap();
        wal.append(&begin(2)).unwrap();
        {
            let backend = wal.get_backend_for_testing();
            backend.lock().write_at(good_len, b"JUNK").unwrap();
        }

        let err = RecoveryScan::scan(wal.iter().unwrap(), true).unwrap_err();
        assert!(matches!(err, CoreError::WalCorruption { .. }));

        let scan = RecoveryScan::scan(wal.iter().unwrap(), false).unwrap();
        assert_eq!(scan.committed().len(), 1);
        assert_eq!(scan.valid_len(), good_len);
        assert!(scan.stopped_by().is_some());
    }
}
