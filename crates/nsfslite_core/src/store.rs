//! Committed state and the commit path.
//!
//! `VariableStore` owns the storage file, the WAL and the in-memory copy of
//! the committed directory. Every mutation goes through [`VariableStore::commit`]:
//!
//! 1. simulate the batch against the committed state (nothing is written if
//!    any operation is rejected)
//! 2. append `Begin`, the operations and `Commit` to the WAL and sync
//! 3. write changed variables to fresh extents and append a catalog
//! 4. publish the catalog with a header write and sync
//! 5. clear the WAL
//!
//! A failure in steps 2-4 truncates the WAL and storage file back to their
//! pre-commit sizes. Recovery replays committed WAL batches whose sequence
//! is newer than the header's applied sequence.

use crate::config::Config;
use crate::directory::VariableEntry;
use crate::error::{CoreError, CoreResult, ErrorKind};
use crate::storage::{Extent, FileHeader, Snapshot, StorageFile, HEADER_SLOT_SIZE};
use crate::stride::Stride;
use crate::transaction::{Operation, StagedChanges, StagedState, Transaction};
use crate::types::{SequenceNumber, TransactionId, VariableId};
use crate::wal::{RecoveryScan, WalManager, WalRecord};
use nsfslite_storage::StorageBackend;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Sequence the batch was committed under. Equals the previous applied
    /// sequence for an empty batch.
    pub sequence: SequenceNumber,
    /// Per-operation results; `Some` holds the bytes taken out by a remove.
    pub results: Vec<Option<Vec<u8>>>,
}

/// What recovery found when the store was opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Committed batches re-applied to the storage file.
    pub replayed: usize,
    /// Committed batches skipped because the file already had them.
    pub already_applied: usize,
    /// Transactions without a commit marker that were discarded.
    pub discarded: usize,
    /// Bytes of unreferenced storage-file tail that were cut off.
    pub truncated_bytes: u64,
    /// Why a lenient replay stopped early, if it did.
    pub stopped_by: Option<String>,
    /// First transaction ID that is free to use.
    pub next_txid: u64,
}

struct StoreState {
    file: StorageFile,
    snapshot: Snapshot,
    /// Set when a failed commit could not be rolled back.
    poisoned: bool,
}

/// Transactional store of variables.
pub struct VariableStore {
    state: RwLock<StoreState>,
    wal: WalManager,
    next_var_id: AtomicU64,
    sync_on_commit: bool,
}

impl VariableStore {
    /// Opens a store over a storage-file backend and a WAL backend,
    /// replaying the WAL.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage file is damaged, if the WAL is
    /// corrupt and `strict_recovery` is set, or on I/O failure.
    pub fn open(
        data: Box<dyn StorageBackend>,
        wal: Box<dyn StorageBackend>,
        config: &Config,
    ) -> CoreResult<(Self, RecoveryReport)> {
        let (mut file, snapshot) = StorageFile::open(data, config.format_version)?;
        let mut report = RecoveryReport::default();

        let hwm = snapshot.high_water_mark();
        let size = file.size()?;
        if size > hwm {
            // remains of a commit that never published its header
            file.truncate(hwm)?;
            report.truncated_bytes = size - hwm;
            tracing::debug!(from = size, to = hwm, "truncated unpublished storage tail");
        }

        let wal = WalManager::new(wal, config.sync_on_commit)
            .with_max_record_size(config.max_wal_record_size);
        let scan = RecoveryScan::scan(wal.iter()?, config.strict_recovery)?;
        if let Some(reason) = scan.stopped_by() {
            tracing::warn!(reason, valid_len = scan.valid_len(), "WAL replay stopped at corrupt record");
            report.stopped_by = Some(reason.to_string());
        }
        report.discarded = scan.uncommitted_count();
        report.next_txid = scan.next_txid();

        let mut state = StoreState {
            file,
            snapshot,
            poisoned: false,
        };
        let next_var_id = AtomicU64::new(state.snapshot.directory.next_id().as_u64());

        for txn in scan.into_committed() {
            if txn.sequence <= state.snapshot.header.applied_seq {
                report.already_applied += 1;
                continue;
            }

            let replayed = txn
                .records
                .iter()
                .filter_map(|record| Operation::from_wal(record).transpose())
                .collect::<CoreResult<Vec<_>>>()
                .and_then(|ops| state.stage(&ops))
                .and_then(|(staged, _)| {
                    let next_id = VariableId::new(next_var_id.load(Ordering::SeqCst));
                    let next = state.write_changes(staged.into_changes(), txn.sequence, next_id, true)?;
                    state.publish(&next.header, true)?;
                    next_var_id.fetch_max(next.directory.next_id().as_u64(), Ordering::SeqCst);
                    state.snapshot = next;
                    Ok(())
                });

            match replayed {
                Ok(()) => {
                    tracing::debug!(txid = %txn.txid, seq = %txn.sequence, "replayed committed transaction");
                    report.replayed += 1;
                }
                Err(e) if e.kind() == ErrorKind::Io => return Err(e),
                Err(e) if config.strict_recovery => {
                    return Err(CoreError::wal_corruption(format!(
                        "replay of {} ({}) failed: {e}",
                        txn.txid, txn.sequence
                    )));
                }
                Err(e) => {
                    tracing::warn!(txid = %txn.txid, error = %e, "WAL replay stopped at unreplayable transaction");
                    report.stopped_by = Some(e.to_string());
                    break;
                }
            }
        }

        if wal.size()? > 0 {
            wal.clear()?;
        }

        tracing::info!(
            applied_seq = %state.snapshot.header.applied_seq,
            variables = state.snapshot.directory.len(),
            replayed = report.replayed,
            discarded = report.discarded,
            "store opened"
        );

        Ok((
            Self {
                state: RwLock::new(state),
                wal,
                next_var_id,
                sync_on_commit: config.sync_on_commit,
            },
            report,
        ))
    }

    /// Resolves a variable name.
    ///
    /// # Errors
    ///
    /// Returns `VariableNotFound` if no variable has this name.
    pub fn lookup(&self, name: &str) -> CoreResult<VariableId> {
        self.state.read().snapshot.directory.lookup(name)
    }

    /// Returns the committed length of a variable.
    ///
    /// # Errors
    ///
    /// Returns `VariableIdNotFound` for an unknown or deleted ID.
    pub fn length(&self, id: VariableId) -> CoreResult<u64> {
        self.state.read().snapshot.directory.length(id)
    }

    /// Lists live variables ordered by ID.
    #[must_use]
    pub fn list(&self) -> Vec<VariableEntry> {
        self.state.read().snapshot.directory.list().cloned().collect()
    }

    /// Returns a copy of the committed header, directory and free list.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.state.read().snapshot.clone()
    }

    /// Returns the sequence of the last applied commit.
    #[must_use]
    pub fn applied_seq(&self) -> SequenceNumber {
        self.state.read().snapshot.header.applied_seq
    }

    /// Reads committed bytes.
    ///
    /// Only the span between the lowest and highest addressed position is
    /// read from the file.
    ///
    /// # Errors
    ///
    /// Returns `VariableIdNotFound` or `OutOfRange`.
    pub fn read(&self, id: VariableId, stride: &Stride) -> CoreResult<Vec<u8>> {
        let st = self.state.read();
        let entry = st.snapshot.directory.get(id)?;
        stride.check_bounds(entry.len())?;
        let Some((lo, hi)) = stride.bounds() else {
            return Ok(Vec::new());
        };

        let span = st.file.read_at(entry.extent.offset + lo, hi - lo + 1)?;
        Ok(stride.positions().map(|p| span[(p - lo) as usize]).collect())
    }

    /// Hands out a variable ID that will never be handed out again.
    pub fn reserve_id(&self) -> VariableId {
        VariableId::new(self.next_var_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Returns a fresh view of the committed state for a new transaction.
    #[must_use]
    pub fn view(&self) -> StagedState {
        self.state.read().view()
    }

    /// Validates `op` against a transaction's pending view and logs it.
    ///
    /// # Errors
    ///
    /// Returns the validation error, or `TransactionFailed` if operations
    /// submitted earlier no longer apply to the committed state.
    pub fn submit(&self, txn: &mut Transaction, op: Operation) -> CoreResult<Option<Vec<u8>>> {
        let st = self.state.read();
        st.refresh(txn)?;
        let mut load = |entry: &VariableEntry| st.file.read_extent(entry.extent);
        txn.submit(op, &mut load)
    }

    /// Reads through a transaction's pending view.
    ///
    /// # Errors
    ///
    /// As [`Self::read`], or `TransactionFailed` for a conflicting view.
    pub fn read_in_txn(&self, txn: &mut Transaction, id: VariableId, stride: &Stride) -> CoreResult<Vec<u8>> {
        let st = self.state.read();
        st.refresh(txn)?;
        let mut load = |entry: &VariableEntry| st.file.read_extent(entry.extent);
        txn.view_mut().read(id, stride, &mut load)
    }

    /// Returns a variable's length as seen by a transaction.
    ///
    /// # Errors
    ///
    /// As [`Self::length`], or `TransactionFailed` for a conflicting view.
    pub fn length_in_txn(&self, txn: &mut Transaction, id: VariableId) -> CoreResult<u64> {
        let st = self.state.read();
        st.refresh(txn)?;
        txn.view_mut().length(id)
    }

    /// Atomically applies a batch of operations.
    ///
    /// # Errors
    ///
    /// Returns the first validation error (nothing is written), or the I/O
    /// error that aborted the commit after its partial writes were undone.
    pub fn commit(&self, txid: TransactionId, ops: &[Operation]) -> CoreResult<CommitOutcome> {
        let mut st = self.state.write();
        if st.poisoned {
            return Err(CoreError::invalid_operation(
                "store needs reopening after a failed rollback",
            ));
        }

        let (staged, results) = st.stage(ops)?;
        let applied = st.snapshot.header.applied_seq;
        if ops.is_empty() {
            return Ok(CommitOutcome {
                sequence: applied,
                results,
            });
        }
        let sequence = applied.next();

        let mut records = Vec::with_capacity(ops.len() + 2);
        records.push(WalRecord::Begin { txid });
        records.extend(ops.iter().map(|op| op.to_wal(txid)));
        records.push(WalRecord::Commit { txid, sequence });

        let wal_start = self.wal.size()?;
        let file_start = st.file.size()?;
        let next_id = VariableId::new(self.next_var_id.load(Ordering::SeqCst));

        let mut header_touched = false;
        let result = self
            .wal
            .append_batch(&records)
            .and_then(|_| st.write_changes(staged.into_changes(), sequence, next_id, self.sync_on_commit))
            .and_then(|next| {
                header_touched = true;
                st.publish(&next.header, self.sync_on_commit)?;
                Ok(next)
            });

        let next = match result {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!(%txid, error = %e, "commit failed, rolling back");
                if let Err(rollback) = self.rollback(&mut st, wal_start, file_start, header_touched) {
                    tracing::error!(%txid, error = %rollback, "rollback failed, store poisoned");
                    st.poisoned = true;
                }
                return Err(e);
            }
        };

        st.snapshot = next;
        tracing::debug!(%txid, seq = %sequence, ops = ops.len(), "committed");

        if let Err(e) = self.wal.clear() {
            tracing::warn!(%txid, error = %e, "failed to clear WAL after commit");
        }

        Ok(CommitOutcome { sequence, results })
    }

    fn rollback(&self, st: &mut StoreState, wal_start: u64, file_start: u64, header_touched: bool) -> CoreResult<()> {
        self.wal.truncate(wal_start)?;
        self.wal.sync()?;
        if header_touched {
            // the slot the failed header went to; the current one is untouched
            let slot = ((st.snapshot.header.generation + 1) % 2) * HEADER_SLOT_SIZE as u64;
            st.file.write_at(slot, &[0u8; HEADER_SLOT_SIZE])?;
        }
        st.file.truncate(file_start)?;
        st.file.sync()
    }

    /// Syncs both files and empties the WAL.
    ///
    /// # Errors
    ///
    /// Returns an I/O error.
    pub fn checkpoint(&self) -> CoreResult<()> {
        let mut st = self.state.write();
        st.file.sync()?;
        self.wal.clear()?;
        self.wal.sync()
    }

    /// Flushes pending writes for shutdown.
    ///
    /// # Errors
    ///
    /// Returns an I/O error.
    pub fn close(&self) -> CoreResult<()> {
        let mut st = self.state.write();
        st.file.sync()?;
        self.wal.sync()
    }

    #[cfg(test)]
    pub(crate) fn wal_for_testing(&self) -> &WalManager {
        &self.wal
    }
}

impl StoreState {
    fn view(&self) -> StagedState {
        StagedState::new(self.snapshot.directory.clone(), self.snapshot.header.applied_seq)
    }

    /// Simulates `ops` against the committed state.
    fn stage(&self, ops: &[Operation]) -> CoreResult<(StagedState, Vec<Option<Vec<u8>>>)> {
        let mut view = self.view();
        let mut load = |entry: &VariableEntry| self.file.read_extent(entry.extent);
        let results = ops
            .iter()
            .map(|op| view.apply(op, &mut load))
            .collect::<CoreResult<Vec<_>>>()?;
        Ok((view, results))
    }

    /// Rebuilds a transaction's view if commits happened since it was taken.
    ///
    /// A transaction whose operations no longer apply is aborted.
    fn refresh(&self, txn: &mut Transaction) -> CoreResult<()> {
        txn.ensure_active()?;
        if txn.snapshot_seq() == self.snapshot.header.applied_seq {
            return Ok(());
        }
        let (view, _) = match self.stage(txn.operations()) {
            Ok(staged) => staged,
            Err(e) => {
                txn.mark_aborted();
                return Err(e.into_transaction_failed(txn.id()));
            }
        };
        tracing::trace!(txid = %txn.id(), seq = %view.base_seq(), "rebuilt transaction view");
        txn.replace_view(view);
        Ok(())
    }

    /// Writes changed variables and a new catalog.
    ///
    /// Nothing the current header references is overwritten. Returns the
    /// snapshot to publish.
    fn write_changes(
        &mut self,
        changes: StagedChanges,
        sequence: SequenceNumber,
        next_id: VariableId,
        sync: bool,
    ) -> CoreResult<Snapshot> {
        let StagedChanges {
            mut directory,
            dirty,
            deleted,
        } = changes;
        let mut free = self.snapshot.free.clone();
        let mut end = self.file.size()?;
        let mut released = Vec::with_capacity(dirty.len() + deleted.len() + 1);

        for (id, bytes) in &dirty {
            if let Ok(old) = self.snapshot.directory.get(*id) {
                released.push(old.extent);
            }
            let len = bytes.len() as u64;
            let extent = free.allocate(len).unwrap_or_else(|| {
                let extent = Extent::new(end, len);
                end += len;
                extent
            });
            if !extent.is_empty() {
                self.file.write_at(extent.offset, bytes)?;
            }
            directory.set_extent(*id, extent)?;
        }

        released.extend(deleted.iter().map(|entry| entry.extent));
        released.push(self.snapshot.header.catalog);
        for extent in released {
            free.release(extent);
        }

        let next_id = VariableId::new(next_id.as_u64().max(directory.next_id().as_u64()));
        let catalog = self.file.append_catalog(&directory, &free, next_id)?;
        if sync {
            self.file.sync()?;
        }

        Ok(Snapshot {
            header: self.snapshot.header.next(sequence, catalog),
            directory,
            free,
        })
    }

    fn publish(&mut self, header: &FileHeader, sync: bool) -> CoreResult<()> {
        self.file.write_header(header)?;
        if sync {
            self.file.sync()
        } else {
            self.file.flush()
        }
    }
}

impl std::fmt::Debug for VariableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state.read();
        f.debug_struct("VariableStore")
            .field("applied_seq", &st.snapshot.header.applied_seq)
            .field("variables", &st.snapshot.directory.len())
            .field("poisoned", &st.poisoned)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionManager;
    use nsfslite_storage::InMemoryBackend;

    struct Backends {
        data: InMemoryBackend,
        wal: InMemoryBackend,
    }

    impl Backends {
        fn new() -> Self {
            Self {
                data: InMemoryBackend::new(),
                wal: InMemoryBackend::new(),
            }
        }

        fn open(&self) -> (VariableStore, RecoveryReport) {
            VariableStore::open(
                Box::new(self.data.clone()),
                Box::new(self.wal.clone()),
                &Config::default(),
            )
            .unwrap()
        }
    }

    fn create(store: &VariableStore, name: &str) -> VariableId {
        let id = store.reserve_id();
        store
            .commit(
                TransactionId::new(1),
                &[Operation::Create {
                    id,
                    name: name.into(),
                }],
            )
            .unwrap();
        id
    }

    fn insert(store: &VariableStore, id: VariableId, offset: u64, data: &[u8]) {
        store
            .commit(
                TransactionId::new(2),
                &[Operation::Insert {
                    id,
                    offset,
                    data: data.to_vec(),
                }],
            )
            .unwrap();
    }

    #[test]
    fn commit_then_read() {
        let backends = Backends::new();
        let (store, _) = backends.open();
        let id = create(&store, "greeting");
        insert(&store, id, 0, b"Hello, World!");

        assert_eq!(store.length(id).unwrap(), 13);
        let all = Stride::contiguous(0, 13).unwrap();
        assert_eq!(store.read(id, &all).unwrap(), b"Hello, World!");
        let evens = Stride::from_slice(0, 13, 2).unwrap();
        assert_eq!(store.read(id, &evens).unwrap(), b"Hlo ol!");
        assert_eq!(store.applied_seq(), SequenceNumber::new(2));
        assert_eq!(store.wal_for_testing().size().unwrap(), 0);
    }

    #[test]
    fn wide_element_read_skips_gaps() {
        let backends = Backends::new();
        let (store, _) = backends.open();
        let id = create(&store, "ints");
        let words: Vec<u8> = (0u32..6).flat_map(u32::to_le_bytes).collect();
        insert(&store, id, 0, &words);

        let odd_words = Stride::with_elem_size(4, 2, 3, 4).unwrap();
        let expected: Vec<u8> = [1u32, 3, 5].iter().flat_map(|w| w.to_le_bytes()).collect();
        assert_eq!(store.read(id, &odd_words).unwrap(), expected);
    }

    #[test]
    fn rejected_batch_writes_nothing() {
        let backends = Backends::new();
        let (store, _) = backends.open();
        let id = create(&store, "v");
        insert(&store, id, 0, b"abc");
        let size_before = backends.data.data().len();

        let err = store
            .commit(
                TransactionId::new(3),
                &[
                    Operation::Insert {
                        id,
                        offset: 3,
                        data: b"def".to_vec(),
                    },
                    Operation::Remove {
                        id,
                        stride: Stride::contiguous(10, 1).unwrap(),
                    },
                ],
            )
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::OutOfRange);
        assert_eq!(backends.data.data().len(), size_before);
        assert_eq!(store.length(id).unwrap(), 3);
        assert_eq!(store.applied_seq(), SequenceNumber::new(2));
    }

    #[test]
    fn committed_state_survives_reopen() {
        let backends = Backends::new();
        let id = {
            let (store, _) = backends.open();
            let id = create(&store, "v");
            insert(&store, id, 0, b"persist me");
            id
        };

        let (store, report) = backends.open();
        assert_eq!(report.replayed, 0);
        assert_eq!(store.lookup("v").unwrap(), id);
        assert_eq!(
            store.read(id, &Stride::contiguous(0, 10).unwrap()).unwrap(),
            b"persist me"
        );
        assert!(store.reserve_id() > id);
    }

    #[test]
    fn logged_but_unpublished_commit_is_replayed() {
        let backends = Backends::new();
        let id = {
            let (store, _) = backends.open();
            create(&store, "v")
        };

        // a commit that reached the WAL but not the storage file
        let txid = TransactionId::new(9);
        let records = [
            WalRecord::Begin { txid },
            WalRecord::Insert {
                txid,
                var_id: id,
                offset: 0,
                data: b"late".to_vec(),
            },
            WalRecord::Commit {
                txid,
                sequence: SequenceNumber::new(2),
            },
        ];
        WalManager::new(Box::new(backends.wal.clone()), false)
            .append_batch(&records)
            .unwrap();

        let (store, report) = backends.open();
        assert_eq!(report.replayed, 1);
        assert_eq!(report.next_txid, 10);
        assert_eq!(store.applied_seq(), SequenceNumber::new(2));
        assert_eq!(store.read(id, &Stride::contiguous(0, 4).unwrap()).unwrap(), b"late");
        assert!(backends.wal.data().is_empty());

        // a second open has nothing left to replay
        drop(store);
        let (store, report) = backends.open();
        assert_eq!(report.replayed, 0);
        assert_eq!(store.length(id).unwrap(), 4);
    }

    #[test]
    fn already_applied_commit_is_skipped() {
        let backends = Backends::new();
        let id = {
            let (store, _) = backends.open();
            let id = create(&store, "v");
            insert(&store, id, 0, b"once");
            id
        };

        let txid = TransactionId::new(2);
        WalManager::new(Box::new(backends.wal.clone()), false)
            .append_batch(&[
                WalRecord::Begin { txid },
                WalRecord::Insert {
                    txid,
                    var_id: id,
                    offset: 0,
                    data: b"once".to_vec(),
                },
                WalRecord::Commit {
                    txid,
                    sequence: SequenceNumber::new(2),
                },
            ])
            .unwrap();

        let (store, report) = backends.open();
        assert_eq!(report.already_applied, 1);
        assert_eq!(store.length(id).unwrap(), 4);
    }

    #[test]
    fn unpublished_tail_is_truncated() {
        let backends = Backends::new();
        {
            let (store, _) = backends.open();
            create(&store, "v");
        }
        let mut raw = backends.data.clone();
        raw.append(b"garbage from a torn commit").unwrap();

        let (_, report) = backends.open();
        assert_eq!(report.truncated_bytes, 26);
    }

    #[test]
    fn transaction_view_follows_other_commits() {
        let backends = Backends::new();
        let (store, _) = backends.open();
        let id = create(&store, "v");
        insert(&store, id, 0, b"abc");

        let tm = TransactionManager::new();
        let handle = tm.begin(store.view());
        let txn = tm.get(handle).unwrap();
        store
            .submit(
                &mut txn.lock(),
                Operation::Insert {
                    id,
                    offset: 3,
                    data: b"!".to_vec(),
                },
            )
            .unwrap();

        insert(&store, id, 0, b">>");

        let all = Stride::contiguous(0, 6).unwrap();
        // the pending insert is re-applied at its offset over the new contents
        assert_eq!(store.read_in_txn(&mut txn.lock(), id, &all).unwrap(), b">>a!bc");
        assert_eq!(store.length(id).unwrap(), 5);
    }

    #[test]
    fn conflicting_view_fails_transaction() {
        let backends = Backends::new();
        let (store, _) = backends.open();
        let id = create(&store, "v");

        let tm = TransactionManager::new();
        let handle = tm.begin(store.view());
        let txn = tm.get(handle).unwrap();
        store
            .submit(
                &mut txn.lock(),
                Operation::Insert {
                    id,
                    offset: 0,
                    data: b"x".to_vec(),
                },
            )
            .unwrap();

        store
            .commit(TransactionId::new(5), &[Operation::Delete { name: "v".into() }])
            .unwrap();

        let err = store
            .length_in_txn(&mut txn.lock(), id)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransactionFailed);
    }

    #[test]
    fn freed_extents_are_reused() {
        let backends = Backends::new();
        let (store, _) = backends.open();
        let id = create(&store, "v");
        insert(&store, id, 0, &[7u8; 64]);
        insert(&store, id, 0, &[8u8; 64]);
        let size = backends.data.data().len();

        // shrinking rewrites the variable into space freed earlier
        store
            .commit(
                TransactionId::new(3),
                &[Operation::Remove {
                    id,
                    stride: Stride::contiguous(0, 100).unwrap(),
                }],
            )
            .unwrap();
        assert!(!store.snapshot().free.is_empty());
        assert!(backends.data.data().len() <= size + 256);
        assert_eq!(store.length(id).unwrap(), 28);
    }
}
