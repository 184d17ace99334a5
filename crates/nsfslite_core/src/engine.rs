//! Engine facade.

use crate::config::Config;
use crate::directory::VariableEntry;
use crate::error::{CoreError, CoreResult, ErrorKind};
use crate::lock::StoreLock;
use crate::storage::Snapshot;
use crate::store::{RecoveryReport, VariableStore};
use crate::stride::Stride;
use crate::transaction::{Operation, TransactionManager, TxnHandle};
use crate::types::{SequenceNumber, VariableId};
use nsfslite_storage::{FileBackend, StorageBackend};
use parking_lot::{Mutex, RwLock};
use std::path::Path;

/// An open nsfslite store.
///
/// `Engine` owns the storage file, the WAL, the variable directory and all
/// open transactions. Every mutating call takes an optional transaction:
/// with `None` the operation commits on its own, with `Some` it is
/// validated against that transaction's pending view and applied when the
/// transaction commits. An operation the pending view rejects aborts its
/// transaction, so the commit then fails and applies nothing.
///
/// # Example
///
/// ```rust
/// use nsfslite_core::{Engine, Stride};
///
/// let engine = Engine::open_in_memory()?;
/// let id = engine.create_variable("greeting", None)?;
/// engine.insert(id, None, 0, b"Hello, World!")?;
///
/// let removed = engine.remove(id, None, &Stride::from_slice(0, 5, 1)?, true)?;
/// assert_eq!(removed.as_deref(), Some(&b"Hello"[..]));
/// assert_eq!(engine.read_all(id)?, b", World!");
/// # Ok::<(), nsfslite_core::CoreError>(())
/// ```
///
/// Several operations commit atomically through a transaction:
///
/// ```rust
/// use nsfslite_core::{Engine, Stride};
///
/// let engine = Engine::open_in_memory()?;
/// let id = engine.create_variable("v", None)?;
///
/// let txn = engine.begin_txn()?;
/// engine.insert(id, Some(txn), 0, b"abcd")?;
/// engine.write(id, Some(txn), &Stride::from_slice(0, 4, 2)?, b"XY")?;
/// assert_eq!(engine.length(id)?, 0);
///
/// engine.commit(txn)?;
/// assert_eq!(engine.read_all(id)?, b"XbYd");
/// # Ok::<(), nsfslite_core::CoreError>(())
/// ```
pub struct Engine {
    config: Config,
    store: VariableStore,
    txns: TransactionManager,
    recovery: RecoveryReport,
    /// Lock file, held while open. None for backend-only engines.
    lock: Mutex<Option<StoreLock>>,
    is_open: RwLock<bool>,
}

impl Engine {
    /// Opens a store from a storage-file path and a WAL path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - either path is empty (`InvalidArgument`)
    /// - another process has the store open (`DatabaseLocked`)
    /// - the files are missing and `create_if_missing` is false
    /// - the storage file or WAL is corrupt
    pub fn open(db_path: impl AsRef<Path>, wal_path: impl AsRef<Path>, config: Config) -> CoreResult<Self> {
        let db_path = db_path.as_ref();
        let wal_path = wal_path.as_ref();
        if db_path.as_os_str().is_empty() || wal_path.as_os_str().is_empty() {
            return Err(CoreError::invalid_argument("store and WAL paths must be non-empty"));
        }
        if db_path == wal_path {
            return Err(CoreError::invalid_argument("store and WAL must be different files"));
        }

        let lock = if config.lock_file {
            Some(StoreLock::acquire(db_path)?)
        } else {
            None
        };

        let open_backend = |path: &Path| -> CoreResult<Box<dyn StorageBackend>> {
            let backend = if config.create_if_missing {
                FileBackend::open_with_create_dirs(path)?
            } else {
                FileBackend::open_existing(path)?
            };
            Ok(Box::new(backend))
        };
        let data = open_backend(db_path)?;
        let wal = open_backend(wal_path)?;

        let engine = Self::open_with_backends(config, data, wal)?;
        *engine.lock.lock() = lock;
        tracing::info!(db = %db_path.display(), wal = %wal_path.display(), "engine opened");
        Ok(engine)
    }

    /// Opens an engine over existing backends.
    ///
    /// # Errors
    ///
    /// Returns an error if the backends hold a corrupt store.
    pub fn open_with_backends(
        config: Config,
        data: Box<dyn StorageBackend>,
        wal: Box<dyn StorageBackend>,
    ) -> CoreResult<Self> {
        let (store, recovery) = VariableStore::open(data, wal, &config)?;
        let txns = TransactionManager::with_state(recovery.next_txid);

        Ok(Self {
            config,
            store,
            txns,
            recovery,
            lock: Mutex::new(None),
            is_open: RwLock::new(true),
        })
    }

    /// Opens a fresh in-memory engine.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature matches the other openers.
    pub fn open_in_memory() -> CoreResult<Self> {
        use nsfslite_storage::InMemoryBackend;
        Self::open_with_backends(
            Config::default(),
            Box::new(InMemoryBackend::new()),
            Box::new(InMemoryBackend::new()),
        )
    }

    // ------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------

    /// Creates a variable and returns its new ID.
    ///
    /// Inside a transaction the ID is reserved immediately but the variable
    /// only becomes visible to other callers on commit.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the name is taken, or `InvalidArgument`
    /// for an empty or oversized name.
    pub fn create_variable(&self, name: &str, txn: Option<TxnHandle>) -> CoreResult<VariableId> {
        self.ensure_open()?;
        let id = self.store.reserve_id();
        self.apply(
            txn,
            Operation::Create {
                id,
                name: name.to_string(),
            },
        )?;
        Ok(id)
    }

    /// Resolves a committed variable name.
    ///
    /// # Errors
    ///
    /// Returns `VariableNotFound` if no variable has this name.
    pub fn get_id(&self, name: &str) -> CoreResult<VariableId> {
        self.ensure_open()?;
        self.store.lookup(name)
    }

    /// Deletes a variable. Its ID is never reused.
    ///
    /// # Errors
    ///
    /// Returns `VariableNotFound` if no variable has this name.
    pub fn delete_variable(&self, name: &str, txn: Option<TxnHandle>) -> CoreResult<()> {
        self.ensure_open()?;
        self.apply(txn, Operation::Delete { name: name.to_string() })?;
        Ok(())
    }

    /// Returns the committed length of a variable in bytes.
    ///
    /// # Errors
    ///
    /// Returns `VariableIdNotFound` for an unknown or deleted ID.
    pub fn length(&self, id: VariableId) -> CoreResult<u64> {
        self.ensure_open()?;
        self.store.length(id)
    }

    /// Lists committed variables ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseClosed` after close.
    pub fn list(&self) -> CoreResult<Vec<VariableEntry>> {
        self.ensure_open()?;
        Ok(self.store.list())
    }

    // ------------------------------------------------------------------
    // Data
    // ------------------------------------------------------------------

    /// Splices `data` into a variable at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `offset` is past the end of the variable.
    pub fn insert(&self, id: VariableId, txn: Option<TxnHandle>, offset: u64, data: &[u8]) -> CoreResult<()> {
        self.ensure_open()?;
        self.apply(
            txn,
            Operation::Insert {
                id,
                offset,
                data: data.to_vec(),
            },
        )?;
        Ok(())
    }

    /// Reads the committed bytes of the addressed elements.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if any position is past the end.
    pub fn read(&self, id: VariableId, stride: &Stride) -> CoreResult<Vec<u8>> {
        self.ensure_open()?;
        self.store.read(id, stride)
    }

    /// Reads a whole committed variable.
    ///
    /// # Errors
    ///
    /// Returns `VariableIdNotFound` for an unknown ID.
    pub fn read_all(&self, id: VariableId) -> CoreResult<Vec<u8>> {
        self.ensure_open()?;
        let len = self.store.length(id)?;
        self.store.read(id, &Stride::contiguous(0, len)?)
    }

    /// Overwrites the addressed elements with `data`, `elem_size` bytes
    /// each.
    ///
    /// # Errors
    ///
    /// Returns `SizeMismatch` unless `data` is exactly `stride.byte_len()`
    /// bytes, or `OutOfRange`.
    pub fn write(&self, id: VariableId, txn: Option<TxnHandle>, stride: &Stride, data: &[u8]) -> CoreResult<()> {
        self.ensure_open()?;
        self.apply(
            txn,
            Operation::Write {
                id,
                stride: *stride,
                data: data.to_vec(),
            },
        )?;
        Ok(())
    }

    /// Removes the addressed elements, closing the gaps.
    ///
    /// Returns the removed bytes in order when `return_data` is set.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if any position is past the end.
    pub fn remove(
        &self,
        id: VariableId,
        txn: Option<TxnHandle>,
        stride: &Stride,
        return_data: bool,
    ) -> CoreResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        let removed = self.apply(txn, Operation::Remove { id, stride: *stride })?;
        Ok(removed.filter(|_| return_data))
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseClosed` after close.
    pub fn begin_txn(&self) -> CoreResult<TxnHandle> {
        self.ensure_open()?;
        Ok(self.txns.begin(self.store.view()))
    }

    /// Commits a transaction. The handle is released either way.
    ///
    /// # Errors
    ///
    /// Returns `HandleNotFound` for a stale handle, or `TransactionFailed`
    /// wrapping the cause when nothing was applied.
    pub fn commit(&self, txn: TxnHandle) -> CoreResult<SequenceNumber> {
        self.ensure_open()?;
        let (txid, ops) = self.txns.take(txn)?;
        self.store
            .commit(txid, &ops)
            .map(|outcome| outcome.sequence)
            .map_err(|e| e.into_transaction_failed(txid))
    }

    /// Discards a transaction.
    ///
    /// # Errors
    ///
    /// Returns `HandleNotFound` for a stale handle.
    pub fn rollback(&self, txn: TxnHandle) -> CoreResult<()> {
        self.ensure_open()?;
        self.txns.rollback(txn)?;
        Ok(())
    }

    /// Reads through a transaction, seeing its uncommitted operations.
    ///
    /// # Errors
    ///
    /// As [`Self::read`], or `HandleNotFound` for a stale handle.
    pub fn read_in_txn(&self, txn: TxnHandle, id: VariableId, stride: &Stride) -> CoreResult<Vec<u8>> {
        self.ensure_open()?;
        let txn = self.txns.get(txn)?;
        let mut txn = txn.lock();
        self.store.read_in_txn(&mut txn, id, stride)
    }

    /// Returns a variable's length as seen by a transaction.
    ///
    /// # Errors
    ///
    /// As [`Self::length`], or `HandleNotFound` for a stale handle.
    pub fn length_in_txn(&self, txn: TxnHandle, id: VariableId) -> CoreResult<u64> {
        self.ensure_open()?;
        let txn = self.txns.get(txn)?;
        let mut txn = txn.lock();
        self.store.length_in_txn(&mut txn, id)
    }

    /// Runs `f` in a transaction, committing on `Ok` and rolling back on
    /// `Err`.
    ///
    /// # Errors
    ///
    /// Returns the error from `f` or from the commit.
    pub fn transaction<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(TxnHandle) -> CoreResult<T>,
    {
        let txn = self.begin_txn()?;
        match f(txn) {
            Ok(value) => {
                self.commit(txn)?;
                Ok(value)
            }
            Err(e) => {
                // the closure may already have committed or rolled back
                let _ = self.txns.rollback(txn);
                Err(e)
            }
        }
    }

    fn apply(&self, txn: Option<TxnHandle>, op: Operation) -> CoreResult<Option<Vec<u8>>> {
        match txn {
            Some(handle) => {
                let txn = self.txns.get(handle)?;
                let mut txn = txn.lock();
                self.store.submit(&mut txn, op)
            }
            None => {
                let txid = self.txns.allocate_txid();
                let mut outcome = self
                    .store
                    .commit(txid, std::slice::from_ref(&op))
                    .map_err(|e| match e.kind() {
                        // validation errors pass through unwrapped
                        ErrorKind::Io => e.into_transaction_failed(txid),
                        _ => e,
                    })?;
                Ok(outcome.results.pop().flatten())
            }
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Syncs the storage file and empties the WAL.
    ///
    /// # Errors
    ///
    /// Returns an I/O error.
    pub fn checkpoint(&self) -> CoreResult<()> {
        self.ensure_open()?;
        self.store.checkpoint()
    }

    /// Returns the sequence of the last applied commit.
    #[must_use]
    pub fn applied_seq(&self) -> SequenceNumber {
        self.store.applied_seq()
    }

    /// Returns the committed header, directory and free list.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    /// Returns what recovery did when the engine was opened.
    #[must_use]
    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery
    }

    /// Returns the number of open transactions.
    #[must_use]
    pub fn open_transactions(&self) -> usize {
        self.txns.open_count()
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Closes the engine, discarding open transactions.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the final sync fails.
    pub fn close(&self) -> CoreResult<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }

        let aborted = self.txns.abort_all();
        self.store.close()?;
        *is_open = false;
        self.lock.lock().take();

        tracing::info!(aborted, "engine closed");
        Ok(())
    }

    /// Checks if the engine is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if *self.is_open.read() {
            Ok(())
        } else {
            Err(CoreError::DatabaseClosed)
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("is_open", &self.is_open())
            .field("store", &self.store)
            .field("txns", &self.txns)
            .finish_non_exhaustive()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
