//! Transaction manager.

use crate::error::{CoreError, CoreResult};
use crate::handle::{Handle, HandleArena};
use crate::transaction::staging::StagedState;
use crate::transaction::state::{Operation, Transaction};
use crate::types::TransactionId;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Opaque reference to an open transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxnHandle(Handle);

impl TxnHandle {
    /// Packs the handle into an integer for external callers.
    #[must_use]
    pub const fn to_raw(self) -> u64 {
        self.0.to_raw()
    }

    /// Unpacks an integer produced by [`Self::to_raw`].
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(Handle::from_raw(raw))
    }
}

impl fmt::Display for TxnHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-handle:{}", self.0)
    }
}

/// Tracks open transactions.
///
/// Transactions live in a handle arena so callers only hold an opaque
/// [`TxnHandle`]. Each transaction sits behind its own mutex; the arena lock
/// is only held long enough to look one up, so a slow or abandoned
/// transaction never blocks another.
pub struct TransactionManager {
    /// Next transaction ID.
    next_txid: AtomicU64,
    /// Open transactions.
    open: Mutex<HandleArena<Arc<Mutex<Transaction>>>>,
}

impl TransactionManager {
    /// Creates a transaction manager.
    #[must_use]
    pub fn new() -> Self {
        Self::with_state(1)
    }

    /// Creates a transaction manager continuing after recovered IDs.
    #[must_use]
    pub fn with_state(next_txid: u64) -> Self {
        Self {
            next_txid: AtomicU64::new(next_txid.max(1)),
            open: Mutex::new(HandleArena::new()),
        }
    }

    /// Allocates a transaction ID.
    pub fn allocate_txid(&self) -> TransactionId {
        TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst))
    }

    /// Opens a transaction over `view`.
    pub fn begin(&self, view: StagedState) -> TxnHandle {
        let txid = self.allocate_txid();
        let txn = Transaction::new(txid, view);
        let handle = TxnHandle(self.open.lock().insert(Arc::new(Mutex::new(txn))));
        tracing::trace!(%txid, %handle, "transaction started");
        handle
    }

    /// Returns an open transaction.
    ///
    /// # Errors
    ///
    /// Returns `HandleNotFound` for a stale or unknown handle.
    pub fn get(&self, handle: TxnHandle) -> CoreResult<Arc<Mutex<Transaction>>> {
        self.open
            .lock()
            .get(handle.0)
            .cloned()
            .ok_or_else(|| not_found(handle))
    }

    /// Closes a transaction for commit and returns its ID and log.
    ///
    /// The handle is invalid afterwards whatever the commit outcome.
    ///
    /// # Errors
    ///
    /// Returns `HandleNotFound` for a stale or unknown handle, or
    /// `TransactionFailed` if a rejected operation already aborted it.
    pub fn take(&self, handle: TxnHandle) -> CoreResult<(TransactionId, Vec<Operation>)> {
        let txn = self.open.lock().remove(handle.0).ok_or_else(|| not_found(handle))?;
        let mut txn = txn.lock();
        let txid = txn.id();
        let ops = txn.finish().map_err(|e| e.into_transaction_failed(txid))?;
        Ok((txid, ops))
    }

    /// Discards a transaction.
    ///
    /// # Errors
    ///
    /// Returns `HandleNotFound` for a stale or unknown handle.
    pub fn rollback(&self, handle: TxnHandle) -> CoreResult<TransactionId> {
        let txn = self.open.lock().remove(handle.0).ok_or_else(|| not_found(handle))?;
        let mut txn = txn.lock();
        txn.mark_aborted();
        tracing::trace!(txid = %txn.id(), "transaction rolled back");
        Ok(txn.id())
    }

    /// Aborts every open transaction.
    ///
    /// Returns how many were open.
    pub fn abort_all(&self) -> usize {
        let drained = self.open.lock().drain();
        for txn in &drained {
            txn.lock().mark_aborted();
        }
        drained.len()
    }

    /// Returns the number of open transactions.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.open.lock().len()
    }

    /// Returns the next transaction ID to be allocated.
    #[must_use]
    pub fn next_txid(&self) -> u64 {
        self.next_txid.load(Ordering::SeqCst)
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionManager")
            .field("next_txid", &self.next_txid())
            .field("open", &self.open_count())
            .finish()
    }
}

fn not_found(handle: TxnHandle) -> CoreError {
    CoreError::HandleNotFound {
        kind: "transaction",
        handle: handle.to_raw(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::VariableDirectory;
    use crate::error::ErrorKind;
    use crate::transaction::TransactionState;
    use crate::types::SequenceNumber;

    fn view() -> StagedState {
        StagedState::new(VariableDirectory::new(), SequenceNumber::new(0))
    }

    #[test]
    fn transaction_ids_increase() {
        let tm = TransactionManager::new();
        let a = tm.begin(view());
        let b = tm.begin(view());
        let ida = tm.get(a).unwrap().lock().id();
        let idb = tm.get(b).unwrap().lock().id();
        assert!(idb > ida);
        assert_eq!(tm.open_count(), 2);
    }

    #[test]
    fn with_state_continues_numbering() {
        let tm = TransactionManager::with_state(42);
        let h = tm.begin(view());
        assert_eq!(tm.get(h).unwrap().lock().id(), TransactionId::new(42));
        assert_eq!(tm.next_txid(), 43);
    }

    #[test]
    fn take_invalidates_handle() {
        let tm = TransactionManager::new();
        let h = tm.begin(view());
        let (_, ops) = tm.take(h).unwrap();
        assert!(ops.is_empty());

        let err = tm.take(h).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(tm.get(h).is_err());
    }

    #[test]
    fn take_of_aborted_transaction_fails() {
        let tm = TransactionManager::new();
        let h = tm.begin(view());
        tm.get(h).unwrap().lock().mark_aborted();

        let err = tm.take(h).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransactionFailed);
        assert_eq!(tm.open_count(), 0);
    }

    #[test]
    fn rollback_marks_aborted() {
        let tm = TransactionManager::new();
        let h = tm.begin(view());
        let txn = tm.get(h).unwrap();
        tm.rollback(h).unwrap();
        assert_eq!(txn.lock().state(), TransactionState::Aborted);
        assert_eq!(tm.rollback(h).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn abort_all_drains() {
        let tm = TransactionManager::new();
        let a = tm.begin(view());
        tm.begin(view());
        assert_eq!(tm.abort_all(), 2);
        assert_eq!(tm.open_count(), 0);
        assert!(tm.get(a).is_err());
    }

    #[test]
    fn raw_handle_roundtrip() {
        let tm = TransactionManager::new();
        let h = tm.begin(view());
        let raw = h.to_raw();
        assert!(tm.get(TxnHandle::from_raw(raw)).is_ok());
        assert!(tm.get(TxnHandle::from_raw(0)).is_err());
    }
}
