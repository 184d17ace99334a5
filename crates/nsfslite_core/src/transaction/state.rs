//! Transaction state.

use crate::directory::VariableEntry;
use crate::error::{CoreError, CoreResult};
use crate::stride::Stride;
use crate::transaction::staging::StagedState;
use crate::types::{SequenceNumber, TransactionId, VariableId};
use crate::wal::WalRecord;

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted.
    Aborted,
}

/// One mutating step of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Create a variable under an ID reserved at submission.
    Create {
        /// Reserved ID.
        id: VariableId,
        /// Variable name.
        name: String,
    },
    /// Delete a variable.
    Delete {
        /// Variable name.
        name: String,
    },
    /// Splice bytes in at `offset`.
    Insert {
        /// Target variable.
        id: VariableId,
        /// Byte offset, at most the current length.
        offset: u64,
        /// Bytes to insert.
        data: Vec<u8>,
    },
    /// Overwrite strided elements.
    Write {
        /// Target variable.
        id: VariableId,
        /// Addressed elements.
        stride: Stride,
        /// `stride.byte_len()` replacement bytes.
        data: Vec<u8>,
    },
    /// Remove strided elements.
    Remove {
        /// Target variable.
        id: VariableId,
        /// Addressed elements.
        stride: Stride,
    },
}

impl Operation {
    /// Returns the WAL record logging this operation.
    #[must_use]
    pub fn to_wal(&self, txid: TransactionId) -> WalRecord {
        match self {
            Self::Create { id, name } => WalRecord::Create {
                txid,
                var_id: *id,
                name: name.clone(),
            },
            Self::Delete { name } => WalRecord::Delete {
                txid,
                name: name.clone(),
            },
            Self::Insert { id, offset, data } => WalRecord::Insert {
                txid,
                var_id: *id,
                offset: *offset,
                data: data.clone(),
            },
            Self::Write { id, stride, data } => WalRecord::Write {
                txid,
                var_id: *id,
                start: stride.start(),
                step: stride.step(),
                nelems: stride.nelems(),
                elem_size: stride.elem_size(),
                data: data.clone(),
            },
            Self::Remove { id, stride } => WalRecord::Remove {
                txid,
                var_id: *id,
                start: stride.start(),
                step: stride.step(),
                nelems: stride.nelems(),
                elem_size: stride.elem_size(),
            },
        }
    }

    /// Rebuilds an operation from a logged record.
    ///
    /// Returns `None` for `Begin` and `Commit` markers.
    ///
    /// # Errors
    ///
    /// Returns `WalCorruption` if a logged stride is malformed.
    pub fn from_wal(record: &WalRecord) -> CoreResult<Option<Self>> {
        let stride = |start: u64, step: u64, nelems: u64, elem_size: u64| {
            Stride::with_elem_size(start, step, nelems, elem_size)
                .map_err(|e| CoreError::wal_corruption(format!("logged stride invalid: {e}")))
        };

        let op = match record {
            WalRecord::Begin { .. } | WalRecord::Commit { .. } => return Ok(None),
            WalRecord::Create { var_id, name, .. } => Self::Create {
                id: *var_id,
                name: name.clone(),
            },
            WalRecord::Delete { name, .. } => Self::Delete { name: name.clone() },
            WalRecord::Insert {
                var_id,
                offset,
                data,
                ..
            } => Self::Insert {
                id: *var_id,
                offset: *offset,
                data: data.clone(),
            },
            WalRecord::Write {
                var_id,
                start,
                step,
                nelems,
                elem_size,
                data,
                ..
            } => Self::Write {
                id: *var_id,
                stride: stride(*start, *step, *nelems, *elem_size)?,
                data: data.clone(),
            },
            WalRecord::Remove {
                var_id,
                start,
                step,
                nelems,
                elem_size,
                ..
            } => Self::Remove {
                id: *var_id,
                stride: stride(*start, *step, *nelems, *elem_size)?,
            },
        };
        Ok(Some(op))
    }
}

/// An open transaction.
///
/// Holds the ordered operation log and a private view of the store with
/// those operations applied, so each submission is validated against
/// everything submitted before it.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
    ops: Vec<Operation>,
    view: StagedState,
}

impl Transaction {
    /// Creates a new transaction over a view of the committed state.
    pub(crate) fn new(id: TransactionId, view: StagedState) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            ops: Vec::new(),
            view,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the committed sequence the view was built from.
    #[must_use]
    pub fn snapshot_seq(&self) -> SequenceNumber {
        self.view.base_seq()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Returns the submitted operations in order.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    /// Returns the pending view.
    pub(crate) fn view_mut(&mut self) -> &mut StagedState {
        &mut self.view
    }

    /// Replaces a view that fell behind the committed state.
    pub(crate) fn replace_view(&mut self, view: StagedState) {
        self.view = view;
    }

    /// Validates `op` against the pending view and appends it to the log.
    ///
    /// Returns the bytes a `Remove` takes out. A rejected operation aborts
    /// the whole transaction: its log is dropped and a later commit fails.
    pub(crate) fn submit<L>(&mut self, op: Operation, load: &mut L) -> CoreResult<Option<Vec<u8>>>
    where
        L: FnMut(&VariableEntry) -> CoreResult<Vec<u8>>,
    {
        self.ensure_active()?;
        match self.view.apply(&op, load) {
            Ok(result) => {
                self.ops.push(op);
                Ok(result)
            }
            Err(e) => {
                tracing::debug!(txid = %self.id, error = %e, "operation rejected, aborting transaction");
                self.mark_aborted();
                Err(e)
            }
        }
    }

    /// Marks the transaction as committed and hands out its log.
    pub(crate) fn finish(&mut self) -> CoreResult<Vec<Operation>> {
        self.ensure_active()?;
        self.state = TransactionState::Committed;
        Ok(std::mem::take(&mut self.ops))
    }

    /// Marks the transaction as aborted and drops its log.
    pub(crate) fn mark_aborted(&mut self) {
        self.state = TransactionState::Aborted;
        self.ops.clear();
    }

    /// Ensures the transaction is active.
    pub(crate) fn ensure_active(&self) -> CoreResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed => Err(CoreError::invalid_operation(
                "transaction already committed",
            )),
            TransactionState::Aborted => {
                Err(CoreError::invalid_operation("transaction already aborted"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::VariableDirectory;
    use crate::error::ErrorKind;

    fn no_load(_: &VariableEntry) -> CoreResult<Vec<u8>> {
        Ok(Vec::new())
    }

    fn create_txn() -> Transaction {
        let view = StagedState::new(VariableDirectory::new(), SequenceNumber::new(0));
        Transaction::new(TransactionId::new(1), view)
    }

    #[test]
    fn new_transaction_is_active() {
        let txn = create_txn();
        assert!(txn.is_active());
        assert_eq!(txn.state(), TransactionState::Active);
        assert!(txn.operations().is_empty());
    }

    #[test]
    fn submit_records_in_order() {
        let mut txn = create_txn();
        let id = VariableId::new(1);
        txn.submit(
            Operation::Create {
                id,
                name: "v".into(),
            },
            &mut no_load,
        )
        .unwrap();
        txn.submit(
            Operation::Insert {
                id,
                offset: 0,
                data: b"abc".to_vec(),
            },
            &mut no_load,
        )
        .unwrap();

        assert_eq!(txn.operations().len(), 2);
        assert!(matches!(txn.operations()[1], Operation::Insert { .. }));
    }

    #[test]
    fn rejected_submission_aborts() {
        let mut txn = create_txn();
        let id = VariableId::new(1);
        txn.submit(
            Operation::Create {
                id,
                name: "v".into(),
            },
            &mut no_load,
        )
        .unwrap();
        let err = txn
            .submit(
                Operation::Insert {
                    id: VariableId::new(9),
                    offset: 0,
                    data: vec![1],
                },
                &mut no_load,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(txn.state(), TransactionState::Aborted);
        assert!(txn.operations().is_empty());

        let later = txn.submit(Operation::Delete { name: "v".into() }, &mut no_load);
        assert!(later.is_err());
        assert!(txn.finish().is_err());
    }

    #[test]
    fn cannot_submit_after_finish() {
        let mut txn = create_txn();
        txn.finish().unwrap();
        let result = txn.submit(Operation::Delete { name: "x".into() }, &mut no_load);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Closed);
        assert!(txn.finish().is_err());
    }

    #[test]
    fn cannot_submit_after_abort() {
        let mut txn = create_txn();
        txn.mark_aborted();
        assert_eq!(txn.state(), TransactionState::Aborted);
        let result = txn.submit(Operation::Delete { name: "x".into() }, &mut no_load);
        assert!(result.is_err());
    }

    #[test]
    fn wal_conversion_roundtrip() {
        let op = Operation::Write {
            id: VariableId::new(4),
            stride: Stride::with_elem_size(6, 2, 2, 3).unwrap(),
            data: vec![1, 2, 3, 4, 5, 6],
        };
        let record = op.to_wal(TransactionId::new(2));
        assert_eq!(record.txid(), TransactionId::new(2));
        assert_eq!(Operation::from_wal(&record).unwrap(), Some(op));

        let commit = WalRecord::Commit {
            txid: TransactionId::new(2),
            sequence: SequenceNumber::new(1),
        };
        assert_eq!(Operation::from_wal(&commit).unwrap(), None);
    }

    #[test]
    fn malformed_logged_stride_is_corruption() {
        let record = WalRecord::Remove {
            txid: TransactionId::new(1),
            var_id: VariableId::new(1),
            start: 0,
            step: 0,
            nelems: 1,
            elem_size: 1,
        };
        let err = Operation::from_wal(&record).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }
}
