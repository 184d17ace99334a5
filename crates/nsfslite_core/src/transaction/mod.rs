//! Transactions.
//!
//! A transaction is an ordered log of [`Operation`]s plus a private view of
//! the store with those operations applied. Nothing reaches the storage
//! file until commit, which re-validates the whole log against the state
//! committed at that moment:
//! - **Atomicity**: the log is applied completely or not at all
//! - **Ordering**: operations apply in submission order
//! - **Durability**: the log and a commit marker reach the WAL first

mod manager;
mod staging;
mod state;

pub use manager::{TransactionManager, TxnHandle};
pub use staging::{StagedChanges, StagedState};
pub use state::{Operation, Transaction, TransactionState};
