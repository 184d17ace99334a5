//! End-to-end scenarios through the handle-based API.

use nsfslite_core::api::{Nsfslite, ResultCode};
use nsfslite_core::ErrorKind;
use tempfile::tempdir;

struct Session {
    api: Nsfslite,
    handle: u64,
    _dir: tempfile::TempDir,
    db: std::path::PathBuf,
    wal: std::path::PathBuf,
}

impl Session {
    fn open() -> Self {
        let dir = tempdir().unwrap();
        let db = dir.path().join("store.nsfs");
        let wal = dir.path().join("store.wal");
        let api = Nsfslite::new();
        let handle = api.open(&db, &wal).unwrap();
        Self {
            api,
            handle,
            _dir: dir,
            db,
            wal,
        }
    }

    fn reopen(mut self) -> Self {
        self.api.close(self.handle).unwrap();
        self.handle = self.api.open(&self.db, &self.wal).unwrap();
        self
    }
}

#[test]
fn hello_world_round_trip() {
    let s = Session::open();
    let id = s.api.create_variable(s.handle, "greeting").unwrap();
    s.api.insert(s.handle, id, 0, b"Hello, World!").unwrap();

    assert_eq!(s.api.read(s.handle, id, 0, 13, 1).unwrap(), b"Hello, World!");
    assert_eq!(s.api.variable_length(s.handle, id).unwrap(), 13);
}

#[test]
fn remove_prefix_returns_removed_bytes() {
    let s = Session::open();
    let id = s.api.create_variable(s.handle, "greeting").unwrap();
    s.api.insert(s.handle, id, 0, b"Hello, World!").unwrap();

    let removed = s.api.remove(s.handle, id, 0, 5, 1, true).unwrap();
    assert_eq!(removed.as_deref(), Some(&b"Hello"[..]));
    assert_eq!(s.api.variable_length(s.handle, id).unwrap(), 8);
    assert_eq!(s.api.read(s.handle, id, 0, 8, 1).unwrap(), b", World!");

    let quiet = s.api.remove(s.handle, id, 0, 2, 1, false).unwrap();
    assert!(quiet.is_none());
    assert_eq!(s.api.read(s.handle, id, 0, 6, 1).unwrap(), b"World!");
}

#[test]
fn recreated_name_gets_new_id() {
    let s = Session::open();
    let first = s.api.create_variable(s.handle, "v").unwrap();
    s.api.delete_variable(s.handle, "v").unwrap();

    let err = s.api.get_variable(s.handle, "v").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let second = s.api.create_variable(s.handle, "v").unwrap();
    assert_ne!(first, second);

    // IDs stay unique across a restart
    let s = s.reopen();
    s.api.delete_variable(s.handle, "v").unwrap();
    let third = s.api.create_variable(s.handle, "v").unwrap();
    assert!(third > second);
}

#[test]
fn strided_write_leaves_odd_offsets_alone() {
    const N: i64 = 16;
    let s = Session::open();
    let id = s.api.create_variable(s.handle, "v").unwrap();
    let original: Vec<u8> = (0..2 * N as u8).collect();
    s.api.insert(s.handle, id, 0, &original).unwrap();

    let evens = vec![0xEE; N as usize];
    s.api.write(s.handle, id, 0, 2, &evens).unwrap();

    assert_eq!(s.api.read(s.handle, id, 0, 2 * N, 2).unwrap(), evens);
    let odds: Vec<u8> = original.iter().copied().skip(1).step_by(2).collect();
    assert_eq!(s.api.read(s.handle, id, 1, 2 * N, 2).unwrap(), odds);
}

#[test]
fn transaction_with_invalid_op_changes_nothing() {
    let s = Session::open();
    let id = s.api.create_variable(s.handle, "v").unwrap();
    s.api.insert(s.handle, id, 0, b"stable").unwrap();

    let txn = s.api.begin_txn(s.handle).unwrap();
    s.api.insert_txn(s.handle, id, txn, 0, b">>").unwrap();
    let err = s.api.write_txn(s.handle, id, txn, 50, 1, b"x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfRange);

    let err = s.api.commit(s.handle, txn).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransactionFailed);
    assert_eq!(s.api.read(s.handle, id, 0, 6, 1).unwrap(), b"stable");
    assert_eq!(s.api.variable_length(s.handle, id).unwrap(), 6);

    // nothing from the aborted transaction surfaces after a restart
    let s = s.reopen();
    assert_eq!(s.api.read(s.handle, id, 0, 6, 1).unwrap(), b"stable");
}

#[test]
fn conflicting_transaction_fails_at_commit() {
    let s = Session::open();
    let id = s.api.create_variable(s.handle, "v").unwrap();
    s.api.insert(s.handle, id, 0, b"0123456789").unwrap();

    let txn = s.api.begin_txn(s.handle).unwrap();
    s.api.write_txn(s.handle, id, txn, 8, 1, b"xy").unwrap();

    // shrink the variable underneath the open transaction
    s.api.remove(s.handle, id, 5, 10, 1, false).unwrap();

    let err = s.api.commit(s.handle, txn).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransactionFailed);
    assert_eq!(ResultCode::of(&err), ResultCode::TransactionFailed);
    assert!(s.api.last_error(s.handle).is_some());
    assert_eq!(s.api.read(s.handle, id, 0, 5, 1).unwrap(), b"01234");
    assert_eq!(s.api.last_error(s.handle), None);
}

#[test]
fn transaction_survives_restart() {
    let s = Session::open();
    let id = s.api.create_variable(s.handle, "log").unwrap();

    let txn = s.api.begin_txn(s.handle).unwrap();
    let extra = s.api.create_variable_txn(s.handle, txn, "extra").unwrap();
    s.api.insert_txn(s.handle, id, txn, 0, b"abcdef").unwrap();
    s.api.remove_txn(s.handle, id, txn, 0, 6, 3, false).unwrap();
    s.api.commit(s.handle, txn).unwrap();

    let s = s.reopen();
    assert_eq!(s.api.read(s.handle, id, 0, 4, 1).unwrap(), b"bcef");
    assert_eq!(s.api.get_variable(s.handle, "extra").unwrap(), extra);
    assert_eq!(s.api.variable_length(s.handle, extra).unwrap(), 0);
}

#[test]
fn stale_handles_are_rejected() {
    let s = Session::open();
    let txn = s.api.begin_txn(s.handle).unwrap();
    s.api.rollback(s.handle, txn).unwrap();
    assert_eq!(
        s.api.commit(s.handle, txn).unwrap_err().kind(),
        ErrorKind::NotFound
    );

    s.api.close(s.handle).unwrap();
    assert_eq!(
        s.api.create_variable(s.handle, "v").unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn second_open_of_same_store_is_locked() {
    let s = Session::open();
    let other = Nsfslite::new();
    let err = other.open(&s.db, &s.wal).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Locked);
}
