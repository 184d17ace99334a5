//! Concurrent callers sharing one engine.

use nsfslite_core::{Engine, Stride};
use std::sync::Arc;
use std::thread;

const THREADS: usize = 4;
const ROUNDS: usize = 50;

#[test]
fn writers_on_separate_variables() {
    let engine = Arc::new(Engine::open_in_memory().unwrap());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let id = engine.create_variable(&format!("v{t}"), None).unwrap();
                for round in 0..ROUNDS {
                    let len = engine.length(id).unwrap();
                    engine.insert(id, None, len, &[t as u8, round as u8]).unwrap();
                }
                id
            })
        })
        .collect();

    for (t, handle) in handles.into_iter().enumerate() {
        let id = handle.join().unwrap();
        let bytes = engine.read_all(id).unwrap();
        assert_eq!(bytes.len(), 2 * ROUNDS);
        let evens = engine
            .read(id, &Stride::from_slice(0, bytes.len() as i64, 2).unwrap())
            .unwrap();
        assert!(evens.iter().all(|&b| b == t as u8));
    }
}

#[test]
fn appenders_on_one_variable_lose_nothing() {
    let engine = Arc::new(Engine::open_in_memory().unwrap());
    let id = engine.create_variable("shared", None).unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    // inserting at the front is valid whatever others did
                    engine.insert(id, None, 0, &[t as u8]).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let bytes = engine.read_all(id).unwrap();
    assert_eq!(bytes.len(), THREADS * ROUNDS);
    for t in 0..THREADS {
        assert_eq!(bytes.iter().filter(|&&b| b == t as u8).count(), ROUNDS);
    }
}

#[test]
fn transactions_commit_whole_or_not_at_all() {
    let engine = Arc::new(Engine::open_in_memory().unwrap());
    let a = engine.create_variable("a", None).unwrap();
    let b = engine.create_variable("b", None).unwrap();

    let writers: Vec<_> = (0..THREADS)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    engine
                        .transaction(|txn| {
                            engine.insert(a, Some(txn), 0, b"x")?;
                            engine.insert(b, Some(txn), 0, b"y")?;
                            Ok(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    // readers never see one half of a transaction without the other
    let reader = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for _ in 0..ROUNDS * 4 {
                let snapshot = engine.snapshot();
                let la = snapshot.directory.length(a).unwrap();
                let lb = snapshot.directory.length(b).unwrap();
                assert_eq!(la, lb);
            }
        })
    };

    for handle in writers {
        handle.join().unwrap();
    }
    reader.join().unwrap();

    let total = (THREADS * ROUNDS) as u64;
    assert_eq!(engine.length(a).unwrap(), total);
    assert_eq!(engine.length(b).unwrap(), total);
}

#[test]
fn abandoned_transaction_blocks_nobody() {
    let engine = Arc::new(Engine::open_in_memory().unwrap());
    let id = engine.create_variable("v", None).unwrap();
    let txn = engine.begin_txn().unwrap();
    engine.insert(id, Some(txn), 0, b"pending").unwrap();

    let other = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || engine.insert(id, None, 0, b"direct"))
    };
    other.join().unwrap().unwrap();

    assert_eq!(engine.read_all(id).unwrap(), b"direct");
    assert_eq!(engine.open_transactions(), 1);
    engine.commit(txn).unwrap();
    assert_eq!(engine.read_all(id).unwrap(), b"pendingdirect");
}
