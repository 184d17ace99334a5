//! # nsfslite Core
//!
//! Transactional, file-backed store of named byte variables.
//!
//! This crate provides:
//! - Strided insert/read/write/remove over elements of any byte width
//! - A variable directory with stable, never-reused IDs
//! - A write-ahead log replayed on open after an unclean shutdown
//! - Atomic multi-operation transactions validated before anything is written
//! - A handle-based call surface for binding layers ([`api::Nsfslite`])
//!
//! ## Example
//!
//! ```rust
//! use nsfslite_core::{Engine, Stride};
//!
//! let engine = Engine::open_in_memory()?;
//! let id = engine.create_variable("samples", None)?;
//! engine.insert(id, None, 0, &[0, 1, 2, 3, 4, 5, 6, 7])?;
//!
//! // every other byte
//! let evens = engine.read(id, &Stride::from_slice(0, 8, 2)?)?;
//! assert_eq!(evens, vec![0, 2, 4, 6]);
//!
//! // every other 2-byte element
//! let pairs = engine.read(id, &Stride::with_elem_size(0, 2, 2, 2)?)?;
//! assert_eq!(pairs, vec![0, 1, 4, 5]);
//! # Ok::<(), nsfslite_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
mod codec;
mod config;
mod directory;
mod engine;
mod error;
mod handle;
mod lock;
pub mod storage;
mod store;
mod stride;
pub mod transaction;
mod types;
pub mod variable;
pub mod wal;

pub use codec::compute_crc32;
pub use config::Config;
pub use directory::{VariableDirectory, VariableEntry, MAX_NAME_LEN};
pub use engine::Engine;
pub use error::{CoreError, CoreResult, ErrorKind};
pub use handle::{Handle, HandleArena};
pub use lock::StoreLock;
pub use store::{CommitOutcome, RecoveryReport, VariableStore};
pub use stride::Stride;
pub use transaction::TxnHandle;
pub use types::{SequenceNumber, TransactionId, VariableId};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
