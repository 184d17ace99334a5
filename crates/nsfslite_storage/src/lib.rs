//! # nsfslite Storage
//!
//! Storage backend trait and implementations for nsfslite.
//!
//! This crate provides the lowest-level storage abstraction used by the
//! engine for both the storage file and the write-ahead log. Backends are
//! **opaque byte stores** - they do not interpret the data they hold.
//!
//! ## Design Principles
//!
//! - Backends are simple byte stores (read, overwrite, append, flush)
//! - No knowledge of headers, extents, catalogs or WAL records
//! - Must be `Send + Sync` for concurrent access
//! - The engine owns all file format interpretation
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral stores
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use nsfslite_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! backend.write_at(offset, b"HELLO").unwrap();
//! let data = backend.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"HELLO world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
