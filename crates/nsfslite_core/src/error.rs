//! Error types for the nsfslite engine.

use crate::types::{TransactionId, VariableId};
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Coarse classification of a [`CoreError`].
///
/// Bindings map these onto their own exception types; tests use them to
/// assert on failure categories without matching every field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A name, ID or handle does not exist.
    NotFound,
    /// A variable with the requested name already exists.
    AlreadyExists,
    /// A stride or offset addresses bytes outside the variable.
    OutOfRange,
    /// A stride is malformed (zero step, negative start, overflow).
    InvalidStride,
    /// A write payload does not match the addressed element count.
    SizeMismatch,
    /// A commit was rejected; nothing was applied.
    TransactionFailed,
    /// The underlying storage or WAL failed.
    Io,
    /// An argument was rejected before reaching the engine.
    InvalidArgument,
    /// On-disk data failed validation.
    Corruption,
    /// The engine or transaction is no longer usable.
    Closed,
    /// Another process holds the store.
    Locked,
}

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] nsfslite_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No variable has this name.
    #[error("variable not found: {name:?}")]
    VariableNotFound {
        /// The name that was looked up.
        name: String,
    },

    /// No live variable has this ID.
    #[error("variable not found: {id}")]
    VariableIdNotFound {
        /// The ID that was looked up.
        id: VariableId,
    },

    /// An engine or transaction handle is unknown or stale.
    #[error("{kind} handle not found: {handle:#x}")]
    HandleNotFound {
        /// What the handle was expected to refer to.
        kind: &'static str,
        /// The raw handle value.
        handle: u64,
    },

    /// A variable with this name already exists.
    #[error("variable already exists: {name:?}")]
    AlreadyExists {
        /// The duplicate name.
        name: String,
    },

    /// A position lies outside the variable.
    #[error("position {position} out of range for variable of length {length}")]
    OutOfRange {
        /// The offending byte position.
        position: u64,
        /// The variable length at the time of the check.
        length: u64,
    },

    /// The stride descriptor is malformed.
    #[error("invalid stride: {message}")]
    InvalidStride {
        /// Description of the problem.
        message: String,
    },

    /// Write payload length does not match the stride.
    #[error("size mismatch: stride addresses {expected} bytes, payload has {actual}")]
    SizeMismatch {
        /// Number of positions the stride addresses.
        expected: u64,
        /// Length of the supplied payload.
        actual: u64,
    },

    /// Commit failed; no operation of the transaction was applied.
    #[error("transaction {txid} failed: {source}")]
    TransactionFailed {
        /// The transaction that failed.
        txid: TransactionId,
        /// The first error encountered.
        source: Box<CoreError>,
    },

    /// Argument rejected.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// WAL is corrupted or invalid.
    #[error("WAL corruption: {message}")]
    WalCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch detected.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },

    /// Invalid storage file format or version.
    #[error("invalid storage format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// Store is already open in another process.
    #[error("store locked: another process has exclusive access")]
    DatabaseLocked,

    /// Engine is closed.
    #[error("engine is closed")]
    DatabaseClosed,
}

impl CoreError {
    /// Classifies this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage(_) | Self::Io(_) => ErrorKind::Io,
            Self::VariableNotFound { .. }
            | Self::VariableIdNotFound { .. }
            | Self::HandleNotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
            Self::InvalidStride { .. } => ErrorKind::InvalidStride,
            Self::SizeMismatch { .. } => ErrorKind::SizeMismatch,
            Self::TransactionFailed { .. } => ErrorKind::TransactionFailed,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::WalCorruption { .. }
            | Self::ChecksumMismatch { .. }
            | Self::InvalidFormat { .. } => ErrorKind::Corruption,
            Self::InvalidOperation { .. } | Self::DatabaseClosed => ErrorKind::Closed,
            Self::DatabaseLocked => ErrorKind::Locked,
        }
    }

    /// Creates a variable-not-found error for a name.
    pub fn variable_not_found(name: impl Into<String>) -> Self {
        Self::VariableNotFound { name: name.into() }
    }

    /// Creates an already-exists error.
    pub fn already_exists(name: impl Into<String>) -> Self {
        Self::AlreadyExists { name: name.into() }
    }

    /// Creates an invalid stride error.
    pub fn invalid_stride(message: impl Into<String>) -> Self {
        Self::InvalidStride {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a WAL corruption error.
    pub fn wal_corruption(message: impl Into<String>) -> Self {
        Self::WalCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Wraps `self` as the cause of a failed commit.
    ///
    /// An error that already is a `TransactionFailed` is returned unchanged.
    #[must_use]
    pub fn into_transaction_failed(self, txid: TransactionId) -> Self {
        match self {
            failed @ Self::TransactionFailed { .. } => failed,
            other => Self::TransactionFailed {
                txid,
                source: Box::new(other),
            },
        }
    }
}
