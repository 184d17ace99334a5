//! Handle-based call surface.
//!
//! [`Nsfslite`] keeps open engines in a generation-checked arena and exposes
//! them through plain `u64` handles, the shape a foreign-language binding
//! needs. Each engine handle carries its own last-error slot: every call on
//! a live handle clears it, and a failed call records its message there.
//!
//! Strides here are single-byte slices `[start:stop:step]`. A write takes
//! its element count from the payload, so it names no `stop`.

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{CoreError, CoreResult, ErrorKind};
use crate::handle::{Handle, HandleArena};
use crate::stride::Stride;
use crate::transaction::TxnHandle;
use crate::types::VariableId;
use parking_lot::Mutex;
use std::sync::Arc;

/// Numeric result code for binding layers.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    /// Operation succeeded.
    Ok = 0,
    /// Variable, engine or transaction not found.
    NotFound = 1,
    /// Variable name already taken.
    AlreadyExists = 2,
    /// Addressed position outside the variable.
    OutOfRange = 3,
    /// Malformed stride.
    InvalidStride = 4,
    /// Payload length differs from the addressed byte count.
    SizeMismatch = 5,
    /// Commit failed; nothing was applied.
    TransactionFailed = 6,
    /// I/O failure.
    IoError = 7,
    /// Invalid argument.
    InvalidArgument = 8,
    /// Corrupt storage file or WAL.
    Corruption = 9,
    /// Engine or transaction closed.
    Closed = 10,
    /// Store locked by another process.
    Locked = 11,
}

impl ResultCode {
    /// Returns the code for an error.
    #[must_use]
    pub fn of(error: &CoreError) -> Self {
        error.kind().into()
    }

    /// Returns true for [`ResultCode::Ok`].
    #[must_use]
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl From<ErrorKind> for ResultCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotFound => Self::NotFound,
            ErrorKind::AlreadyExists => Self::AlreadyExists,
            ErrorKind::OutOfRange => Self::OutOfRange,
            ErrorKind::InvalidStride => Self::InvalidStride,
            ErrorKind::SizeMismatch => Self::SizeMismatch,
            ErrorKind::TransactionFailed => Self::TransactionFailed,
            ErrorKind::Io => Self::IoError,
            ErrorKind::InvalidArgument => Self::InvalidArgument,
            ErrorKind::Corruption => Self::Corruption,
            ErrorKind::Closed => Self::Closed,
            ErrorKind::Locked => Self::Locked,
        }
    }
}

impl<T> From<&CoreResult<T>> for ResultCode {
    fn from(result: &CoreResult<T>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(e) => Self::of(e),
        }
    }
}

struct EngineEntry {
    engine: Engine,
    last_error: Mutex<Option<String>>,
}

/// Registry of open engines addressed by integer handles.
///
/// ```rust
/// use nsfslite_core::api::Nsfslite;
/// # let dir = tempfile::tempdir()?;
/// # let db = dir.path().join("store.nsfs");
/// # let wal = dir.path().join("store.wal");
///
/// let ns = Nsfslite::new();
/// let h = ns.open(&db, &wal)?;
/// let id = ns.create_variable(h, "greeting")?;
/// ns.insert(h, id, 0, b"Hello, World!")?;
/// assert_eq!(ns.read(h, id, 0, 5, 1)?, b"Hello");
/// ns.close(h)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Nsfslite {
    config: Config,
    engines: Mutex<HandleArena<Arc<EngineEntry>>>,
}

impl Nsfslite {
    /// Creates a registry opening engines with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a registry opening engines with `config`.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            engines: Mutex::new(HandleArena::new()),
        }
    }

    /// Opens a store and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty path, or any open error.
    pub fn open(&self, db_path: impl AsRef<std::path::Path>, wal_path: impl AsRef<std::path::Path>) -> CoreResult<u64> {
        let engine = Engine::open(db_path, wal_path, self.config.clone())?;
        Ok(self.register(engine))
    }

    /// Registers an already open engine.
    pub fn register(&self, engine: Engine) -> u64 {
        let entry = Arc::new(EngineEntry {
            engine,
            last_error: Mutex::new(None),
        });
        self.engines.lock().insert(entry).to_raw()
    }

    /// Closes a store. The handle is invalid afterwards.
    ///
    /// # Errors
    ///
    /// Returns `HandleNotFound` for a stale handle, or the close error.
    pub fn close(&self, handle: u64) -> CoreResult<()> {
        let entry = self
            .engines
            .lock()
            .remove(Handle::from_raw(handle))
            .ok_or_else(|| engine_not_found(handle))?;
        entry.engine.close()
    }

    /// Returns the number of open stores.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.engines.lock().len()
    }

    /// Creates a variable.
    ///
    /// # Errors
    ///
    /// See [`Engine::create_variable`].
    pub fn create_variable(&self, handle: u64, name: &str) -> CoreResult<u64> {
        self.call(handle, |e| e.create_variable(name, None).map(VariableId::as_u64))
    }

    /// Creates a variable inside a transaction.
    ///
    /// # Errors
    ///
    /// See [`Engine::create_variable`].
    pub fn create_variable_txn(&self, handle: u64, txn: u64, name: &str) -> CoreResult<u64> {
        self.call(handle, |e| {
            e.create_variable(name, Some(TxnHandle::from_raw(txn)))
                .map(VariableId::as_u64)
        })
    }

    /// Resolves a variable name.
    ///
    /// # Errors
    ///
    /// See [`Engine::get_id`].
    pub fn get_variable(&self, handle: u64, name: &str) -> CoreResult<u64> {
        self.call(handle, |e| e.get_id(name).map(VariableId::as_u64))
    }

    /// Deletes a variable.
    ///
    /// # Errors
    ///
    /// See [`Engine::delete_variable`].
    pub fn delete_variable(&self, handle: u64, name: &str) -> CoreResult<()> {
        self.call(handle, |e| e.delete_variable(name, None))
    }

    /// Deletes a variable inside a transaction.
    ///
    /// # Errors
    ///
    /// See [`Engine::delete_variable`].
    pub fn delete_variable_txn(&self, handle: u64, txn: u64, name: &str) -> CoreResult<()> {
        self.call(handle, |e| e.delete_variable(name, Some(TxnHandle::from_raw(txn))))
    }

    /// Returns a variable's length.
    ///
    /// # Errors
    ///
    /// See [`Engine::length`].
    pub fn variable_length(&self, handle: u64, id: u64) -> CoreResult<u64> {
        self.call(handle, |e| e.length(VariableId::new(id)))
    }

    /// Inserts bytes at `offset`.
    ///
    /// # Errors
    ///
    /// See [`Engine::insert`].
    pub fn insert(&self, handle: u64, id: u64, offset: u64, data: &[u8]) -> CoreResult<()> {
        self.call(handle, |e| e.insert(VariableId::new(id), None, offset, data))
    }

    /// Inserts bytes at `offset` inside a transaction.
    ///
    /// # Errors
    ///
    /// See [`Engine::insert`].
    pub fn insert_txn(&self, handle: u64, id: u64, txn: u64, offset: u64, data: &[u8]) -> CoreResult<()> {
        self.call(handle, |e| {
            e.insert(VariableId::new(id), Some(TxnHandle::from_raw(txn)), offset, data)
        })
    }

    /// Reads `[start:stop:step]`.
    ///
    /// # Errors
    ///
    /// See [`Engine::read`].
    pub fn read(&self, handle: u64, id: u64, start: i64, stop: i64, step: i64) -> CoreResult<Vec<u8>> {
        self.call(handle, |e| {
            e.read(VariableId::new(id), &Stride::from_slice(start, stop, step)?)
        })
    }

    /// Overwrites `data.len()` bytes from `start`, `step` apart.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStride` for a negative `start` or a `step` below 1,
    /// otherwise see [`Engine::write`].
    pub fn write(&self, handle: u64, id: u64, start: i64, step: i64, data: &[u8]) -> CoreResult<()> {
        self.call(handle, |e| {
            e.write(VariableId::new(id), None, &payload_stride(start, step, data)?, data)
        })
    }

    /// Overwrites `data.len()` bytes from `start`, `step` apart, inside a
    /// transaction.
    ///
    /// # Errors
    ///
    /// As [`Self::write`].
    pub fn write_txn(&self, handle: u64, id: u64, txn: u64, start: i64, step: i64, data: &[u8]) -> CoreResult<()> {
        self.call(handle, |e| {
            e.write(
                VariableId::new(id),
                Some(TxnHandle::from_raw(txn)),
                &payload_stride(start, step, data)?,
                data,
            )
        })
    }

    /// Removes `[start:stop:step]`.
    ///
    /// # Errors
    ///
    /// See [`Engine::remove`].
    pub fn remove(
        &self,
        handle: u64,
        id: u64,
        start: i64,
        stop: i64,
        step: i64,
        return_data: bool,
    ) -> CoreResult<Option<Vec<u8>>> {
        self.call(handle, |e| {
            e.remove(
                VariableId::new(id),
                None,
                &Stride::from_slice(start, stop, step)?,
                return_data,
            )
        })
    }

    /// Removes `[start:stop:step]` inside a transaction.
    ///
    /// # Errors
    ///
    /// See [`Engine::remove`].
    #[allow(clippy::too_many_arguments)]
    pub fn remove_txn(
        &self,
        handle: u64,
        id: u64,
        txn: u64,
        start: i64,
        stop: i64,
        step: i64,
        return_data: bool,
    ) -> CoreResult<Option<Vec<u8>>> {
        self.call(handle, |e| {
            e.remove(
                VariableId::new(id),
                Some(TxnHandle::from_raw(txn)),
                &Stride::from_slice(start, stop, step)?,
                return_data,
            )
        })
    }

    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// See [`Engine::begin_txn`].
    pub fn begin_txn(&self, handle: u64) -> CoreResult<u64> {
        self.call(handle, |e| e.begin_txn().map(TxnHandle::to_raw))
    }

    /// Commits a transaction.
    ///
    /// # Errors
    ///
    /// See [`Engine::commit`].
    pub fn commit(&self, handle: u64, txn: u64) -> CoreResult<()> {
        self.call(handle, |e| e.commit(TxnHandle::from_raw(txn)).map(|_| ()))
    }

    /// Discards a transaction.
    ///
    /// # Errors
    ///
    /// See [`Engine::rollback`].
    pub fn rollback(&self, handle: u64, txn: u64) -> CoreResult<()> {
        self.call(handle, |e| e.rollback(TxnHandle::from_raw(txn)))
    }

    /// Returns the message of the last failed call on `handle`.
    #[must_use]
    pub fn last_error(&self, handle: u64) -> Option<String> {
        self.entry(handle).ok()?.last_error.lock().clone()
    }

    /// Clears the last error of `handle`.
    ///
    /// # Errors
    ///
    /// Returns `HandleNotFound` for a stale handle.
    pub fn reset_errors(&self, handle: u64) -> CoreResult<()> {
        *self.entry(handle)?.last_error.lock() = None;
        Ok(())
    }

    fn entry(&self, handle: u64) -> CoreResult<Arc<EngineEntry>> {
        self.engines
            .lock()
            .get(Handle::from_raw(handle))
            .cloned()
            .ok_or_else(|| engine_not_found(handle))
    }

    fn call<T>(&self, handle: u64, f: impl FnOnce(&Engine) -> CoreResult<T>) -> CoreResult<T> {
        let entry = self.entry(handle)?;
        *entry.last_error.lock() = None;
        let result = f(&entry.engine);
        if let Err(e) = &result {
            *entry.last_error.lock() = Some(e.to_string());
        }
        result
    }
}

impl Default for Nsfslite {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Nsfslite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Nsfslite")
            .field("open", &self.open_count())
            .finish_non_exhaustive()
    }
}

/// One-byte elements from `start`, `step` apart, as many as `data` holds.
fn payload_stride(start: i64, step: i64, data: &[u8]) -> CoreResult<Stride> {
    let start = u64::try_from(start)
        .map_err(|_| CoreError::invalid_stride(format!("start must be non-negative, got {start}")))?;
    let step = u64::try_from(step)
        .map_err(|_| CoreError::invalid_stride(format!("step must be positive, got {step}")))?;
    Stride::new(start, step, data.len() as u64)
}

fn engine_not_found(handle: u64) -> CoreError {
    CoreError::HandleNotFound {
        kind: "engine",
        handle,
    }
}
