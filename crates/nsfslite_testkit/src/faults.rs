//! Fault injection for crash and rollback tests.
//!
//! [`SharedBackend`] is an in-memory backend whose bytes outlive the engine
//! that wrote them. Clones share the same bytes and the same
//! [`FaultControl`], so a test keeps one clone, hands the other to an
//! engine, arms a fault and then inspects or reopens what reached "disk".
//!
//! ## Fault modes
//!
//! - **Transient**: one write (or sync) fails, later calls succeed. The
//!   engine's rollback runs against a healthy backend.
//! - **Crash**: the failing write is cut short and every later mutation
//!   fails too, as if the process died at that byte. Reopen a
//!   [`SharedBackend::restart`] copy to see what recovery makes of it.

use nsfslite_storage::{InMemoryBackend, StorageBackend, StorageError, StorageResult};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Armed faults for a [`SharedBackend`].
#[derive(Debug)]
pub struct FaultControl {
    fail_after: AtomicU64,
    written: AtomicU64,
    fail_sync: AtomicBool,
    crash: AtomicBool,
    tripped: AtomicBool,
}

impl Default for FaultControl {
    fn default() -> Self {
        Self {
            fail_after: AtomicU64::new(u64::MAX),
            written: AtomicU64::new(0),
            fail_sync: AtomicBool::new(false),
            crash: AtomicBool::new(false),
            tripped: AtomicBool::new(false),
        }
    }
}

impl FaultControl {
    /// Fails the write that would take the byte count past `bytes`.
    ///
    /// The count restarts at zero when armed. Only that one write fails.
    pub fn fail_after_bytes(&self, bytes: u64) {
        self.written.store(0, Ordering::SeqCst);
        self.crash.store(false, Ordering::SeqCst);
        self.fail_after.store(bytes, Ordering::SeqCst);
    }

    /// Stops the backend dead once `bytes` more bytes have been written.
    ///
    /// The crossing write is persisted up to the limit, then every later
    /// mutation fails.
    pub fn crash_after_bytes(&self, bytes: u64) {
        self.written.store(0, Ordering::SeqCst);
        self.crash.store(true, Ordering::SeqCst);
        self.fail_after.store(bytes, Ordering::SeqCst);
    }

    /// Fails the next `sync` call.
    pub fn fail_next_sync(&self) {
        self.fail_sync.store(true, Ordering::SeqCst);
    }

    /// Disarms every fault.
    pub fn reset(&self) {
        self.fail_after.store(u64::MAX, Ordering::SeqCst);
        self.written.store(0, Ordering::SeqCst);
        self.fail_sync.store(false, Ordering::SeqCst);
        self.crash.store(false, Ordering::SeqCst);
        self.tripped.store(false, Ordering::SeqCst);
    }

    /// Returns whether a fault has fired since the last reset.
    pub fn has_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    /// Returns the bytes written since the fault was armed.
    pub fn bytes_written(&self) -> u64 {
        self.written.load(Ordering::SeqCst)
    }

    fn is_dead(&self) -> bool {
        self.crash.load(Ordering::SeqCst) && self.tripped.load(Ordering::SeqCst)
    }

    /// Admits a write of `len` bytes, returning how many may land.
    fn admit(&self, len: usize) -> StorageResult<Admit> {
        if self.is_dead() {
            return Err(injected("write after simulated crash"));
        }

        let len = len as u64;
        let before = self.written.fetch_add(len, Ordering::SeqCst);
        let limit = self.fail_after.load(Ordering::SeqCst);
        if before.saturating_add(len) <= limit {
            return Ok(Admit::All);
        }

        self.tripped.store(true, Ordering::SeqCst);
        if !self.crash.load(Ordering::SeqCst) {
            self.fail_after.store(u64::MAX, Ordering::SeqCst);
        }
        Ok(Admit::Partial(limit.saturating_sub(before) as usize))
    }

    fn check_sync(&self) -> StorageResult<()> {
        if self.is_dead() {
            return Err(injected("sync after simulated crash"));
        }
        if self.fail_sync.swap(false, Ordering::SeqCst) {
            self.tripped.store(true, Ordering::SeqCst);
            return Err(injected("simulated sync failure"));
        }
        Ok(())
    }

    fn check_alive(&self) -> StorageResult<()> {
        if self.is_dead() {
            return Err(injected("mutation after simulated crash"));
        }
        Ok(())
    }
}

enum Admit {
    All,
    Partial(usize),
}

fn injected(message: &str) -> StorageError {
    StorageError::Io(io::Error::other(message.to_string()))
}

/// In-memory backend with shared bytes and injectable faults.
#[derive(Clone, Default)]
pub struct SharedBackend {
    inner: InMemoryBackend,
    faults: Arc<FaultControl>,
}

impl SharedBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend holding `data`.
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            inner: InMemoryBackend::with_data(data),
            faults: Arc::new(FaultControl::default()),
        }
    }

    /// Creates a storage-file and WAL pair counting against one
    /// [`FaultControl`], so a crash stops both at the same instant.
    pub fn pair() -> (Self, Self) {
        Self::pair_with_data(Vec::new(), Vec::new())
    }

    /// Like [`Self::pair`], over existing bytes.
    pub fn pair_with_data(data: Vec<u8>, wal: Vec<u8>) -> (Self, Self) {
        let faults = Arc::new(FaultControl::default());
        (
            Self {
                inner: InMemoryBackend::with_data(data),
                faults: Arc::clone(&faults),
            },
            Self {
                inner: InMemoryBackend::with_data(wal),
                faults,
            },
        )
    }

    /// Returns the fault switches shared by all clones.
    pub fn faults(&self) -> Arc<FaultControl> {
        Arc::clone(&self.faults)
    }

    /// Returns a copy of the current bytes.
    pub fn image(&self) -> Vec<u8> {
        self.inner.data()
    }

    /// Returns an independent, fault-free backend over the current bytes.
    pub fn restart(&self) -> Self {
        Self::with_data(self.image())
    }

    /// Boxes a clone for handing to an engine.
    pub fn boxed(&self) -> Box<dyn StorageBackend> {
        Box::new(self.clone())
    }
}

impl StorageBackend for SharedBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        match self.faults.admit(data.len())? {
            Admit::All => self.inner.write_at(offset, data),
            Admit::Partial(n) => {
                if n > 0 {
                    let _ = self.inner.write_at(offset, &data[..n]);
                }
                Err(injected("simulated failure during write"))
            }
        }
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        match self.faults.admit(data.len())? {
            Admit::All => self.inner.append(data),
            Admit::Partial(n) => {
                if n > 0 {
                    let _ = self.inner.append(&data[..n]);
                }
                Err(injected("simulated failure during append"))
            }
        }
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.faults.check_alive()?;
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.faults.check_sync()?;
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.faults.check_alive()?;
        self.inner.truncate(new_size)
    }
}

impl std::fmt::Debug for SharedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBackend")
            .field("len", &self.inner.data().len())
            .field("faults", &self.faults)
            .finish()
    }
}
