//! Engine configuration.

/// Configuration for opening an engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the storage file and WAL if they don't exist.
    pub create_if_missing: bool,

    /// Whether to fsync the WAL and storage file on every commit.
    pub sync_on_commit: bool,

    /// Whether a corrupt WAL record fails `open` (true) or ends replay
    /// with a warning (false).
    pub strict_recovery: bool,

    /// Whether to take an exclusive `<db_path>.lock` file on open.
    pub lock_file: bool,

    /// Largest WAL record payload accepted by a commit.
    pub max_wal_record_size: usize,

    /// Format version to use for new storage files.
    pub format_version: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_commit: true,
            strict_recovery: true,
            lock_file: true,
            max_wal_record_size: u32::MAX as usize,
            format_version: 1,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create missing files.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets whether WAL corruption is fatal during recovery.
    #[must_use]
    pub const fn strict_recovery(mut self, value: bool) -> Self {
        self.strict_recovery = value;
        self
    }

    /// Sets whether to take the lock file.
    #[must_use]
    pub const fn lock_file(mut self, value: bool) -> Self {
        self.lock_file = value;
        self
    }

    /// Sets the largest accepted WAL record payload.
    #[must_use]
    pub const fn max_wal_record_size(mut self, size: usize) -> Self {
        self.max_wal_record_size = size;
        self
    }
}
