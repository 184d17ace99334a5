//! CLI command implementations.

pub mod dump_wal;
pub mod inspect;
pub mod read;
pub mod recover;

use nsfslite_core::Config;
use std::path::Path;

/// Configuration for tools that open an existing store.
pub fn existing_store_config() -> Config {
    Config::default().create_if_missing(false)
}

/// Fails unless `path` exists.
pub fn require_file(path: &Path, what: &str) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        Ok(())
    } else {
        Err(format!("{what} not found at {}", path.display()).into())
    }
}

/// Hex-encodes bytes.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
