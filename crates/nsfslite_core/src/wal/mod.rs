//! Write-Ahead Log (WAL) for durability and crash recovery.
//!
//! Every commit writes `Begin`, its operation records and a `Commit`
//! marker to the WAL and syncs before the storage file is touched. Once the
//! storage file header records the commit's sequence number, the WAL is
//! truncated.
//!
//! ## WAL Record Format
//!
//! ```text
//! | magic "NWAL" (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! All integers are little-endian; the CRC covers header and payload.
//!
//! ## Recovery Policy
//!
//! Tolerated (clean end of log):
//!
//! - **Truncated header**: fewer than 11 bytes left
//! - **Truncated payload**: record length exceeds the bytes left
//!
//! Both are what a crash mid-append leaves behind. A transaction whose
//! `Commit` record did not make it is discarded.
//!
//! Fatal unless recovery is lenient:
//!
//! - **CRC mismatch**
//! - **Invalid magic bytes**
//! - **Unknown record type**
//! - **Unsupported version**

mod iterator;
mod record;
mod writer;

pub use iterator::{CommittedTransaction, RecoveryScan, WalRecordIterator};
pub use record::{WalRecord, WalRecordType, WAL_MAGIC, WAL_VERSION};
pub use writer::{encode_record, WalManager};
