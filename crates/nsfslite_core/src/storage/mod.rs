//! On-disk layout of the storage file.
//!
//! ```text
//! | header slot A (64) | header slot B (64) | extents, catalogs and free space ... |
//! ```

mod catalog;
mod extent;
mod file;
mod header;

pub use catalog::{Catalog, CATALOG_MAGIC};
pub use extent::{Extent, FreeList};
pub use file::{Snapshot, StorageFile};
pub use header::{FileHeader, DATA_START, FORMAT_VERSION, HEADER_MAGIC, HEADER_SLOT_SIZE};
