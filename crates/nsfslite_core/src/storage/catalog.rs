//! Catalog encoding.
//!
//! The catalog is the persisted form of the variable directory and the
//! free list. A new catalog is appended on every commit and published by
//! the header.
//!
//! ```text
//! | magic "NSCT" (4) | next_id (8) | var_count (4) |
//! |   { id (8) | name_len (2) | name | offset (8) | len (8) } * var_count |
//! | free_count (4) | { offset (8) | len (8) } * free_count | crc32 (4) |
//! ```

use crate::codec::{compute_crc32, put_name, ByteReader};
use crate::directory::{VariableDirectory, VariableEntry};
use crate::error::{CoreError, CoreResult};
use crate::storage::{Extent, FreeList};
use crate::types::VariableId;

/// Magic bytes identifying a catalog.
pub const CATALOG_MAGIC: [u8; 4] = *b"NSCT";

/// Decoded catalog contents.
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Live variables.
    pub directory: VariableDirectory,
    /// Free extents.
    pub free: FreeList,
}

impl Catalog {
    /// Catalog of a fresh storage file.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            directory: VariableDirectory::new(),
            free: FreeList::new(),
        }
    }

    /// Encodes a directory and free list.
    ///
    /// `next_id` may be ahead of the directory's own counter when IDs were
    /// reserved by transactions that have not committed.
    #[must_use]
    pub fn encode(directory: &VariableDirectory, free: &FreeList, next_id: VariableId) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&CATALOG_MAGIC);
        buf.extend_from_slice(&next_id.max(directory.next_id()).as_u64().to_le_bytes());

        buf.extend_from_slice(&(directory.len() as u32).to_le_bytes());
        for entry in directory.list() {
            buf.extend_from_slice(&entry.id.as_u64().to_le_bytes());
            put_name(&mut buf, &entry.name);
            buf.extend_from_slice(&entry.extent.offset.to_le_bytes());
            buf.extend_from_slice(&entry.extent.len.to_le_bytes());
        }

        buf.extend_from_slice(&(free.len() as u32).to_le_bytes());
        for extent in free.iter() {
            buf.extend_from_slice(&extent.offset.to_le_bytes());
            buf.extend_from_slice(&extent.len.to_le_bytes());
        }

        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decodes a catalog blob.
    ///
    /// # Errors
    ///
    /// Returns `ChecksumMismatch` or `InvalidFormat` if the blob is damaged.
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() < CATALOG_MAGIC.len() + 4 {
            return Err(CoreError::invalid_format("catalog too short"));
        }
        let (body, crc_bytes) = bytes.split_at(bytes.len() - 4);
        let stored_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let computed_crc = compute_crc32(body);
        if stored_crc != computed_crc {
            return Err(CoreError::ChecksumMismatch {
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        let mut r = ByteReader::new(body, CoreError::invalid_format);
        if r.bytes(4)? != CATALOG_MAGIC {
            return Err(CoreError::invalid_format("bad catalog magic"));
        }
        let next_id = VariableId::new(r.u64()?);

        let var_count = r.u32()?;
        let mut entries = Vec::new();
        for _ in 0..var_count {
            let id = VariableId::new(r.u64()?);
            let name = r.name()?;
            let extent = Extent::new(r.u64()?, r.u64()?);
            entries.push(VariableEntry { id, name, extent });
        }

        let free_count = r.u32()?;
        let mut free = FreeList::new();
        for _ in 0..free_count {
            free.release(Extent::new(r.u64()?, r.u64()?));
        }
        r.finish("catalog")?;

        Ok(Self {
            directory: VariableDirectory::from_parts(entries, next_id)?,
            free,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_preserves_state() {
        let mut dir = VariableDirectory::new();
        dir.create("alpha", VariableId::new(1)).unwrap();
        dir.create("beta", VariableId::new(2)).unwrap();
        dir.set_extent(VariableId::new(2), Extent::new(128, 7)).unwrap();
        dir.delete("alpha").unwrap();

        let mut free = FreeList::new();
        free.release(Extent::new(135, 9));

        let bytes = Catalog::encode(&dir, &free, VariableId::new(5));
        let catalog = Catalog::decode(&bytes).unwrap();

        let entries: Vec<_> = catalog.directory.list().cloned().collect();
        assert_eq!(entries, dir.list().cloned().collect::<Vec<_>>());
        assert_eq!(catalog.directory.next_id(), VariableId::new(5));
        assert_eq!(catalog.free, free);
    }

    #[test]
    fn damaged_catalog_rejected() {
        let bytes = Catalog::encode(&VariableDirectory::new(), &FreeList::new(), VariableId::FIRST);
        let mut damaged = bytes.clone();
        damaged[5] ^= 1;
        assert!(matches!(
            Catalog::decode(&damaged),
            Err(CoreError::ChecksumMismatch { .. })
        ));
        assert!(Catalog::decode(&bytes[..3]).is_err());
    }
}
