//! Storage file header slots.
//!
//! The first 128 bytes of the storage file hold two 64-byte header slots.
//! Each commit writes a new header into the slot not holding the current
//! one, so a torn header write always leaves the previous header intact.
//! On open, the valid slot with the highest generation wins.
//!
//! ```text
//! | magic "NSFS" (4) | version (2) | reserved (2) | generation (8) |
//! | applied_seq (8) | catalog_offset (8) | catalog_len (8) | crc32 (4) | zero padding |
//! ```

use crate::codec::{compute_crc32, ByteReader};
use crate::error::{CoreError, CoreResult};
use crate::storage::Extent;
use crate::types::SequenceNumber;

/// Magic bytes identifying a header slot.
pub const HEADER_MAGIC: [u8; 4] = *b"NSFS";

/// Current storage format version.
pub const FORMAT_VERSION: u16 = 1;

/// Size of one header slot.
pub const HEADER_SLOT_SIZE: usize = 64;

/// Offset of the first byte after both header slots.
pub const DATA_START: u64 = 2 * HEADER_SLOT_SIZE as u64;

/// Bytes covered by the slot checksum.
const CHECKED_LEN: usize = 40;

/// Contents of one header slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Format version.
    pub version: u16,
    /// Incremented on every header write.
    pub generation: u64,
    /// Highest commit sequence reflected in the file.
    pub applied_seq: SequenceNumber,
    /// Location of the catalog; empty for a fresh file.
    pub catalog: Extent,
}

impl FileHeader {
    /// Header of a freshly created storage file.
    #[must_use]
    pub const fn initial(version: u16) -> Self {
        Self {
            version,
            generation: 0,
            applied_seq: SequenceNumber::new(0),
            catalog: Extent::EMPTY,
        }
    }

    /// Returns the successor header pointing at a new catalog.
    #[must_use]
    pub const fn next(&self, applied_seq: SequenceNumber, catalog: Extent) -> Self {
        Self {
            version: self.version,
            generation: self.generation + 1,
            applied_seq,
            catalog,
        }
    }

    /// Returns the file offset of the slot this header belongs in.
    #[must_use]
    pub const fn slot_offset(&self) -> u64 {
        (self.generation % 2) * HEADER_SLOT_SIZE as u64
    }

    /// Encodes the header into a full slot.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SLOT_SIZE] {
        let mut buf = Vec::with_capacity(HEADER_SLOT_SIZE);
        buf.extend_from_slice(&HEADER_MAGIC);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&self.generation.to_le_bytes());
        buf.extend_from_slice(&self.applied_seq.as_u64().to_le_bytes());
        buf.extend_from_slice(&self.catalog.offset.to_le_bytes());
        buf.extend_from_slice(&self.catalog.len.to_le_bytes());
        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());

        let mut slot = [0u8; HEADER_SLOT_SIZE];
        slot[..buf.len()].copy_from_slice(&buf);
        slot
    }

    /// Decodes one slot.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` for a wrong magic or unsupported version and
    /// `ChecksumMismatch` for a damaged slot.
    pub fn decode(slot: &[u8]) -> CoreResult<Self> {
        if slot.len() < CHECKED_LEN + 4 {
            return Err(CoreError::invalid_format("header slot too short"));
        }
        if slot[0..4] != HEADER_MAGIC {
            return Err(CoreError::invalid_format("bad header magic"));
        }

        let mut r = ByteReader::new(&slot[4..CHECKED_LEN + 4], CoreError::invalid_format);
        let version = r.u16()?;
        let _reserved = r.u16()?;
        let generation = r.u64()?;
        let applied_seq = SequenceNumber::new(r.u64()?);
        let catalog = Extent::new(r.u64()?, r.u64()?);
        let stored_crc = r.u32()?;

        let computed_crc = compute_crc32(&slot[..CHECKED_LEN]);
        if stored_crc != computed_crc {
            return Err(CoreError::ChecksumMismatch {
                expected: stored_crc,
                actual: computed_crc,
            });
        }
        if version == 0 || version > FORMAT_VERSION {
            return Err(CoreError::invalid_format(format!(
                "unsupported storage format version {version}"
            )));
        }

        Ok(Self {
            version,
            generation,
            applied_seq,
            catalog,
        })
    }

    /// Picks the current header from the two slots.
    ///
    /// # Errors
    ///
    /// Returns the first slot's error if neither slot is valid.
    pub fn select(slot_a: &[u8], slot_b: &[u8]) -> CoreResult<Self> {
        match (Self::decode(slot_a), Self::decode(slot_b)) {
            (Ok(a), Ok(b)) => Ok(if b.generation > a.generation { b } else { a }),
            (Ok(a), Err(e)) | (Err(e), Ok(a)) => {
                tracing::debug!(error = %e, generation = a.generation, "ignoring invalid header slot");
                Ok(a)
            }
            (Err(e), Err(_)) => Err(e),
        }
    }
}
