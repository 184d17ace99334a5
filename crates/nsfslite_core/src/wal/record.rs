//! WAL record types and serialization.

use crate::codec::{put_blob, put_name, ByteReader};
use crate::error::{CoreError, CoreResult};
use crate::types::{SequenceNumber, TransactionId, VariableId};

/// Magic bytes identifying a WAL record.
pub const WAL_MAGIC: [u8; 4] = *b"NWAL";

/// Current WAL format version.
pub const WAL_VERSION: u16 = 1;

/// Type of WAL record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WalRecordType {
    /// Begin a new transaction.
    Begin = 1,
    /// Create a variable.
    Create = 2,
    /// Delete a variable.
    Delete = 3,
    /// Splice bytes into a variable.
    Insert = 4,
    /// Overwrite strided positions.
    Write = 5,
    /// Remove strided positions.
    Remove = 6,
    /// Commit a transaction.
    Commit = 7,
}

impl WalRecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Begin),
            2 => Some(Self::Create),
            3 => Some(Self::Delete),
            4 => Some(Self::Insert),
            5 => Some(Self::Write),
            6 => Some(Self::Remove),
            7 => Some(Self::Commit),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Returns the lowercase name used by tooling output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Insert => "insert",
            Self::Write => "write",
            Self::Remove => "remove",
            Self::Commit => "commit",
        }
    }
}

/// A WAL record representing one step of a transaction.
///
/// Strides are logged as their raw `(start, step, nelems, elem_size)`
/// fields and are revalidated when the record is replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    /// Begin a new transaction.
    Begin {
        /// Transaction ID.
        txid: TransactionId,
    },

    /// Create a variable under a pre-assigned ID.
    Create {
        /// Transaction ID.
        txid: TransactionId,
        /// ID reserved for the variable.
        var_id: VariableId,
        /// Variable name.
        name: String,
    },

    /// Delete a variable by name.
    Delete {
        /// Transaction ID.
        txid: TransactionId,
        /// Variable name.
        name: String,
    },

    /// Splice bytes into a variable.
    Insert {
        /// Transaction ID.
        txid: TransactionId,
        /// Target variable.
        var_id: VariableId,
        /// Byte offset of the splice.
        offset: u64,
        /// Bytes to insert.
        data: Vec<u8>,
    },

    /// Overwrite strided elements.
    Write {
        /// Transaction ID.
        txid: TransactionId,
        /// Target variable.
        var_id: VariableId,
        /// Byte offset of the first element.
        start: u64,
        /// Distance between elements, in elements.
        step: u64,
        /// Number of elements.
        nelems: u64,
        /// Bytes per element.
        elem_size: u64,
        /// Replacement bytes, `nelems * elem_size` of them.
        data: Vec<u8>,
    },

    /// Remove strided elements.
    Remove {
        /// Transaction ID.
        txid: TransactionId,
        /// Target variable.
        var_id: VariableId,
        /// Byte offset of the first element.
        start: u64,
        /// Distance between elements, in elements.
        step: u64,
        /// Number of elements.
        nelems: u64,
        /// Bytes per element.
        elem_size: u64,
    },

    /// Commit a transaction.
    Commit {
        /// Transaction ID.
        txid: TransactionId,
        /// Sequence number assigned to this commit.
        sequence: SequenceNumber,
    },
}

impl WalRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> WalRecordType {
        match self {
            Self::Begin { .. } => WalRecordType::Begin,
            Self::Create { .. } => WalRecordType::Create,
            Self::Delete { .. } => WalRecordType::Delete,
            Self::Insert { .. } => WalRecordType::Insert,
            Self::Write { .. } => WalRecordType::Write,
            Self::Remove { .. } => WalRecordType::Remove,
            Self::Commit { .. } => WalRecordType::Commit,
        }
    }

    /// Returns the transaction the record belongs to.
    #[must_use]
    pub fn txid(&self) -> TransactionId {
        match self {
            Self::Begin { txid }
            | Self::Create { txid, .. }
            | Self::Delete { txid, .. }
            | Self::Insert { txid, .. }
            | Self::Write { txid, .. }
            | Self::Remove { txid, .. }
            | Self::Commit { txid, .. } => *txid,
        }
    }

    /// Maximum size for a data payload in a WAL record.
    ///
    /// The WAL format uses a 4-byte length field.
    pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

    /// Serializes the record payload (without envelope).
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a data payload exceeds
    /// [`Self::MAX_PAYLOAD_SIZE`].
    pub fn encode_payload(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.txid().as_u64().to_le_bytes());

        match self {
            Self::Begin { .. } => {}

            Self::Create { var_id, name, .. } => {
                buf.extend_from_slice(&var_id.as_u64().to_le_bytes());
                put_name(&mut buf, name);
            }

            Self::Delete { name, .. } => {
                put_name(&mut buf, name);
            }

            Self::Insert {
                var_id,
                offset,
                data,
                ..
            } => {
                buf.extend_from_slice(&var_id.as_u64().to_le_bytes());
                buf.extend_from_slice(&offset.to_le_bytes());
                put_blob(&mut buf, data)?;
            }

            Self::Write {
                var_id,
                start,
                step,
                nelems,
                elem_size,
                data,
                ..
            } => {
                buf.extend_from_slice(&var_id.as_u64().to_le_bytes());
                buf.extend_from_slice(&start.to_le_bytes());
                buf.extend_from_slice(&step.to_le_bytes());
                buf.extend_from_slice(&nelems.to_le_bytes());
                buf.extend_from_slice(&elem_size.to_le_bytes());
                put_blob(&mut buf, data)?;
            }

            Self::Remove {
                var_id,
                start,
                step,
                nelems,
                elem_size,
                ..
            } => {
                buf.extend_from_slice(&var_id.as_u64().to_le_bytes());
                buf.extend_from_slice(&start.to_le_bytes());
                buf.extend_from_slice(&step.to_le_bytes());
                buf.extend_from_slice(&nelems.to_le_bytes());
                buf.extend_from_slice(&elem_size.to_le_bytes());
            }

            Self::Commit { sequence, .. } => {
                buf.extend_from_slice(&sequence.as_u64().to_le_bytes());
            }
        }

        Ok(buf)
    }

    /// Deserializes a record from its type and payload.
    ///
    /// # Errors
    ///
    /// Returns `WalCorruption` for short payloads, invalid names or
    /// trailing bytes.
    pub fn decode_payload(record_type: WalRecordType, payload: &[u8]) -> CoreResult<Self> {
        let mut r = ByteReader::new(payload, CoreError::wal_corruption);
        let txid = TransactionId::new(r.u64()?);

        let record = match record_type {
            WalRecordType::Begin => Self::Begin { txid },

            WalRecordType::Create => Self::Create {
                txid,
                var_id: VariableId::new(r.u64()?),
                name: r.name()?,
            },

            WalRecordType::Delete => Self::Delete {
                txid,
                name: r.name()?,
            },

            WalRecordType::Insert => Self::Insert {
                txid,
                var_id: VariableId::new(r.u64()?),
                offset: r.u64()?,
                data: r.blob()?.to_vec(),
            },

            WalRecordType::Write => Self::Write {
                txid,
                var_id: VariableId::new(r.u64()?),
                start: r.u64()?,
                step: r.u64()?,
                nelems: r.u64()?,
                elem_size: r.u64()?,
                data: r.blob()?.to_vec(),
            },

            WalRecordType::Remove => Self::Remove {
                txid,
                var_id: VariableId::new(r.u64()?),
                start: r.u64()?,
                step: r.u64()?,
                nelems: r.u64()?,
                elem_size: r.u64()?,
            },

            WalRecordType::Commit => Self::Commit {
                txid,
                sequence: SequenceNumber::new(r.u64()?),
            },
        };

        r.finish(&format!("{} record", record_type.name()))?;
        Ok(record)
    }
}
