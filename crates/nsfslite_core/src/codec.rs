//! Little-endian encoding helpers shared by the WAL, header and catalog.

use crate::error::{CoreError, CoreResult};

/// Computes CRC32 checksum for data.
pub fn compute_crc32(data: &[u8]) -> u32 {
    // IEEE polynomial, reflected
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

/// Cursor over an encoded buffer.
///
/// Every read is bounds-checked; running off the end produces the error
/// built by `corrupt`, so WAL payloads fail with `WalCorruption` and
/// catalog blobs with `InvalidFormat`.
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
    corrupt: fn(String) -> CoreError,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(buf: &'a [u8], corrupt: fn(String) -> CoreError) -> Self {
        Self {
            buf,
            pos: 0,
            corrupt,
        }
    }

    pub(crate) fn bytes(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| {
                (self.corrupt)(format!(
                    "unexpected end of data: need {len} bytes at offset {}, have {}",
                    self.pos,
                    self.buf.len() - self.pos
                ))
            })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> CoreResult<[u8; N]> {
        let slice = self.bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub(crate) fn u16(&mut self) -> CoreResult<u16> {
        self.array().map(u16::from_le_bytes)
    }

    pub(crate) fn u32(&mut self) -> CoreResult<u32> {
        self.array().map(u32::from_le_bytes)
    }

    pub(crate) fn u64(&mut self) -> CoreResult<u64> {
        self.array().map(u64::from_le_bytes)
    }

    /// Reads a `u32` length prefix followed by that many bytes.
    pub(crate) fn blob(&mut self) -> CoreResult<&'a [u8]> {
        let len = self.u32()? as usize;
        self.bytes(len)
    }

    /// Reads a `u16` length prefix followed by UTF-8 bytes.
    pub(crate) fn name(&mut self) -> CoreResult<String> {
        let len = usize::from(self.u16()?);
        let raw = self.bytes(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| (self.corrupt)("variable name is not valid UTF-8".into()))
    }

    /// Fails if any bytes remain unread.
    pub(crate) fn finish(&self, what: &str) -> CoreResult<()> {
        if self.pos != self.buf.len() {
            return Err((self.corrupt)(format!(
                "trailing bytes in {what}: expected {} bytes, got {}",
                self.pos,
                self.buf.len()
            )));
        }
        Ok(())
    }
}

/// Appends a `u16` length prefix and the name's bytes.
///
/// Callers validate the name length beforehand.
pub(crate) fn put_name(buf: &mut Vec<u8>, name: &str) {
    buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
    buf.extend_from_slice(name.as_bytes());
}

/// Appends a `u32` length prefix and the data.
///
/// # Errors
///
/// Returns `InvalidArgument` if the data does not fit a 4-byte length.
pub(crate) fn put_blob(buf: &mut Vec<u8>, data: &[u8]) -> CoreResult<()> {
    let len = u32::try_from(data.len()).map_err(|_| {
        CoreError::invalid_argument(format!(
            "payload too large: {} bytes exceeds maximum of {} bytes",
            data.len(),
            u32::MAX
        ))
    })?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(data);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn crc32_known_value() {
        // "123456789" is the standard check input
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn crc32_empty() {
        assert_eq!(compute_crc32(b""), 0x0000_0000);
    }

    #[test]
    fn reader_reads_in_order() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&7u16.to_le_bytes());
        buf.extend_from_slice(&3u64.to_le_bytes());
        put_name(&mut buf, "abc");
        put_blob(&mut buf, b"xyz").unwrap();

        let mut r = ByteReader::new(&buf, CoreError::invalid_format);
        assert_eq!(r.u16().unwrap(), 7);
        assert_eq!(r.u64().unwrap(), 3);
        assert_eq!(r.name().unwrap(), "abc");
        assert_eq!(r.blob().unwrap(), b"xyz");
        r.finish("test").unwrap();
    }

    #[test]
    fn reader_short_buffer_uses_error_constructor() {
        let buf = [1u8, 2, 3];
        let mut r = ByteReader::new(&buf, CoreError::wal_corruption);
        let err = r.u64().unwrap_err();
        assert!(matches!(err, CoreError::WalCorruption { .. }));
    }

    #[test]
    fn reader_rejects_trailing_bytes() {
        let buf = [0u8; 3];
        let mut r = ByteReader::new(&buf, CoreError::invalid_format);
        r.u16().unwrap();
        assert_eq!(r.finish("test").unwrap_err().kind(), ErrorKind::Corruption);
    }
}
