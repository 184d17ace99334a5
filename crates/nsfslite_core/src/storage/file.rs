//! The storage file: header slots, variable extents and catalogs.

use crate::directory::VariableDirectory;
use crate::error::{CoreError, CoreResult};
use crate::storage::catalog::Catalog;
use crate::storage::header::{FileHeader, DATA_START, HEADER_SLOT_SIZE};
use crate::storage::{Extent, FreeList};
use crate::types::VariableId;
use nsfslite_storage::StorageBackend;

/// Committed state read from a storage file.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Current header.
    pub header: FileHeader,
    /// Live variables.
    pub directory: VariableDirectory,
    /// Free extents.
    pub free: FreeList,
}

impl Snapshot {
    /// Returns the end of the highest byte referenced by this snapshot.
    #[must_use]
    pub fn high_water_mark(&self) -> u64 {
        self.directory
            .list()
            .map(|e| e.extent.end())
            .chain(self.free.iter().map(|e| e.end()))
            .chain(std::iter::once(self.header.catalog.end()))
            .fold(DATA_START, u64::max)
    }
}

/// Flat byte container for committed variable data.
///
/// Variable bytes are never overwritten in place: a commit writes changed
/// variables to fresh extents, appends a new catalog and then publishes
/// both with a header write.
pub struct StorageFile {
    backend: Box<dyn StorageBackend>,
}

impl StorageFile {
    /// Wraps a backend without reading it.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Opens the storage file, initialising an empty backend.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat`/`ChecksumMismatch` for a damaged file, or a
    /// storage error.
    pub fn open(backend: Box<dyn StorageBackend>, format_version: u16) -> CoreResult<(Self, Snapshot)> {
        let mut file = Self::new(backend);
        if file.size()? == 0 {
            file.initialize(format_version)?;
        }
        let snapshot = file.load()?;
        Ok((file, snapshot))
    }

    fn initialize(&mut self, format_version: u16) -> CoreResult<()> {
        let header = FileHeader::initial(format_version);
        let mut prefix = Vec::with_capacity(DATA_START as usize);
        prefix.extend_from_slice(&header.encode());
        prefix.resize(DATA_START as usize, 0);
        self.backend.append(&prefix)?;
        self.backend.sync()?;
        tracing::debug!(version = format_version, "initialized storage file");
        Ok(())
    }

    /// Reads the current header and catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the header or catalog is damaged.
    pub fn load(&self) -> CoreResult<Snapshot> {
        let size = self.size()?;
        if size < DATA_START {
            return Err(CoreError::invalid_format(format!(
                "storage file is {size} bytes, shorter than its header"
            )));
        }

        let slots = self.backend.read_at(0, DATA_START as usize)?;
        let (slot_a, slot_b) = slots.split_at(HEADER_SLOT_SIZE);
        let header = FileHeader::select(slot_a, slot_b)?;

        match self.load_catalog(&header, size) {
            Ok(catalog) => Ok(Snapshot {
                header,
                directory: catalog.directory,
                free: catalog.free,
            }),
            Err(err) => {
                // a torn commit can leave a valid header over a damaged catalog
                let other = if header.slot_offset() == 0 { slot_b } else { slot_a };
                let Some(older) = FileHeader::decode(other)
                    .ok()
                    .filter(|h| h.generation < header.generation)
                else {
                    return Err(err);
                };
                tracing::warn!(
                    generation = header.generation,
                    error = %err,
                    "newest catalog unreadable, falling back to previous header"
                );
                let catalog = self.load_catalog(&older, size)?;
                Ok(Snapshot {
                    header: older,
                    directory: catalog.directory,
                    free: catalog.free,
                })
            }
        }
    }

    fn load_catalog(&self, header: &FileHeader, size: u64) -> CoreResult<Catalog> {
        if header.catalog.is_empty() {
            return Ok(Catalog::empty());
        }
        if header.catalog.end() > size {
            return Err(CoreError::invalid_format(format!(
                "catalog at {}..{} lies past end of file ({size} bytes)",
                header.catalog.offset,
                header.catalog.end()
            )));
        }
        Catalog::decode(&self.read_extent(header.catalog)?)
    }

    /// Reads a whole extent.
    pub fn read_extent(&self, extent: Extent) -> CoreResult<Vec<u8>> {
        self.read_at(extent.offset, extent.len)
    }

    /// Reads `len` bytes at `offset`.
    pub fn read_at(&self, offset: u64, len: u64) -> CoreResult<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let len = usize::try_from(len)
            .map_err(|_| CoreError::invalid_argument(format!("read of {len} bytes too large")))?;
        Ok(self.backend.read_at(offset, len)?)
    }

    /// Writes bytes at `offset`, which may be the current end of file.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> CoreResult<()> {
        self.backend.write_at(offset, data)?;
        Ok(())
    }

    /// Appends a catalog and returns its extent.
    pub fn append_catalog(
        &mut self,
        directory: &VariableDirectory,
        free: &FreeList,
        next_id: VariableId,
    ) -> CoreResult<Extent> {
        let bytes = Catalog::encode(directory, free, next_id);
        let offset = self.backend.append(&bytes)?;
        Ok(Extent::new(offset, bytes.len() as u64))
    }

    /// Writes a header into its slot.
    pub fn write_header(&mut self, header: &FileHeader) -> CoreResult<()> {
        self.backend.write_at(header.slot_offset(), &header.encode())?;
        Ok(())
    }

    /// Returns the file size.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Forces written data to durable storage.
    pub fn sync(&mut self) -> CoreResult<()> {
        self.backend.sync()?;
        Ok(())
    }

    /// Flushes written data to the OS.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.backend.flush()?;
        Ok(())
    }

    /// Cuts the file back to `size` bytes.
    pub fn truncate(&mut self, size: u64) -> CoreResult<()> {
        self.backend.truncate(size)?;
        Ok(())
    }
}

impl std::fmt::Debug for StorageFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageFile")
            .field("size", &self.backend.size().ok())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::header::FORMAT_VERSION;
    use crate::types::SequenceNumber;
    use nsfslite_storage::InMemoryBackend;

    #[test]
    fn open_initializes_empty_backend() {
        let backend = InMemoryBackend::new();
        let (file, snapshot) = StorageFile::open(Box::new(backend.clone()), FORMAT_VERSION).unwrap();

        assert_eq!(file.size().unwrap(), DATA_START);
        assert_eq!(snapshot.header.generation, 0);
        assert!(snapshot.directory.is_empty());
        assert_eq!(backend.data().len() as u64, DATA_START);
    }

    #[test]
    fn published_catalog_is_loaded() {
        let backend = InMemoryBackend::new();
        let (mut file, snapshot) = StorageFile::open(Box::new(backend.clone()), FORMAT_VERSION).unwrap();

        let mut dir = snapshot.directory.clone();
        let id = dir.next_id();
        dir.create("v", id).unwrap();
        let data_at = file.size().unwrap();
        file.write_at(data_at, b"hello").unwrap();
        dir.set_extent(id, Extent::new(data_at, 5)).unwrap();

        let catalog = file.append_catalog(&dir, &snapshot.free, dir.next_id()).unwrap();
        let header = snapshot.header.next(SequenceNumber::new(1), catalog);
        file.write_header(&header).unwrap();

        let (reopened, loaded) = StorageFile::open(Box::new(backend), FORMAT_VERSION).unwrap();
        assert_eq!(loaded.header, header);
        let entry = loaded.directory.get(id).unwrap();
        assert_eq!(reopened.read_extent(entry.extent).unwrap(), b"hello");
        assert_eq!(loaded.high_water_mark(), catalog.end());
    }

    #[test]
    fn unpublished_catalog_is_ignored() {
        let backend = InMemoryBackend::new();
        let (mut file, snapshot) = StorageFile::open(Box::new(backend.clone()), FORMAT_VERSION).unwrap();

        let mut dir = snapshot.directory.clone();
        dir.create("v", dir.next_id()).unwrap();
        file.append_catalog(&dir, &snapshot.free, dir.next_id()).unwrap();

        let (_, loaded) = StorageFile::open(Box::new(backend), FORMAT_VERSION).unwrap();
        assert!(loaded.directory.is_empty());
        assert_eq!(loaded.high_water_mark(), DATA_START);
    }

    #[test]
    fn damaged_catalog_falls_back_to_previous_header() {
        let backend = InMemoryBackend::new();
        let (mut file, snapshot) = StorageFile::open(Box::new(backend.clone()), FORMAT_VERSION).unwrap();

        let mut dir = snapshot.directory.clone();
        dir.create("first", dir.next_id()).unwrap();
        let catalog = file.append_catalog(&dir, &snapshot.free, dir.next_id()).unwrap();
        let first = snapshot.header.next(SequenceNumber::new(1), catalog);
        file.write_header(&first).unwrap();

        dir.create("second", dir.next_id()).unwrap();
        let catalog = file.append_catalog(&dir, &snapshot.free, dir.next_id()).unwrap();
        file.write_header(&first.next(SequenceNumber::new(2), catalog)).unwrap();
        // flip a byte inside the newest catalog
        let mut byte = file.read_at(catalog.offset + 8, 1).unwrap();
        byte[0] ^= 0xFF;
        file.write_at(catalog.offset + 8, &byte).unwrap();

        let (_, loaded) = StorageFile::open(Box::new(backend), FORMAT_VERSION).unwrap();
        assert_eq!(loaded.header, first);
        assert_eq!(loaded.directory.len(), 1);
        assert!(loaded.directory.lookup("first").is_ok());
    }

    #[test]
    fn short_file_rejected() {
        let backend = InMemoryBackend::with_data(vec![0u8; 10]);
        let err = StorageFile::open(Box::new(backend), FORMAT_VERSION).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFormat { .. }));
    }
}
