//! Extents and the free-extent list of the storage file.

use std::collections::BTreeMap;

/// A contiguous byte range in the storage file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent {
    /// Absolute file offset.
    pub offset: u64,
    /// Length in bytes.
    pub len: u64,
}

impl Extent {
    /// The extent of an empty variable.
    pub const EMPTY: Self = Self { offset: 0, len: 0 };

    /// Creates a new extent.
    #[must_use]
    pub const fn new(offset: u64, len: u64) -> Self {
        Self { offset, len }
    }

    /// Returns the offset one past the last byte.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.offset + self.len
    }

    /// Returns true if the extent covers no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Free space inside the storage file, keyed by offset.
///
/// Adjacent free extents are merged on release. Allocation is first-fit
/// by offset, which keeps data packed towards the front of the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreeList {
    extents: BTreeMap<u64, u64>,
}

impl FreeList {
    /// Creates an empty free list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes `len` bytes from the first free extent large enough.
    ///
    /// Returns `None` if no free extent fits; the caller then grows the file.
    pub fn allocate(&mut self, len: u64) -> Option<Extent> {
        if len == 0 {
            return Some(Extent::EMPTY);
        }

        let (&offset, &free_len) = self.extents.iter().find(|(_, &l)| l >= len)?;
        self.extents.remove(&offset);
        if free_len > len {
            self.extents.insert(offset + len, free_len - len);
        }
        Some(Extent::new(offset, len))
    }

    /// Returns an extent to the free list, merging with its neighbours.
    pub fn release(&mut self, extent: Extent) {
        if extent.is_empty() {
            return;
        }

        let mut offset = extent.offset;
        let mut len = extent.len;

        if let Some((&prev_off, &prev_len)) = self.extents.range(..offset).next_back() {
            if prev_off + prev_len == offset {
                self.extents.remove(&prev_off);
                offset = prev_off;
                len += prev_len;
            }
        }

        let end = offset + len;
        if let Some(next_len) = self.extents.remove(&end) {
            len += next_len;
        }

        self.extents.insert(offset, len);
    }

    /// Iterates over free extents in offset order.
    pub fn iter(&self) -> impl Iterator<Item = Extent> + '_ {
        self.extents.iter().map(|(&o, &l)| Extent::new(o, l))
    }

    /// Returns the total number of free bytes.
    #[must_use]
    pub fn total_free(&self) -> u64 {
        self.extents.values().sum()
    }

    /// Returns the number of free extents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.extents.len()
    }

    /// Returns true if nothing is free.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }
}

impl FromIterator<Extent> for FreeList {
    fn from_iter<I: IntoIterator<Item = Extent>>(iter: I) -> Self {
        let mut list = Self::new();
        for extent in iter {
            list.release(extent);
        }
        list
    }
}
