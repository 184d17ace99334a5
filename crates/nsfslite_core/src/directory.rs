//! Variable directory: names, IDs and extents.

use crate::error::{CoreError, CoreResult};
use crate::storage::Extent;
use crate::types::VariableId;
use std::collections::{BTreeMap, HashMap};

/// Longest accepted variable name, in bytes.
pub const MAX_NAME_LEN: usize = u16::MAX as usize;

/// A live variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableEntry {
    /// Stable identifier.
    pub id: VariableId,
    /// Unique name.
    pub name: String,
    /// Where the variable's bytes live in the storage file.
    pub extent: Extent,
}

impl VariableEntry {
    /// Returns the variable length in bytes.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.extent.len
    }

    /// Returns true if the variable holds no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.extent.len == 0
    }
}

/// Maps variable names to IDs and IDs to extents.
///
/// IDs are handed out in increasing order starting at 1 and are retired
/// permanently on delete. The directory is cheap to clone, which is how
/// transactions take a private view of it.
#[derive(Debug, Clone)]
pub struct VariableDirectory {
    by_name: HashMap<String, VariableId>,
    entries: BTreeMap<VariableId, VariableEntry>,
    next_id: u64,
}

impl Default for VariableDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_name: HashMap::new(),
            entries: BTreeMap::new(),
            next_id: VariableId::FIRST.as_u64(),
        }
    }

    /// Rebuilds a directory from persisted entries.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if names or IDs repeat, or if an ID is not
    /// below `next_id`.
    pub fn from_parts(entries: Vec<VariableEntry>, next_id: VariableId) -> CoreResult<Self> {
        let mut dir = Self {
            next_id: next_id.as_u64().max(VariableId::FIRST.as_u64()),
            ..Self::new()
        };
        for entry in entries {
            if entry.id >= next_id {
                return Err(CoreError::invalid_format(format!(
                    "{} is not below next id {}",
                    entry.id, next_id
                )));
            }
            if dir.by_name.contains_key(&entry.name) || dir.entries.contains_key(&entry.id) {
                return Err(CoreError::invalid_format(format!(
                    "duplicate catalog entry {} {:?}",
                    entry.id, entry.name
                )));
            }
            dir.by_name.insert(entry.name.clone(), entry.id);
            dir.entries.insert(entry.id, entry);
        }
        Ok(dir)
    }

    /// Checks that `name` is usable as a variable name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty or over-long name.
    pub fn validate_name(name: &str) -> CoreResult<()> {
        if name.is_empty() {
            return Err(CoreError::invalid_argument("variable name must not be empty"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(CoreError::invalid_argument(format!(
                "variable name is {} bytes, limit is {MAX_NAME_LEN}",
                name.len()
            )));
        }
        Ok(())
    }

    /// Registers a new, empty variable under a pre-assigned ID.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the name is taken, or `InvalidArgument`
    /// if the name is invalid or the ID was already handed out to a live
    /// variable.
    pub fn create(&mut self, name: &str, id: VariableId) -> CoreResult<()> {
        Self::validate_name(name)?;
        if self.by_name.contains_key(name) {
            return Err(CoreError::already_exists(name));
        }
        if self.entries.contains_key(&id) {
            return Err(CoreError::invalid_argument(format!("{id} is already in use")));
        }

        self.by_name.insert(name.to_string(), id);
        self.entries.insert(
            id,
            VariableEntry {
                id,
                name: name.to_string(),
                extent: Extent::EMPTY,
            },
        );
        self.next_id = self.next_id.max(id.as_u64() + 1);
        Ok(())
    }

    /// Resolves a name to its ID.
    ///
    /// # Errors
    ///
    /// Returns `VariableNotFound` if no live variable has this name.
    pub fn lookup(&self, name: &str) -> CoreResult<VariableId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| CoreError::variable_not_found(name))
    }

    /// Returns the entry for an ID.
    ///
    /// # Errors
    ///
    /// Returns `VariableIdNotFound` if the ID is unknown or deleted.
    pub fn get(&self, id: VariableId) -> CoreResult<&VariableEntry> {
        self.entries
            .get(&id)
            .ok_or(CoreError::VariableIdNotFound { id })
    }

    /// Returns true if `id` names a live variable.
    #[must_use]
    pub fn contains(&self, id: VariableId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Returns the committed length of a variable.
    ///
    /// # Errors
    ///
    /// Returns `VariableIdNotFound` if the ID is unknown or deleted.
    pub fn length(&self, id: VariableId) -> CoreResult<u64> {
        self.get(id).map(VariableEntry::len)
    }

    /// Removes a variable, returning its entry so the caller can release
    /// the extent.
    ///
    /// # Errors
    ///
    /// Returns `VariableNotFound` if no live variable has this name.
    pub fn delete(&mut self, name: &str) -> CoreResult<VariableEntry> {
        let id = self.lookup(name)?;
        self.by_name.remove(name);
        self.entries
            .remove(&id)
            .ok_or(CoreError::VariableIdNotFound { id })
    }

    /// Points a variable at a new extent.
    ///
    /// # Errors
    ///
    /// Returns `VariableIdNotFound` if the ID is unknown or deleted.
    pub fn set_extent(&mut self, id: VariableId, extent: Extent) -> CoreResult<()> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(CoreError::VariableIdNotFound { id })?;
        entry.extent = extent;
        Ok(())
    }

    /// Iterates over live variables in ID order.
    pub fn list(&self) -> impl Iterator<Item = &VariableEntry> {
        self.entries.values()
    }

    /// Returns the ID the next `create` would be given.
    #[must_use]
    pub fn next_id(&self) -> VariableId {
        VariableId::new(self.next_id)
    }

    /// Returns the number of live variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no live variables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn create_and_lookup() {
        let mut dir = VariableDirectory::new();
        let id = dir.next_id();
        assert_eq!(id, VariableId::FIRST);

        dir.create("temperature", id).unwrap();
        assert_eq!(dir.lookup("temperature").unwrap(), id);
        assert_eq!(dir.length(id).unwrap(), 0);
        assert_eq!(dir.next_id(), VariableId::new(2));
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut dir = VariableDirectory::new();
        dir.create("a", VariableId::new(1)).unwrap();
        let err = dir.create("a", VariableId::new(2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn invalid_names_rejected() {
        let mut dir = VariableDirectory::new();
        let err = dir.create("", VariableId::new(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let long = "x".repeat(MAX_NAME_LEN + 1);
        let err = dir.create(&long, VariableId::new(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        dir.create(&"y".repeat(MAX_NAME_LEN), VariableId::new(1))
            .unwrap();
    }

    #[test]
    fn delete_retires_id() {
        let mut dir = VariableDirectory::new();
        dir.create("a", dir.next_id()).unwrap();
        let entry = dir.delete("a").unwrap();
        assert_eq!(entry.id, VariableId::new(1));

        assert_eq!(dir.lookup("a").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(dir.length(entry.id).unwrap_err().kind(), ErrorKind::NotFound);

        dir.create("a", dir.next_id()).unwrap();
        assert_eq!(dir.lookup("a").unwrap(), VariableId::new(2));
    }

    #[test]
    fn delete_missing_is_not_found() {
        let mut dir = VariableDirectory::new();
        assert_eq!(dir.delete("nope").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn list_is_ordered_by_id() {
        let mut dir = VariableDirectory::new();
        dir.create("z", VariableId::new(1)).unwrap();
        dir.create("a", VariableId::new(2)).unwrap();
        dir.create("m", VariableId::new(3)).unwrap();
        let names: Vec<_> = dir.list().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn set_extent_updates_length() {
        let mut dir = VariableDirectory::new();
        let id = dir.next_id();
        dir.create("a", id).unwrap();
        dir.set_extent(id, Extent::new(128, 13)).unwrap();
        assert_eq!(dir.length(id).unwrap(), 13);
    }

    #[test]
    fn from_parts_rejects_duplicates() {
        let entry = VariableEntry {
            id: VariableId::new(1),
            name: "a".into(),
            extent: Extent::EMPTY,
        };
        let err = VariableDirectory::from_parts(
            vec![entry.clone(), entry],
            VariableId::new(5),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }

    #[test]
    fn from_parts_keeps_next_id() {
        let dir = VariableDirectory::from_parts(Vec::new(), VariableId::new(9)).unwrap();
        assert_eq!(dir.next_id(), VariableId::new(9));
    }
}
