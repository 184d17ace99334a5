//! Simulated post-commit state.
//!
//! A `StagedState` is a copy of the committed directory plus the contents
//! of every variable an operation has touched. Operations are applied to it
//! through [`crate::variable`], which validates before mutating, so a batch
//! that applies cleanly here is known to apply cleanly to the store.

use crate::directory::{VariableDirectory, VariableEntry};
use crate::error::CoreResult;
use crate::stride::Stride;
use crate::transaction::Operation;
use crate::types::{SequenceNumber, VariableId};
use crate::variable;
use std::collections::{BTreeSet, HashMap};

/// Pending view of the store with a batch of operations applied.
#[derive(Debug, Clone)]
pub struct StagedState {
    base_seq: SequenceNumber,
    directory: VariableDirectory,
    /// Bytes of every variable loaded so far, keyed by ID.
    contents: HashMap<VariableId, Vec<u8>>,
    /// Variables whose bytes differ from the committed extent.
    dirty: BTreeSet<VariableId>,
    /// Entries removed by `Delete`, with their committed extents.
    deleted: Vec<VariableEntry>,
}

impl StagedState {
    /// Creates a view of the committed state at `base_seq`.
    #[must_use]
    pub fn new(directory: VariableDirectory, base_seq: SequenceNumber) -> Self {
        Self {
            base_seq,
            directory,
            contents: HashMap::new(),
            dirty: BTreeSet::new(),
            deleted: Vec::new(),
        }
    }

    /// Returns the committed sequence this view was built from.
    #[must_use]
    pub fn base_seq(&self) -> SequenceNumber {
        self.base_seq
    }

    /// Returns the staged directory.
    #[must_use]
    pub fn directory(&self) -> &VariableDirectory {
        &self.directory
    }

    /// Applies one operation, loading committed bytes through `load` on
    /// first touch.
    ///
    /// Returns the removed bytes for `Remove`.
    ///
    /// # Errors
    ///
    /// Returns the validation error of the operation; the view is then
    /// unchanged.
    pub fn apply<L>(&mut self, op: &Operation, load: &mut L) -> CoreResult<Option<Vec<u8>>>
    where
        L: FnMut(&VariableEntry) -> CoreResult<Vec<u8>>,
    {
        match op {
            Operation::Create { id, name } => {
                self.directory.create(name, *id)?;
                self.contents.insert(*id, Vec::new());
                self.dirty.insert(*id);
                Ok(None)
            }
            Operation::Delete { name } => {
                let entry = self.directory.delete(name)?;
                self.contents.remove(&entry.id);
                self.dirty.remove(&entry.id);
                self.deleted.push(entry);
                Ok(None)
            }
            Operation::Insert { id, offset, data } => {
                let bytes = self.bytes_mut(*id, load)?;
                variable::insert(bytes, *offset, data)?;
                self.dirty.insert(*id);
                Ok(None)
            }
            Operation::Write { id, stride, data } => {
                let bytes = self.bytes_mut(*id, load)?;
                variable::write(bytes, stride, data)?;
                if !stride.is_empty() {
                    self.dirty.insert(*id);
                }
                Ok(None)
            }
            Operation::Remove { id, stride } => {
                let bytes = self.bytes_mut(*id, load)?;
                let removed = variable::remove(bytes, stride)?;
                if !stride.is_empty() {
                    self.dirty.insert(*id);
                }
                Ok(Some(removed))
            }
        }
    }

    /// Reads through the view.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `OutOfRange` as a committed read would.
    pub fn read<L>(&mut self, id: VariableId, stride: &Stride, load: &mut L) -> CoreResult<Vec<u8>>
    where
        L: FnMut(&VariableEntry) -> CoreResult<Vec<u8>>,
    {
        let bytes = self.bytes_mut(id, load)?;
        variable::read(bytes, stride)
    }

    /// Returns the staged length of a variable.
    ///
    /// # Errors
    ///
    /// Returns `VariableIdNotFound` if the variable does not exist here.
    pub fn length(&self, id: VariableId) -> CoreResult<u64> {
        let entry = self.directory.get(id)?;
        Ok(self
            .contents
            .get(&id)
            .map_or(entry.len(), |bytes| bytes.len() as u64))
    }

    fn bytes_mut<L>(&mut self, id: VariableId, load: &mut L) -> CoreResult<&mut Vec<u8>>
    where
        L: FnMut(&VariableEntry) -> CoreResult<Vec<u8>>,
    {
        let entry = self.directory.get(id)?;
        if !self.contents.contains_key(&id) {
            let bytes = load(entry)?;
            self.contents.insert(id, bytes);
        }
        Ok(self.contents.entry(id).or_default())
    }

    /// Splits the view into what a commit must persist.
    #[must_use]
    pub fn into_changes(self) -> StagedChanges {
        let mut contents = self.contents;
        let dirty = self
            .dirty
            .into_iter()
            .map(|id| (id, contents.remove(&id).unwrap_or_default()))
            .collect();
        StagedChanges {
            directory: self.directory,
            dirty,
            deleted: self.deleted,
        }
    }
}

/// Output of a successful simulation.
#[derive(Debug)]
pub struct StagedChanges {
    /// Directory after the batch; extents of dirty variables are stale.
    pub directory: VariableDirectory,
    /// New contents of every changed variable, in ID order.
    pub dirty: Vec<(VariableId, Vec<u8>)>,
    /// Variables deleted by the batch.
    pub deleted: Vec<VariableEntry>,
}
