//! Reference model of the variable store.
//!
//! Each operation is written out directly over a `Vec<u8>` per variable,
//! independently of the engine's stride code, so the two can be compared
//! operation by operation.

use nsfslite_core::{CoreResult, Engine, Stride, TxnHandle};
use std::collections::BTreeMap;

/// A concrete operation on named variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Create an empty variable.
    Create {
        /// Variable name.
        name: String,
    },
    /// Delete a variable.
    Delete {
        /// Variable name.
        name: String,
    },
    /// Splice bytes in at an offset.
    Insert {
        /// Variable name.
        name: String,
        /// Insertion point.
        offset: u64,
        /// Bytes to insert.
        data: Vec<u8>,
    },
    /// Overwrite strided elements.
    Write {
        /// Variable name.
        name: String,
        /// Byte offset of the first element.
        start: u64,
        /// Distance between elements, in elements.
        step: u64,
        /// Number of elements.
        nelems: u64,
        /// Bytes per element.
        elem_size: u64,
        /// Replacement bytes.
        data: Vec<u8>,
    },
    /// Delete strided elements.
    Remove {
        /// Variable name.
        name: String,
        /// Byte offset of the first element.
        start: u64,
        /// Distance between elements, in elements.
        step: u64,
        /// Number of elements.
        nelems: u64,
        /// Bytes per element.
        elem_size: u64,
    },
}

impl Op {
    /// Returns the variable the operation targets.
    pub fn name(&self) -> &str {
        match self {
            Self::Create { name }
            | Self::Delete { name }
            | Self::Insert { name, .. }
            | Self::Write { name, .. }
            | Self::Remove { name, .. } => name,
        }
    }

    /// Applies the operation to an engine, directly or inside `txn`.
    ///
    /// Names resolve against committed state, so a variable created inside
    /// `txn` cannot be targeted by later operations in the same `txn`.
    pub fn apply_to(&self, engine: &Engine, txn: Option<TxnHandle>) -> CoreResult<Option<Vec<u8>>> {
        match self {
            Self::Create { name } => engine.create_variable(name, txn).map(|_| None),
            Self::Delete { name } => engine.delete_variable(name, txn).map(|()| None),
            Self::Insert { name, offset, data } => {
                let id = engine.get_id(name)?;
                engine.insert(id, txn, *offset, data).map(|()| None)
            }
            Self::Write {
                name,
                start,
                step,
                nelems,
                elem_size,
                data,
            } => {
                let id = engine.get_id(name)?;
                let stride = Stride::with_elem_size(*start, *step, *nelems, *elem_size)?;
                engine.write(id, txn, &stride, data).map(|()| None)
            }
            Self::Remove {
                name,
                start,
                step,
                nelems,
                elem_size,
            } => {
                let id = engine.get_id(name)?;
                let stride = Stride::with_elem_size(*start, *step, *nelems, *elem_size)?;
                engine.remove(id, txn, &stride, true)
            }
        }
    }
}

/// The model refused an operation; the engine must refuse it too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected;

/// In-memory reference store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelStore {
    vars: BTreeMap<String, Vec<u8>>,
}

impl ModelStore {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `op`, returning removed bytes for a remove.
    pub fn apply(&mut self, op: &Op) -> Result<Option<Vec<u8>>, Rejected> {
        match op {
            Op::Create { name } => {
                if name.is_empty() || self.vars.contains_key(name) {
                    return Err(Rejected);
                }
                self.vars.insert(name.clone(), Vec::new());
                Ok(None)
            }
            Op::Delete { name } => self.vars.remove(name).map(|_| None).ok_or(Rejected),
            Op::Insert { name, offset, data } => {
                let bytes = self.vars.get_mut(name).ok_or(Rejected)?;
                let at = usize::try_from(*offset).map_err(|_| Rejected)?;
                if at > bytes.len() {
                    return Err(Rejected);
                }
                let tail = bytes.split_off(at);
                bytes.extend_from_slice(data);
                bytes.extend_from_slice(&tail);
                Ok(None)
            }
            Op::Write {
                name,
                start,
                step,
                nelems,
                elem_size,
                data,
            } => {
                let bytes = self.vars.get_mut(name).ok_or(Rejected)?;
                let positions = positions(*start, *step, *nelems, *elem_size, bytes.len())?;
                if data.len() != positions.len() {
                    return Err(Rejected);
                }
                for (p, b) in positions.into_iter().zip(data) {
                    bytes[p] = *b;
                }
                Ok(None)
            }
            Op::Remove {
                name,
                start,
                step,
                nelems,
                elem_size,
            } => {
                let bytes = self.vars.get_mut(name).ok_or(Rejected)?;
                let positions = positions(*start, *step, *nelems, *elem_size, bytes.len())?;
                let removed = positions.iter().map(|&p| bytes[p]).collect();
                let mut doomed = vec![false; bytes.len()];
                for p in positions {
                    doomed[p] = true;
                }
                let mut i = 0;
                bytes.retain(|_| {
                    let keep = !doomed[i];
                    i += 1;
                    keep
                });
                Ok(Some(removed))
            }
        }
    }

    /// Reads the bytes of strided single-byte elements.
    pub fn read(&self, name: &str, start: u64, step: u64, nelems: u64) -> Result<Vec<u8>, Rejected> {
        let bytes = self.vars.get(name).ok_or(Rejected)?;
        let positions = positions(start, step, nelems, 1, bytes.len())?;
        Ok(positions.into_iter().map(|p| bytes[p]).collect())
    }

    /// Returns a variable's full contents.
    pub fn contents(&self, name: &str) -> Option<&[u8]> {
        self.vars.get(name).map(Vec::as_slice)
    }

    /// Returns a variable's length.
    pub fn len_of(&self, name: &str) -> Option<u64> {
        self.vars.get(name).map(|v| v.len() as u64)
    }

    /// Iterates live variable names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    /// Returns the number of live variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns true if no variables exist.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Expands a stride into byte positions, rejecting zero steps or sizes and
/// positions outside `0..len`.
fn positions(start: u64, step: u64, nelems: u64, size: u64, len: usize) -> Result<Vec<usize>, Rejected> {
    if step == 0 || size == 0 {
        return Err(Rejected);
    }
    let mut out = Vec::new();
    for i in 0..u128::from(nelems) {
        let base = u128::from(start) + i * u128::from(step) * u128::from(size);
        for pos in base..base + u128::from(size) {
            if pos >= len as u128 {
                return Err(Rejected);
            }
            out.push(pos as usize);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_with(bytes: &[u8]) -> ModelStore {
        let mut model = ModelStore::new();
        model.apply(&Op::Create { name: "v".into() }).unwrap();
        model
            .apply(&Op::Insert {
                name: "v".into(),
                offset: 0,
                data: bytes.to_vec(),
            })
            .unwrap();
        model
    }

    #[test]
    fn wide_remove_takes_whole_elements() {
        let mut model = model_with(b"aaBBccDDee");
        let removed = model
            .apply(&Op::Remove {
                name: "v".into(),
                start: 2,
                step: 2,
                nelems: 2,
                elem_size: 2,
            })
            .unwrap();
        assert_eq!(removed.as_deref(), Some(&b"BBDD"[..]));
        assert_eq!(model.contents("v"), Some(&b"aaccee"[..]));
    }

    #[test]
    fn write_rejects_wrong_payload_length() {
        let mut model = model_with(b"abc");
        let op = Op::Write {
            name: "v".into(),
            start: 0,
            step: 1,
            nelems: 2,
            elem_size: 1,
            data: b"x".to_vec(),
        };
        assert_eq!(model.apply(&op), Err(Rejected));
        assert_eq!(model.contents("v"), Some(&b"abc"[..]));
    }

    #[test]
    fn read_past_end_is_rejected() {
        let model = model_with(b"abc");
        assert_eq!(model.read("v", 1, 2, 2), Err(Rejected));
        assert_eq!(model.read("v", 0, 2, 2).unwrap(), b"ac");
    }
}
