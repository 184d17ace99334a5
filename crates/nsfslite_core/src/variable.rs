//! Byte-level operations on a single variable's contents.
//!
//! These functions are the single definition of insert, strided read,
//! strided write and strided remove. Transaction staging, commit and WAL
//! replay all go through them, so a validated batch applies identically in
//! each place.

use crate::error::{CoreError, CoreResult};
use crate::stride::Stride;

/// Splices `data` into `bytes` at `offset`, shifting the tail right.
///
/// # Errors
///
/// Returns `OutOfRange` if `offset` is past the end of `bytes`.
pub fn insert(bytes: &mut Vec<u8>, offset: u64, data: &[u8]) -> CoreResult<()> {
    let len = bytes.len() as u64;
    if offset > len {
        return Err(CoreError::OutOfRange {
            position: offset,
            length: len,
        });
    }
    let at = offset as usize;
    bytes.splice(at..at, data.iter().copied());
    Ok(())
}

/// Gathers the bytes of the stride's elements, in order.
///
/// # Errors
///
/// Returns `OutOfRange` if any position is outside `bytes`.
pub fn read(bytes: &[u8], stride: &Stride) -> CoreResult<Vec<u8>> {
    stride.check_bounds(bytes.len() as u64)?;
    Ok(stride.positions().map(|p| bytes[p as usize]).collect())
}

/// Overwrites the stride's elements with `data`.
///
/// # Errors
///
/// Returns `SizeMismatch` if `data` is not exactly `nelems * elem_size`
/// bytes, or
/// `OutOfRange` if any position is outside `bytes`.
pub fn write(bytes: &mut [u8], stride: &Stride, data: &[u8]) -> CoreResult<()> {
    check_payload(stride, data)?;
    stride.check_bounds(bytes.len() as u64)?;
    for (p, &b) in stride.positions().zip(data) {
        bytes[p as usize] = b;
    }
    Ok(())
}

/// Deletes the stride's elements and closes the gaps.
///
/// Returns the removed bytes in order.
///
/// # Errors
///
/// Returns `OutOfRange` if any position is outside `bytes`.
pub fn remove(bytes: &mut Vec<u8>, stride: &Stride) -> CoreResult<Vec<u8>> {
    let removed = read(bytes, stride)?;
    if let Some((lo, hi)) = stride.bounds() {
        if stride.is_contiguous() {
            bytes.drain(lo as usize..=hi as usize);
        } else {
            let mut index = 0u64;
            bytes.retain(|_| {
                let keep = !stride.contains(index);
                index += 1;
                keep
            });
        }
    }
    Ok(removed)
}

/// Checks that a write payload covers the stride's elements exactly.
///
/// # Errors
///
/// Returns `SizeMismatch` otherwise.
pub fn check_payload(stride: &Stride, data: &[u8]) -> CoreResult<()> {
    let actual = data.len() as u64;
    if actual != stride.byte_len() {
        return Err(CoreError::SizeMismatch {
            expected: stride.byte_len(),
            actual,
        });
    }
    Ok(())
}
