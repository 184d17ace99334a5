//! Stride descriptors addressing elements within a variable.
//!
//! A stride is `(start, step, nelems)` over elements of `elem_size` bytes:
//! element `i` occupies the bytes
//! `start + i * step * elem_size .. start + i * step * elem_size + elem_size`.
//! `start` is a byte offset; `step` counts whole elements and is at least 1,
//! so elements never overlap and positions always ascend.
//!
//! Slice notation `[start:stop:step]` describes single-byte elements with an
//! exclusive `stop` and `ceil((stop - start) / step)` elements. A negative
//! step or a `stop` at or before `start` addresses nothing.

use crate::error::{CoreError, CoreResult};

/// An ascending, non-overlapping run of equally sized elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stride {
    start: u64,
    step: u64,
    nelems: u64,
    elem_size: u64,
}

impl Stride {
    /// Creates a stride of single-byte elements.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStride` if `step` is zero or the last position
    /// overflows `u64`.
    pub fn new(start: u64, step: u64, nelems: u64) -> CoreResult<Self> {
        Self::with_elem_size(start, step, nelems, 1)
    }

    /// Creates a stride of `elem_size`-byte elements.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStride` if `step` or `elem_size` is zero, or if the
    /// last addressed byte overflows `u64`.
    pub fn with_elem_size(start: u64, step: u64, nelems: u64, elem_size: u64) -> CoreResult<Self> {
        if step == 0 {
            return Err(CoreError::invalid_stride("step must be non-zero"));
        }
        if elem_size == 0 {
            return Err(CoreError::invalid_stride("element size must be non-zero"));
        }

        if nelems > 0 {
            let last = u128::from(start)
                + u128::from(nelems - 1) * u128::from(step) * u128::from(elem_size)
                + u128::from(elem_size - 1);
            if last > u128::from(u64::MAX) {
                return Err(CoreError::invalid_stride(format!(
                    "last position overflows: start {start}, step {step}, nelems {nelems}, size {elem_size}"
                )));
            }
        }

        Ok(Self {
            start,
            step,
            nelems,
            elem_size,
        })
    }

    /// Creates a byte stride from slice notation `[start:stop:step]`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStride` if `step` is zero or `start` is negative.
    pub fn from_slice(start: i64, stop: i64, step: i64) -> CoreResult<Self> {
        if step == 0 {
            return Err(CoreError::invalid_stride("step must be non-zero"));
        }
        if start < 0 {
            return Err(CoreError::invalid_stride(format!(
                "start must be non-negative, got {start}"
            )));
        }
        if step < 0 || stop <= start {
            return Self::new(start as u64, 1, 0);
        }

        let distance = (i128::from(stop) - i128::from(start)) as u128;
        let step = step as u64;
        // distance fits in 64 bits, so the quotient does too
        let nelems = distance.div_ceil(u128::from(step)) as u64;
        Self::new(start as u64, step, nelems)
    }

    /// Creates a step-1 byte stride covering `len` bytes from `start`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStride` if `start + len` overflows.
    pub fn contiguous(start: u64, len: u64) -> CoreResult<Self> {
        Self::new(start, 1, len)
    }

    /// Returns the byte offset of the first element.
    #[must_use]
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// Returns the distance between consecutive elements, in elements.
    #[must_use]
    pub const fn step(&self) -> u64 {
        self.step
    }

    /// Returns the number of addressed elements.
    #[must_use]
    pub const fn nelems(&self) -> u64 {
        self.nelems
    }

    /// Returns the size of one element in bytes.
    #[must_use]
    pub const fn elem_size(&self) -> u64 {
        self.elem_size
    }

    /// Returns the number of addressed bytes.
    #[must_use]
    pub const fn byte_len(&self) -> u64 {
        self.nelems * self.elem_size
    }

    /// Returns true if the stride addresses nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nelems == 0
    }

    /// Returns true if the elements are packed back to back.
    #[must_use]
    pub const fn is_contiguous(&self) -> bool {
        self.step == 1
    }

    /// Returns the byte offset of element `index`.
    ///
    /// `index` must be below `nelems`.
    #[must_use]
    pub const fn element_offset(&self, index: u64) -> u64 {
        self.start + index * self.step * self.elem_size
    }

    /// Iterates over the addressed byte positions in ascending order.
    pub fn positions(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.nelems).flat_map(move |i| {
            let base = self.element_offset(i);
            base..base + self.elem_size
        })
    }

    /// Returns the lowest and highest addressed byte positions, if any.
    #[must_use]
    pub fn bounds(&self) -> Option<(u64, u64)> {
        if self.nelems == 0 {
            return None;
        }
        let last = self.element_offset(self.nelems - 1) + self.elem_size - 1;
        Some((self.start, last))
    }

    /// Returns true if byte `position` belongs to an addressed element.
    #[must_use]
    pub fn contains(&self, position: u64) -> bool {
        match self.bounds() {
            Some((lo, hi)) if (lo..=hi).contains(&position) => {
                (position - lo) % (self.step * self.elem_size) < self.elem_size
            }
            _ => false,
        }
    }

    /// Checks every addressed byte against a variable of `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` naming the highest addressed position.
    pub fn check_bounds(&self, len: u64) -> CoreResult<()> {
        match self.bounds() {
            Some((_, hi)) if hi >= len => Err(CoreError::OutOfRange {
                position: hi,
                length: len,
            }),
            _ => Ok(()),
        }
    }
}
