//! Property-based test generators using proptest.
//!
//! Operation seeds are resolved against the current [`ModelStore`] when
//! they are applied, so generated offsets track variables as they grow and
//! shrink. Resolution deliberately overshoots now and then to exercise
//! rejection paths.

use crate::model::{ModelStore, Op};
use proptest::prelude::*;

/// Names generated operations draw from.
pub const NAME_POOL: [&str; 4] = ["alpha", "beta", "gamma", "delta"];

/// Largest stride a seed resolves to.
const MAX_NELEMS: u64 = 6;

/// Element widths a seed picks from.
const ELEM_SIZES: [u64; 3] = [1, 2, 4];

/// An operation before it is fitted to the model's current state.
#[derive(Debug, Clone)]
pub enum OpSeed {
    /// Create `NAME_POOL[var]`.
    Create {
        /// Index into [`NAME_POOL`].
        var: usize,
    },
    /// Delete `NAME_POOL[var]`.
    Delete {
        /// Index into [`NAME_POOL`].
        var: usize,
    },
    /// Insert `data` somewhere in the variable.
    Insert {
        /// Index into [`NAME_POOL`].
        var: usize,
        /// Raw position, reduced modulo the length.
        at: u32,
        /// Bytes to insert.
        data: Vec<u8>,
    },
    /// Overwrite a short stride.
    Write {
        /// Index into [`NAME_POOL`].
        var: usize,
        /// Raw start, reduced modulo the length.
        at: u32,
        /// Step; zero resolves to one.
        step: u8,
        /// Raw element count.
        count: u8,
        /// Index into the element widths.
        width: usize,
        /// First byte of the replacement run.
        fill: u8,
    },
    /// Remove a short stride.
    Remove {
        /// Index into [`NAME_POOL`].
        var: usize,
        /// Raw start, reduced modulo the length.
        at: u32,
        /// Step; zero resolves to one.
        step: u8,
        /// Raw element count.
        count: u8,
        /// Index into the element widths.
        width: usize,
    },
}

impl OpSeed {
    /// Fits the seed to `model`.
    pub fn resolve(&self, model: &ModelStore) -> Op {
        let name_of = |var: usize| NAME_POOL[var % NAME_POOL.len()].to_string();
        let len_of = |var: usize| model.len_of(NAME_POOL[var % NAME_POOL.len()]).unwrap_or(0);

        match self {
            Self::Create { var } => Op::Create { name: name_of(*var) },
            Self::Delete { var } => Op::Delete { name: name_of(*var) },
            Self::Insert { var, at, data } => Op::Insert {
                name: name_of(*var),
                // one past the end is out of range
                offset: u64::from(*at) % (len_of(*var) + 2),
                data: data.clone(),
            },
            Self::Write {
                var,
                at,
                step,
                count,
                width,
                fill,
            } => {
                let nelems = u64::from(*count) % (MAX_NELEMS + 1);
                let elem_size = ELEM_SIZES[width % ELEM_SIZES.len()];
                Op::Write {
                    name: name_of(*var),
                    start: u64::from(*at) % (len_of(*var) + 1),
                    step: u64::from((*step).max(1)),
                    nelems,
                    elem_size,
                    data: (0..nelems * elem_size)
                        .map(|i| fill.wrapping_add(i as u8))
                        .collect(),
                }
            }
            Self::Remove {
                var,
                at,
                step,
                count,
                width,
            } => Op::Remove {
                name: name_of(*var),
                start: u64::from(*at) % (len_of(*var) + 1),
                step: u64::from((*step).max(1)),
                nelems: u64::from(*count) % (MAX_NELEMS + 1),
                elem_size: ELEM_SIZES[width % ELEM_SIZES.len()],
            },
        }
    }
}

/// Strategy for variable names from the pool.
pub fn name_strategy() -> impl Strategy<Value = String> {
    (0..NAME_POOL.len()).prop_map(|i| NAME_POOL[i].to_string())
}

/// Strategy for insert payloads.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..48)
}

/// Strategy for small non-zero steps.
pub fn step_strategy() -> impl Strategy<Value = u8> {
    1u8..=4
}

/// Strategy for seeds that only touch variable contents.
pub fn data_op_seed_strategy() -> impl Strategy<Value = OpSeed> {
    let var = 0..NAME_POOL.len();
    prop_oneof![
        3 => (var.clone(), any::<u32>(), payload_strategy())
            .prop_map(|(var, at, data)| OpSeed::Insert { var, at, data }),
        2 => (var.clone(), any::<u32>(), step_strategy(), any::<u8>(), 0..ELEM_SIZES.len(), any::<u8>())
            .prop_map(|(var, at, step, count, width, fill)| OpSeed::Write { var, at, step, count, width, fill }),
        2 => (var, any::<u32>(), step_strategy(), any::<u8>(), 0..ELEM_SIZES.len())
            .prop_map(|(var, at, step, count, width)| OpSeed::Remove { var, at, step, count, width }),
    ]
}

/// Strategy for any seed, including creates and deletes.
pub fn op_seed_strategy() -> impl Strategy<Value = OpSeed> {
    let var = 0..NAME_POOL.len();
    prop_oneof![
        2 => var.clone().prop_map(|var| OpSeed::Create { var }),
        1 => var.prop_map(|var| OpSeed::Delete { var }),
        7 => data_op_seed_strategy(),
    ]
}

/// Strategy for a sequence of seeds.
pub fn op_seeds(max_len: usize) -> impl Strategy<Value = Vec<OpSeed>> {
    prop::collection::vec(op_seed_strategy(), 1..max_len)
}

/// Strategy for byte strides `(start, step, nelems)` that fit a variable of
/// `len` bytes.
pub fn stride_within(len: u64) -> impl Strategy<Value = (u64, u64, u64)> {
    (0..len.max(1), step_strategy()).prop_flat_map(move |(start, step)| {
        let step = u64::from(step);
        let room = if len == 0 {
            0
        } else {
            (len - start).div_ceil(step)
        };
        (Just(start), Just(step), 0..=room)
    })
}
