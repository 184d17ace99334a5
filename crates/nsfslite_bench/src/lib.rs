//! Benchmark utilities.

use nsfslite_core::{Engine, VariableId};
use rand::Rng;

/// Generate random variable contents of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Opens an in-memory engine holding one variable of `size` random bytes.
pub fn engine_with_variable(size: usize) -> (Engine, VariableId) {
    let engine = Engine::open_in_memory().expect("Failed to open engine");
    let id = engine
        .create_variable("bench", None)
        .expect("Failed to create variable");
    engine
        .insert(id, None, 0, &random_data(size))
        .expect("Failed to fill variable");
    (engine, id)
}
