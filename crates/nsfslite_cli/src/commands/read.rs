//! Read command implementation.

use super::{existing_store_config, hex_encode, require_file};
use nsfslite_core::{Engine, Stride};
use std::io::Write;
use std::path::Path;

/// Slice bounds given on the command line.
#[derive(Debug, Clone, Copy)]
pub struct Range {
    /// First position.
    pub start: i64,
    /// Exclusive stop; `None` runs to the end of the variable.
    pub stop: Option<i64>,
    /// Distance between positions; a negative step reads nothing.
    pub step: i64,
}

/// Runs the read command.
pub fn run(
    db: &Path,
    wal: &Path,
    name: &str,
    range: Range,
    hex: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    require_file(db, "storage file")?;
    let engine = Engine::open(db, wal, existing_store_config())?;
    let bytes = read(&engine, name, range)?;
    engine.close()?;

    if hex {
        println!("{}", hex_encode(&bytes));
    } else {
        let mut out = std::io::stdout().lock();
        out.write_all(&bytes)?;
        out.flush()?;
    }

    Ok(())
}

/// Reads the slice of `name` described by `range`.
pub fn read(engine: &Engine, name: &str, range: Range) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let id = engine.get_id(name)?;
    let stop = match range.stop {
        Some(stop) => stop,
        None => i64::try_from(engine.length(id)?)?,
    };
    let stride = Stride::from_slice(range.start, stop, range.step)?;
    Ok(engine.read(id, &stride)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(bytes: &[u8]) -> Engine {
        let engine = Engine::open_in_memory().unwrap();
        let id = engine.create_variable("v", None).unwrap();
        engine.insert(id, None, 0, bytes).unwrap();
        engine
    }

    #[test]
    fn open_stop_reads_to_the_end() {
        let engine = engine_with(b"abcdef");
        let range = Range {
            start: 2,
            stop: None,
            step: 1,
        };
        assert_eq!(read(&engine, "v", range).unwrap(), b"cdef");
    }

    #[test]
    fn open_stop_with_step_skips() {
        let engine = engine_with(b"abcdef");
        let range = Range {
            start: 1,
            stop: None,
            step: 2,
        };
        assert_eq!(read(&engine, "v", range).unwrap(), b"bdf");
    }

    #[test]
    fn negative_step_reads_nothing() {
        let engine = engine_with(b"abcdef");
        let range = Range {
            start: 5,
            stop: None,
            step: -2,
        };
        assert!(read(&engine, "v", range).unwrap().is_empty());
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let engine = engine_with(b"abc");
        let range = Range {
            start: 0,
            stop: None,
            step: 1,
        };
        assert!(read(&engine, "missing", range).is_err());
    }
}
