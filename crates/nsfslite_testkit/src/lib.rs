//! # nsfslite Testkit
//!
//! Test utilities for nsfslite.
//!
//! This crate provides:
//! - Temporary stores that can be closed and reopened in place
//! - A shared in-memory backend with write and sync fault injection
//! - A reference model of the variable store
//! - Property-based operation generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nsfslite_testkit::prelude::*;
//!
//! #[test]
//! fn survives_reopen() {
//!     let store = TestStore::file();
//!     let id = store.create_variable("v", None).unwrap();
//!     store.insert(id, None, 0, b"abc").unwrap();
//!     let store = store.reopen();
//!     assert_eq!(store.read_all(id).unwrap(), b"abc");
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;
pub mod model;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::model::*;
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;
pub use model::*;
