//! # kvmodel Testkit
//!
//! Test utilities for kvmodel.
//!
//! This crate provides:
//! - Fixture models and engines over an in-memory store
//! - Property-based test generators using proptest
//! - A harness that checks the store layout against a reference model
//! - Concurrent load helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kvmodel_testkit::prelude::*;
//!
//! #[test]
//! fn saves_user() {
//!     with_test_orm(|orm| {
//!         let mut user = User::new("a@x.com", "Oslo");
//!         orm.save(&mut user).unwrap();
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;
