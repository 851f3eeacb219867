//! # revkv Testkit
//!
//! Test utilities for revkv backends.
//!
//! This crate provides:
//! - Backend fixtures pairing an adapter with its manual clock
//! - The backend compliance suite - the executable form of the
//!   atomic-write contract, runnable against any [`revkv_backend::Backend`]
//! - Property-based generators and model checks using proptest
//!
//! ## Usage
//!
//! An adapter crate proves itself compliant with one test:
//!
//! ```rust
//! use revkv_testkit::prelude::*;
//!
//! let fixture = memory_fixture();
//! run_compliance_suite(&fixture.backend, &fixture.clock);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod compliance;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::compliance::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use compliance::*;
pub use fixtures::*;
pub use generators::*;
