//! Test-only helpers: CSV fixtures written to temp directories.
//!
//! Compiled for the crate's own tests and, behind the `test-support`
//! feature, for downstream crates that test against the engines.

pub mod fixtures;
