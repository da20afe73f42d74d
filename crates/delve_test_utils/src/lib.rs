//! # Delve Test Utilities
//!
//! Shared testing utilities for the delve crates:
//! - Room and corridor fixtures for configurators and coordinators
//! - A scripted path solver
//! - Determinism test harness
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;

/// Re-export proptest for convenience.
pub use proptest;
