//! Shared utilities.
//!
//! Recursive directory copies used for workspace isolation, plus test helpers.

pub mod fs;

#[cfg(test)]
pub mod testutil;
