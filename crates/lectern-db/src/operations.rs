//! Index operations.

pub mod artifacts;
pub mod stats;
pub mod vectors;
