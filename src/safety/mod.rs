//! Safety and cleanup
//!
//! Keeps the shared workspace free of leftovers between submissions and lets
//! an interrupted batch stop at a clean boundary.

pub mod shutdown;
pub mod workspace;
