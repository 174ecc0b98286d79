//! Bounded external process execution
//!
//! Commands run through `/bin/sh -c` as leaders of their own process group,
//! so a timeout can kill everything they started.

pub mod output;
pub mod process_group;
pub mod runner;

pub use runner::{ProcessRunner, TimedRun};
