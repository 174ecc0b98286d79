//! Observability
//!
//! Batch event log: what happened to each archive and submission.

pub mod audit;
