//! labgrade: batch grading of student lab submissions
//! Unpacks archived submissions, compiles each against the lab's build, runs
//! instructor verifier scripts under a time limit and reports the results.
//!
//! # Architecture
//!
//! ## Submissions ([`submission`])
//! - [`submission::identity`]: Archive names (`lab.section.student.epoch.tgz`)
//! - [`submission::archive`]: Read-only view of a gzip'd tarball
//! - [`submission::extract`]: Required-file extraction with operator fallback
//! - [`submission::record`]: Per-student results and notes
//!
//! ## Execution Control ([`exec`])
//! - [`exec::runner`]: Shell commands under a wall-clock limit
//! - [`exec::process_group`]: Session/process-group ownership and group kill
//! - [`exec::output`]: Bounded stdout/stderr capture
//!
//! ## Grading ([`grading`])
//! - [`grading::orchestrator`]: Compile commands, then verifiers
//! - [`grading::score`]: Success-marker counting and compile-failure detection
//! - [`grading::lateness`]: Late-submission notes
//!
//! ## Safety ([`safety`])
//! - [`safety::workspace`]: Shared scratch directory with a checked purge
//! - [`safety::shutdown`]: SIGINT/SIGTERM handling at submission boundaries
//!
//! ## Operator ([`operator`])
//! - [`operator::terminal`]: Prompts on a terminal
//! - [`operator::scripted`]: Canned answers for unattended runs and tests
//!
//! ## Observability ([`observability`])
//! - [`observability::audit`]: JSON-lines batch event log
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: Grading configuration and error types
//! - [`config::loader`]: JSON file plus command-line overrides
//! - [`config::validator`]: Startup checks
//!
//! [`batch`] wires these together and [`report`] renders the result.

// Submission ingestion
pub mod submission;

// Execution Control
pub mod exec;

// Compilation and scoring
pub mod grading;

// Safety & Cleanup
pub mod safety;

// Human interaction points
pub mod operator;

// Observability
pub mod observability;

// Configuration
pub mod config;

// Batch driver and report
pub mod batch;
pub mod report;

// CLI
pub mod cli;

// Re-exports for convenience
pub use batch::{run_batch, BatchOutcome};
pub use config::types::{GradeError, GradingConfig, ProblemSet, Result};
pub use exec::{ProcessRunner, TimedRun};
pub use submission::{ArchiveIdentity, StyleScore, SubmissionRecord};
