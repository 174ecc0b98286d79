//! Submission ingestion
//!
//! Archive naming, archive reading, extraction of required files, and the
//! per-student record that accumulates results.

pub mod archive;
pub mod extract;
pub mod identity;
pub mod record;

pub use extract::extract_submission;
pub use identity::ArchiveIdentity;
pub use record::{StyleScore, SubmissionRecord};
