//! Operator interaction points
//!
//! The pipeline pauses for a human twice: when a required file is missing
//! from an archive, and for manual style review. Both are traits so the core
//! runs unchanged from a terminal, a script, or a test.

pub mod scripted;
pub mod terminal;

use crate::config::types::Result;
use crate::submission::record::{StyleScore, SubmissionRecord};

pub use scripted::ScriptedOperator;
pub use terminal::TerminalOperator;

/// Operator answer for a required file that is not in the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathResolution {
    /// Extract this in-archive path and place it where the missing file belongs
    Substitute(String),
    /// Give up on the file; the gap is recorded as a note
    Skip,
}

/// Resolve a required file that was not found at its expected archive path
pub trait MissingPathResolver {
    fn resolve_missing(
        &mut self,
        archive: &str,
        expected: &str,
        listing: &[String],
    ) -> Result<PathResolution>;
}

/// Manual scores and comments collected for one submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Review {
    pub style: StyleScore,
    pub notes: Vec<String>,
}

impl Review {
    /// Record the review on the submission, appending notes in order
    pub fn apply(self, record: &mut SubmissionRecord) {
        record.set_style(self.style);
        for note in self.notes {
            record.add_note(note);
        }
    }
}

/// Collect manual style scores and freeform notes
pub trait ManualReviewer {
    fn review(&mut self, record: &SubmissionRecord) -> Result<Review>;
}

/// Both interaction points, as the batch driver needs them
pub trait Operator: MissingPathResolver + ManualReviewer {}

impl<T: MissingPathResolver + ManualReviewer> Operator for T {}
