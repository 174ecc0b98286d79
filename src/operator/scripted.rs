use crate::config::types::Result;
use crate::operator::{ManualReviewer, MissingPathResolver, PathResolution, Review};
use crate::submission::record::SubmissionRecord;
use std::collections::VecDeque;

/// Operator that answers from prepared queues.
///
/// An exhausted queue answers `Skip` for missing files and an empty review,
/// which makes `ScriptedOperator::default()` the non-interactive operator.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    resolutions: VecDeque<PathResolution>,
    reviews: VecDeque<Review>,
    asked: Vec<String>,
}

impl ScriptedOperator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolution(mut self, resolution: PathResolution) -> Self {
        self.resolutions.push_back(resolution);
        self
    }

    pub fn with_review(mut self, review: Review) -> Self {
        self.reviews.push_back(review);
        self
    }

    /// Expected paths this operator was asked about, in order
    pub fn asked(&self) -> &[String] {
        &self.asked
    }
}

impl MissingPathResolver for ScriptedOperator {
    fn resolve_missing(
        &mut self,
        archive: &str,
        expected: &str,
        _listing: &[String],
    ) -> Result<PathResolution> {
        log::debug!("scripted resolution requested for {} in {}", expected, archive);
        self.asked.push(expected.to_string());
        Ok(self.resolutions.pop_front().unwrap_or(PathResolution::Skip))
    }
}

impl ManualReviewer for ScriptedOperator {
    fn review(&mut self, _record: &SubmissionRecord) -> Result<Review> {
        Ok(self.reviews.pop_front().unwrap_or_default())
    }
}
