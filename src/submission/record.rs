use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Manual style score entered during review
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StyleScore {
    #[default]
    NotGraded,
    Graded(String),
}

impl fmt::Display for StyleScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StyleScore::NotGraded => f.pad("N/A"),
            StyleScore::Graded(score) => f.pad(score),
        }
    }
}

/// Everything accumulated about one student's submission during a batch.
///
/// The handle, directory, and submission time are fixed at construction.
/// Notes are append-only and keep insertion order; repeated notes are kept
/// because two identical timeouts are two distinct events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    handle: String,
    dir: PathBuf,
    submitted_at: NaiveDateTime,
    score: u32,
    style: StyleScore,
    notes: Vec<String>,
}

impl SubmissionRecord {
    pub fn new(handle: impl Into<String>, dir: PathBuf, submitted_at: NaiveDateTime) -> Self {
        Self {
            handle: handle.into(),
            dir,
            submitted_at,
            score: 0,
            style: StyleScore::NotGraded,
            notes: Vec::new(),
        }
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Directory the submission's files were extracted into
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn submitted_at(&self) -> NaiveDateTime {
        self.submitted_at
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn set_score(&mut self, score: u32) {
        self.score = score;
    }

    pub fn style(&self) -> &StyleScore {
        &self.style
    }

    pub fn set_style(&mut self, style: StyleScore) {
        self.style = style;
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn add_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

/// Sort records by student handle. Stable, so equal handles keep input order.
pub fn sort_by_handle(records: &mut [SubmissionRecord]) {
    records.sort_by(|a, b| a.handle.cmp(&b.handle));
}
