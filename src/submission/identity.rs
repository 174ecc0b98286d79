use crate::config::types::{GradeError, Result};
use chrono::{DateTime, Local, NaiveDateTime};
use std::path::Path;

/// Identity encoded in a submission archive name:
/// `<assignment>.<section>.<student>.<epochSeconds>.<ext>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveIdentity {
    assignment: String,
    section: String,
    student: String,
    submitted_epoch: i64,
}

impl ArchiveIdentity {
    /// Parse an archive file name (a leading directory is ignored)
    pub fn parse(file_name: &str) -> Result<Self> {
        let name = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(file_name);

        let format_error = |reason: String| GradeError::ArchiveFormat {
            file: name.to_string(),
            reason,
        };

        let fields: Vec<&str> = name.split('.').collect();
        let [assignment, section, student, epoch, _ext] = fields.as_slice() else {
            return Err(format_error(format!(
                "expected 5 dot-separated fields, found {}",
                fields.len()
            )));
        };

        if let Some(empty) = [("assignment", assignment), ("section", section), ("student", student)]
            .iter()
            .find(|(_, value)| value.is_empty())
        {
            return Err(format_error(format!("{} field is empty", empty.0)));
        }

        let submitted_epoch = epoch
            .parse::<i64>()
            .map_err(|_| format_error(format!("submission time '{}' is not an integer", epoch)))?;

        Ok(Self {
            assignment: assignment.to_string(),
            section: section.to_string(),
            student: student.to_string(),
            submitted_epoch,
        })
    }

    pub fn assignment(&self) -> &str {
        &self.assignment
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn student(&self) -> &str {
        &self.student
    }

    pub fn submitted_epoch(&self) -> i64 {
        self.submitted_epoch
    }

    /// Canonical per-submission directory: `assignment_section_student`
    pub fn dir_name(&self) -> String {
        format!("{}_{}_{}", self.assignment, self.section, self.student)
    }

    /// Submission time in local wall-clock terms, comparable with the due date
    pub fn submitted_at(&self) -> Result<NaiveDateTime> {
        DateTime::from_timestamp(self.submitted_epoch, 0)
            .map(|utc| utc.with_timezone(&Local).naive_local())
            .ok_or_else(|| GradeError::ArchiveFormat {
                file: self.dir_name(),
                reason: format!("submission time {} is out of range", self.submitted_epoch),
            })
    }
}
