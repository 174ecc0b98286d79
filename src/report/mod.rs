//! Fixed-column text report of a graded batch

use crate::config::types::{GradeError, Result};
use crate::observability::audit::events;
use crate::submission::record::{sort_by_handle, SubmissionRecord};
use std::io::Write;
use std::path::Path;

/// Continuation lines start under the Notes column
const NOTES_INDENT: &str = "                     ";

/// One report row: handle, score, style, then notes, newline-terminated
pub fn render_row(record: &SubmissionRecord) -> String {
    format!(
        "{:<8} {:>5} {:>5} {}\n",
        record.handle(),
        record.score(),
        record.style(),
        record.notes().join(&format!("\n{}", NOTES_INDENT))
    )
}

pub fn render_header() -> String {
    format!("\n{:8} {:>5} {:>5} {}\n", "Netid", "#GSs", "Style", "Notes")
}

/// Sort `records` by handle (stable) and render the full report
pub fn render_report(records: &mut [SubmissionRecord]) -> String {
    sort_by_handle(records);
    let mut report = render_header();
    for record in records.iter() {
        report.push_str(&render_row(record));
    }
    report
}

/// Render and write the report to `destination`, or stdout when `None`
pub fn write_report(records: &mut [SubmissionRecord], destination: Option<&Path>) -> Result<()> {
    let report = render_report(records);

    let target = match destination {
        Some(path) => {
            std::fs::write(path, &report).map_err(|e| {
                GradeError::Report(format!("Failed to write {}: {}", path.display(), e))
            })?;
            path.display().to_string()
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(report.as_bytes())
                .and_then(|_| stdout.flush())
                .map_err(|e| GradeError::Report(format!("Failed to write report: {}", e)))?;
            "stdout".to_string()
        }
    };

    events::report_written(&target, records.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::record::StyleScore;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn record(handle: &str, score: u32) -> SubmissionRecord {
        let submitted = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let mut record = SubmissionRecord::new(handle, PathBuf::from(handle), submitted);
        record.set_score(score);
        record
    }

    #[test]
    fn test_header() {
        assert_eq!(render_header(), "\nNetid     #GSs Style Notes\n");
    }

    #[test]
    fn test_row_without_notes() {
        assert_eq!(render_row(&record("jdoe", 2)), "jdoe         2   N/A \n");
    }

    #[test]
    fn test_row_with_notes_and_style() {
        let mut r = record("asmith", 10);
        r.set_style(StyleScore::Graded("4".to_string()));
        r.add_note("Compilation Failed: make");
        r.add_note("Timed Out");
        assert_eq!(
            render_row(&r),
            "asmith      10     4 Compilation Failed: make\n                     Timed Out\n"
        );
    }

    #[test]
    fn test_report_sorted_by_handle() {
        let mut records = vec![record("zed", 1), record("amy", 3), record("bob", 0)];
        let report = render_report(&mut records);

        let handles: Vec<_> = report
            .lines()
            .skip(2)
            .map(|line| line.split_whitespace().next().unwrap())
            .collect();
        assert_eq!(handles, vec!["amy", "bob", "zed"]);
        assert_eq!(records[0].handle(), "amy");
    }

    #[test]
    fn test_write_report_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        let mut records = vec![record("jdoe", 2)];

        write_report(&mut records, Some(&path)).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "\nNetid     #GSs Style Notes\njdoe         2   N/A \n"
        );
    }
}
