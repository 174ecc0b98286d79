/// Batch event log for labgrade
/// Every grading decision that affects a student's result is written as one
/// JSON line to an append-only file and echoed to stdout for the operator.
use crate::config::types::{GradeError, Result};
use chrono::Local;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use uuid::Uuid;

/// Event severity, used for the diagnostic log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSeverity {
    Error,
    Warning,
    Info,
}

/// Types of batch events we track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchEventType {
    // Lifecycle
    BatchStart,
    BatchEnd,
    BatchInterrupted,

    // Ingestion
    ExtractionStarted,
    SubmissionsFound,
    ArchiveSkipped,
    ArchiveSuperseded,
    SubmissionExtracted,
    FileSubstituted,
    MissingFile,

    // Grading
    CompileStarted,
    VerifyStarted,
    CompileFailed,
    VerifierTimeout,
    SubmissionGraded,
    LateSubmission,

    // Workspace
    WorkspacePrepared,
    WorkspacePurged,

    // Output
    ReviewBegun,
    ReviewStarted,
    ReportWritten,
}

impl BatchEventType {
    pub fn default_severity(&self) -> EventSeverity {
        match self {
            BatchEventType::ArchiveSkipped | BatchEventType::BatchInterrupted => {
                EventSeverity::Error
            }
            BatchEventType::ArchiveSuperseded
            | BatchEventType::MissingFile
            | BatchEventType::CompileFailed
            | BatchEventType::VerifierTimeout
            | BatchEventType::LateSubmission => EventSeverity::Warning,
            _ => EventSeverity::Info,
        }
    }
}

/// One batch log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEvent {
    pub event_type: BatchEventType,
    pub severity: EventSeverity,
    pub details: String,
    pub handle: Option<String>,
    pub archive: Option<String>,
}

impl BatchEvent {
    pub fn new(event_type: BatchEventType, details: String) -> Self {
        Self {
            severity: event_type.default_severity(),
            event_type,
            details,
            handle: None,
            archive: None,
        }
    }

    pub fn with_handle(mut self, handle: &str) -> Self {
        self.handle = Some(handle.to_string());
        self
    }

    pub fn with_archive(mut self, archive: &str) -> Self {
        self.archive = Some(archive.to_string());
        self
    }
}

/// Writes batch events to the log file and echoes them to stdout
pub struct BatchLogger {
    log_file: Mutex<File>,
    log_path: PathBuf,
    batch_id: String,
    echo: bool,
}

impl BatchLogger {
    pub fn new(log_path: &Path, echo: bool) -> Result<Self> {
        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                GradeError::Config(format!("Failed to create batch log directory: {}", e))
            })?;
        }

        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .map_err(|e| {
                GradeError::Config(format!(
                    "Failed to open batch log {}: {}",
                    log_path.display(),
                    e
                ))
            })?;

        Ok(Self {
            log_file: Mutex::new(log_file),
            log_path: log_path.to_path_buf(),
            batch_id: Uuid::new_v4().to_string(),
            echo,
        })
    }

    pub fn log_event(&self, event: BatchEvent) {
        let entry = serde_json::json!({
            "timestamp": Local::now().to_rfc3339(),
            "batch_id": self.batch_id,
            "event_type": event.event_type,
            "severity": event.severity,
            "handle": event.handle,
            "archive": event.archive,
            "details": event.details,
        });

        if self.echo {
            println!("{}", human_line(&event));
        }
        log_to_facade(&event);

        match self.log_file.lock() {
            Ok(mut file) => {
                if let Err(e) = writeln!(file, "{}", entry) {
                    error!("Failed to write to batch log: {}", e);
                }
                if let Err(e) = file.flush() {
                    error!("Failed to flush batch log: {}", e);
                }
            }
            Err(_) => error!("Failed to acquire lock on batch log file"),
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }
}

fn human_line(event: &BatchEvent) -> String {
    match (&event.handle, &event.archive) {
        (Some(handle), _) => format!("[{:?}] {}: {}", event.event_type, handle, event.details),
        (None, Some(archive)) => {
            format!("[{:?}] {}: {}", event.event_type, archive, event.details)
        }
        (None, None) => format!("[{:?}] {}", event.event_type, event.details),
    }
}

fn log_to_facade(event: &BatchEvent) {
    match event.severity {
        EventSeverity::Error => error!("{}", human_line(event)),
        EventSeverity::Warning => warn!("{}", human_line(event)),
        EventSeverity::Info => info!("{}", human_line(event)),
    }
}

/// Global batch logger instance
static BATCH_LOGGER: OnceLock<BatchLogger> = OnceLock::new();

/// Initialize the global batch logger. A second call keeps the first logger.
pub fn init_batch_logger(log_path: &Path, echo: bool) -> Result<()> {
    let logger = BatchLogger::new(log_path, echo)?;
    let batch_id = logger.batch_id().to_string();
    if BATCH_LOGGER.set(logger).is_err() {
        warn!("Batch logger already initialized");
    } else {
        info!("Batch log {} opened for batch {}", log_path.display(), batch_id);
    }
    Ok(())
}

/// Log a batch event using the global logger
pub fn log_event(event: BatchEvent) {
    match BATCH_LOGGER.get() {
        Some(logger) => logger.log_event(event),
        None => log_to_facade(&event),
    }
}

/// Convenience functions for common batch events
pub mod events {
    use super::*;

    pub fn batch_start(archive_count: usize, lab_path: &Path) {
        log_event(BatchEvent::new(
            BatchEventType::BatchStart,
            format!(
                "Grading {} archive(s) against {}",
                archive_count,
                lab_path.display()
            ),
        ));
    }

    pub fn batch_end(graded: usize, skipped: usize) {
        log_event(BatchEvent::new(
            BatchEventType::BatchEnd,
            format!("Graded {} submission(s), skipped {} archive(s)", graded, skipped),
        ));
    }

    pub fn batch_interrupted(remaining: usize) {
        log_event(BatchEvent::new(
            BatchEventType::BatchInterrupted,
            format!("Shutdown requested; {} submission(s) left ungraded", remaining),
        ));
    }

    pub fn extraction_started(archive_count: usize) {
        log_event(BatchEvent::new(
            BatchEventType::ExtractionStarted,
            format!("Extracting submission files from {} archive(s)", archive_count),
        ));
    }

    pub fn submissions_found(count: usize) {
        log_event(BatchEvent::new(
            BatchEventType::SubmissionsFound,
            format!("Found {} submission(s)", count),
        ));
    }

    pub fn archive_skipped(archive: &str, reason: &str) {
        log_event(
            BatchEvent::new(BatchEventType::ArchiveSkipped, reason.to_string())
                .with_archive(archive),
        );
    }

    pub fn archive_superseded(archive: &str, handle: &str, kept: &str) {
        log_event(
            BatchEvent::new(
                BatchEventType::ArchiveSuperseded,
                format!("Superseded by later submission {}", kept),
            )
            .with_handle(handle)
            .with_archive(archive),
        );
    }

    pub fn submission_extracted(handle: &str, dir: &Path) {
        log_event(
            BatchEvent::new(
                BatchEventType::SubmissionExtracted,
                format!("Extracted to {}", dir.display()),
            )
            .with_handle(handle),
        );
    }

    pub fn file_substituted(archive: &str, expected: &str, substitute: &str) {
        log_event(
            BatchEvent::new(
                BatchEventType::FileSubstituted,
                format!("{} taken from {}", expected, substitute),
            )
            .with_archive(archive),
        );
    }

    pub fn missing_file(archive: &str, expected: &str) {
        log_event(
            BatchEvent::new(BatchEventType::MissingFile, format!("{} not found", expected))
                .with_archive(archive),
        );
    }

    pub fn compile_started(handle: &str) {
        log_event(
            BatchEvent::new(BatchEventType::CompileStarted, "Compiling submission".to_string())
                .with_handle(handle),
        );
    }

    pub fn verify_started(handle: &str) {
        log_event(
            BatchEvent::new(BatchEventType::VerifyStarted, "Grading submission".to_string())
                .with_handle(handle),
        );
    }

    pub fn compile_failed(handle: &str, command: &str, exit_code: Option<i32>) {
        let status = exit_code
            .map(|code| format!("exit {}", code))
            .unwrap_or_else(|| "no exit status".to_string());
        log_event(
            BatchEvent::new(
                BatchEventType::CompileFailed,
                format!("'{}' failed ({})", command, status),
            )
            .with_handle(handle),
        );
    }

    pub fn verifier_timeout(handle: &str, command: &str, limit_secs: u64) {
        log_event(
            BatchEvent::new(
                BatchEventType::VerifierTimeout,
                format!("'{}' killed after {}s", command, limit_secs),
            )
            .with_handle(handle),
        );
    }

    pub fn submission_graded(handle: &str, score: u32) {
        log_event(
            BatchEvent::new(BatchEventType::SubmissionGraded, format!("score={}", score))
                .with_handle(handle),
        );
    }

    pub fn late_submission(handle: &str, note: &str) {
        log_event(BatchEvent::new(BatchEventType::LateSubmission, note.to_string()).with_handle(handle));
    }

    pub fn workspace_prepared(path: &Path, common_files: usize) {
        log_event(BatchEvent::new(
            BatchEventType::WorkspacePrepared,
            format!("{} seeded with {} common file(s)", path.display(), common_files),
        ));
    }

    pub fn workspace_purged(path: &Path, removed: usize) {
        log_event(BatchEvent::new(
            BatchEventType::WorkspacePurged,
            format!("{}: removed {} entr(ies)", path.display(), removed),
        ));
    }

    pub fn review_begun(count: usize) {
        log_event(BatchEvent::new(
            BatchEventType::ReviewBegun,
            format!("Beginning code review of {} submission(s)", count),
        ));
    }

    pub fn review_started(handle: &str) {
        log_event(
            BatchEvent::new(BatchEventType::ReviewStarted, "Manual review".to_string())
                .with_handle(handle),
        );
    }

    pub fn report_written(destination: &str, rows: usize) {
        log_event(BatchEvent::new(
            BatchEventType::ReportWritten,
            format!("{} row(s) written to {}", rows, destination),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_severity() {
        assert_eq!(
            BatchEventType::ArchiveSkipped.default_severity(),
            EventSeverity::Error
        );
        assert_eq!(
            BatchEventType::CompileFailed.default_severity(),
            EventSeverity::Warning
        );
        assert_eq!(
            BatchEventType::SubmissionGraded.default_severity(),
            EventSeverity::Info
        );
    }

    #[test]
    fn test_batch_logger_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("grades.log");

        let logger = BatchLogger::new(&path, false).unwrap();
        assert_eq!(logger.log_path(), path);
        logger.log_event(
            BatchEvent::new(BatchEventType::SubmissionGraded, "score=2".to_string())
                .with_handle("jdoe"),
        );
        logger.log_event(BatchEvent::new(
            BatchEventType::BatchEnd,
            "done".to_string(),
        ));

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event_type"], "SubmissionGraded");
        assert_eq!(lines[0]["handle"], "jdoe");
        assert_eq!(lines[0]["batch_id"], logger.batch_id());
        assert_eq!(lines[1]["handle"], serde_json::Value::Null);
    }

    #[test]
    fn test_batch_logger_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grades.log");
        std::fs::write(&path, "earlier batch\n").unwrap();

        let logger = BatchLogger::new(&path, false).unwrap();
        logger.log_event(BatchEvent::new(BatchEventType::BatchStart, "go".to_string()));

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("earlier batch\n"));
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn test_human_line_prefers_handle() {
        let event = BatchEvent::new(BatchEventType::MissingFile, "x".to_string())
            .with_archive("a.tgz")
            .with_handle("jdoe");
        assert_eq!(human_line(&event), "[MissingFile] jdoe: x");
    }
}
