/// Core types and structures for the labgrade system
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Due dates are written the way instructors post them: `01/30/2016 23:30`
pub const DUE_FORMAT: &str = "%m/%d/%Y %H:%M";

/// Batch grading configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GradingConfig {
    /// Submission deadline (local time)
    #[serde(with = "due_format")]
    pub due: NaiveDateTime,
    /// Directory holding the provided lab files and gradescripts
    pub lab_path: PathBuf,
    /// Files extracted from every submission, relative to its directory
    pub source_files: Vec<String>,
    /// Shell command lines run, in order, to build a submission
    #[serde(default = "default_compile_commands")]
    pub compile_commands: Vec<String>,
    /// Lab-provided helper files kept in the workspace for every submission
    #[serde(default)]
    pub common_files: Vec<String>,
    /// Restrict grading to these problems (runs the per-problem verifier)
    #[serde(default)]
    pub problems: Option<ProblemSet>,
    /// Wall-clock budget for the aggregate verifier
    #[serde(default = "default_aggregate_timeout")]
    pub aggregate_timeout_secs: u64,
    /// Wall-clock budget for each per-problem verifier run
    #[serde(default = "default_problem_timeout")]
    pub problem_timeout_secs: u64,
    /// Wall-clock budget for each compile command
    #[serde(default = "default_compile_timeout")]
    pub compile_timeout_secs: u64,
    /// Where submission archives are discovered
    #[serde(default = "default_dot")]
    pub archive_dir: PathBuf,
    /// Archive file extension (without the dot)
    #[serde(default = "default_archive_extension")]
    pub archive_extension: String,
    /// Root under which per-submission directories are extracted
    #[serde(default = "default_dot")]
    pub extract_dir: PathBuf,
    /// Shared scratch directory reused by every submission
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,
    /// Append-only batch event log
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    /// Report destination, stdout when absent
    #[serde(default)]
    pub report_file: Option<PathBuf>,
    /// Aggregate verifier name inside `lab_path`
    #[serde(default = "default_aggregate_verifier")]
    pub aggregate_verifier: String,
    /// Per-problem verifier name inside `lab_path`
    #[serde(default = "default_problem_verifier")]
    pub problem_verifier: String,
    /// Prompt the operator for missing files and manual review
    #[serde(default = "default_true")]
    pub interactive: bool,
    /// Pager used to show submission files during review
    #[serde(default = "default_pager")]
    pub pager: String,
}

fn default_compile_commands() -> Vec<String> {
    vec!["make".to_string()]
}

fn default_aggregate_timeout() -> u64 {
    240
}

fn default_problem_timeout() -> u64 {
    30
}

fn default_compile_timeout() -> u64 {
    120
}

fn default_dot() -> PathBuf {
    PathBuf::from(".")
}

fn default_archive_extension() -> String {
    "tgz".to_string()
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("tmp")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("grades.log")
}

fn default_aggregate_verifier() -> String {
    "gradeall".to_string()
}

fn default_problem_verifier() -> String {
    "gradescript".to_string()
}

fn default_true() -> bool {
    true
}

fn default_pager() -> String {
    "less".to_string()
}

impl GradingConfig {
    /// Minimal configuration with every optional field at its default
    pub fn new(due: NaiveDateTime, lab_path: PathBuf, source_files: Vec<String>) -> Self {
        Self {
            due,
            lab_path,
            source_files,
            compile_commands: default_compile_commands(),
            common_files: Vec::new(),
            problems: None,
            aggregate_timeout_secs: default_aggregate_timeout(),
            problem_timeout_secs: default_problem_timeout(),
            compile_timeout_secs: default_compile_timeout(),
            archive_dir: default_dot(),
            archive_extension: default_archive_extension(),
            extract_dir: default_dot(),
            workspace_dir: default_workspace_dir(),
            log_file: default_log_file(),
            report_file: None,
            aggregate_verifier: default_aggregate_verifier(),
            problem_verifier: default_problem_verifier(),
            interactive: true,
            pager: default_pager(),
        }
    }

    pub fn aggregate_timeout(&self) -> Duration {
        Duration::from_secs(self.aggregate_timeout_secs)
    }

    pub fn problem_timeout(&self) -> Duration {
        Duration::from_secs(self.problem_timeout_secs)
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_secs)
    }

    pub fn aggregate_verifier_path(&self) -> PathBuf {
        self.lab_path.join(&self.aggregate_verifier)
    }

    pub fn problem_verifier_path(&self) -> PathBuf {
        self.lab_path.join(&self.problem_verifier)
    }
}

mod due_format {
    use super::DUE_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(due: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&due.format(DUE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, DUE_FORMAT).map_err(|e| {
            serde::de::Error::custom(format!(
                "due date '{}' does not match MM/DD/YYYY HH:MM: {}",
                raw, e
            ))
        })
    }
}

/// Ordered list of problem numbers to grade individually.
///
/// Accepts either a JSON integer list or a range string such as
/// `"1-5,15,17,20-25"`. Order is preserved exactly as written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProblemSetRepr", into = "Vec<u32>")]
pub struct ProblemSet(Vec<u32>);

#[derive(Deserialize)]
#[serde(untagged)]
enum ProblemSetRepr {
    Ranges(String),
    List(Vec<u32>),
}

impl ProblemSet {
    pub fn new(problems: Vec<u32>) -> Self {
        Self(problems)
    }

    /// Parse `"1-5,15,17,20-25"` into `[1, 2, 3, 4, 5, 15, 17, 20, ...]`
    pub fn parse(ranges: &str) -> Result<Self> {
        let mut problems = Vec::new();
        for token in ranges.split(',') {
            let token = token.trim();
            if token.is_empty() {
                return Err(GradeError::Config(format!(
                    "Empty entry in problem set '{}'",
                    ranges
                )));
            }

            match token.split_once('-') {
                Some((lo, hi)) => {
                    let lo = parse_problem_number(lo, ranges)?;
                    let hi = parse_problem_number(hi, ranges)?;
                    if lo > hi {
                        return Err(GradeError::Config(format!(
                            "Descending range {}-{} in problem set '{}'",
                            lo, hi, ranges
                        )));
                    }
                    problems.extend(lo..=hi);
                }
                None => problems.push(parse_problem_number(token, ranges)?),
            }
        }
        Ok(Self(problems))
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn parse_problem_number(raw: &str, ranges: &str) -> Result<u32> {
    raw.trim().parse::<u32>().map_err(|_| {
        GradeError::Config(format!(
            "Invalid problem number '{}' in problem set '{}'",
            raw.trim(),
            ranges
        ))
    })
}

impl TryFrom<ProblemSetRepr> for ProblemSet {
    type Error = GradeError;

    fn try_from(repr: ProblemSetRepr) -> Result<Self> {
        match repr {
            ProblemSetRepr::Ranges(s) => ProblemSet::parse(&s),
            ProblemSetRepr::List(list) => Ok(ProblemSet(list)),
        }
    }
}

impl From<ProblemSet> for Vec<u32> {
    fn from(set: ProblemSet) -> Self {
        set.0
    }
}

/// Custom error types for labgrade
#[derive(Error, Debug)]
pub enum GradeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed archive name {file}: {reason}")]
    ArchiveFormat { file: String, reason: String },

    #[error("Archive error in {file}: {reason}")]
    Archive { file: String, reason: String },

    #[error("Process error: {0}")]
    Process(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Report error: {0}")]
    Report(String),
}

impl GradeError {
    /// Errors confined to one archive; the batch skips it and moves on.
    pub fn is_per_archive(&self) -> bool {
        matches!(
            self,
            GradeError::ArchiveFormat { .. } | GradeError::Archive { .. }
        )
    }
}

impl From<nix::errno::Errno> for GradeError {
    fn from(err: nix::errno::Errno) -> Self {
        GradeError::Process(err.to_string())
    }
}

impl From<serde_json::Error> for GradeError {
    fn from(err: serde_json::Error) -> Self {
        GradeError::Config(err.to_string())
    }
}

/// Result type alias for labgrade operations
pub type Result<T> = std::result::Result<T, GradeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_set_ranges_preserve_order() {
        let set = ProblemSet::parse("1-3,15,17,20-22").unwrap();
        assert_eq!(set.as_slice(), &[1, 2, 3, 15, 17, 20, 21, 22]);

        let set = ProblemSet::parse("9, 2").unwrap();
        assert_eq!(set.as_slice(), &[9, 2]);
    }

    #[test]
    fn test_problem_set_rejects_garbage() {
        assert!(ProblemSet::parse("5-1").is_err());
        assert!(ProblemSet::parse("1,,2").is_err());
        assert!(ProblemSet::parse("one").is_err());
        assert!(ProblemSet::parse("-3").is_err());
    }

    #[test]
    fn test_problem_set_from_json_forms() {
        let from_str: ProblemSet = serde_json::from_str("\"4-6\"").unwrap();
        let from_list: ProblemSet = serde_json::from_str("[4, 5, 6]").unwrap();
        assert_eq!(from_str, from_list);
        assert!(serde_json::from_str::<ProblemSet>("\"6-4\"").is_err());
    }

    #[test]
    fn test_config_defaults_from_minimal_json() {
        let config: GradingConfig = serde_json::from_str(
            r#"{"due": "01/30/2016 23:30", "lab_path": "/labs/lab3", "source_files": ["main.c"]}"#,
        )
        .unwrap();

        assert_eq!(config.compile_commands, vec!["make".to_string()]);
        assert_eq!(config.aggregate_timeout(), Duration::from_secs(240));
        assert_eq!(config.problem_timeout(), Duration::from_secs(30));
        assert_eq!(config.compile_timeout(), Duration::from_secs(120));
        assert_eq!(config.workspace_dir, PathBuf::from("tmp"));
        assert!(config.problems.is_none());
        assert!(config.interactive);
        assert_eq!(
            config.aggregate_verifier_path(),
            PathBuf::from("/labs/lab3/gradeall")
        );
        assert_eq!(
            config.due.format(DUE_FORMAT).to_string(),
            "01/30/2016 23:30"
        );
    }

    #[test]
    fn test_bad_due_date_is_rejected() {
        let parsed = serde_json::from_str::<GradingConfig>(
            r#"{"due": "2016-01-30", "lab_path": "/labs", "source_files": []}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_per_archive_classification() {
        let format = GradeError::ArchiveFormat {
            file: "x.tgz".to_string(),
            reason: "bad".to_string(),
        };
        assert!(format.is_per_archive());
        assert!(!GradeError::Workspace("gone".to_string()).is_per_archive());
    }
}
