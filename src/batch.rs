/// One grading batch: every archive in a directory, end to end.
///
/// Order of work: identify and extract all archives, then grade each
/// submission in handle order through the shared workspace, then mark late
/// submissions, run manual review, and write the report.
use crate::config::types::{GradeError, GradingConfig, Result};
use crate::exec::ProcessRunner;
use crate::grading::lateness::mark_late;
use crate::grading::{Grader, GradingPlan};
use crate::observability::audit::events;
use crate::operator::Operator;
use crate::report;
use crate::safety::shutdown::StopCheck;
use crate::safety::workspace::Workspace;
use crate::submission::record::sort_by_handle;
use crate::submission::{extract_submission, ArchiveIdentity, SubmissionRecord};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// What a finished (or interrupted) batch produced
#[derive(Debug)]
pub struct BatchOutcome {
    /// Graded records, sorted by handle
    pub records: Vec<SubmissionRecord>,
    /// Archives that were not graded, with the reason
    pub skipped: Vec<(String, String)>,
    /// A shutdown request stopped grading early
    pub interrupted: bool,
}

/// Files in `dir` ending in `.{extension}`, sorted by name
pub fn discover_archives(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let suffix = format!(".{}", extension);
    let mut archives = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if entry.file_type()?.is_file() && name.to_string_lossy().ends_with(&suffix) {
            archives.push(entry.path());
        }
    }
    archives.sort();
    Ok(archives)
}

/// Keep one archive per student handle: the latest submission epoch wins,
/// the earlier name wins a tie. Returns (kept, superseded).
pub fn select_latest(
    candidates: Vec<(PathBuf, ArchiveIdentity)>,
) -> (Vec<(PathBuf, ArchiveIdentity)>, Vec<(PathBuf, ArchiveIdentity)>) {
    let mut latest: BTreeMap<String, (PathBuf, ArchiveIdentity)> = BTreeMap::new();
    let mut superseded = Vec::new();

    for (path, identity) in candidates {
        let keep_current = latest
            .get(identity.student())
            .is_some_and(|(_, current)| current.submitted_epoch() >= identity.submitted_epoch());
        if keep_current {
            superseded.push((path, identity));
        } else if let Some(previous) =
            latest.insert(identity.student().to_string(), (path, identity))
        {
            superseded.push(previous);
        }
    }

    (latest.into_values().collect(), superseded)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Run a full batch as described by `config`.
///
/// Per-archive problems (bad names, unreadable archives) skip the archive.
/// Anything else, such as a workspace that cannot be purged, aborts.
pub fn run_batch(
    config: &GradingConfig,
    runner: ProcessRunner,
    operator: &mut dyn Operator,
    stop: &dyn StopCheck,
) -> Result<BatchOutcome> {
    // Commands run inside the workspace, so lab paths must not be relative
    let mut config = config.clone();
    config.lab_path = fs::canonicalize(&config.lab_path).map_err(|e| {
        GradeError::Config(format!(
            "Lab path {} is not accessible: {}",
            config.lab_path.display(),
            e
        ))
    })?;

    let archives = discover_archives(&config.archive_dir, &config.archive_extension)?;
    events::batch_start(archives.len(), &config.lab_path);

    let mut skipped = Vec::new();
    let mut candidates = Vec::new();
    for path in archives {
        let label = file_label(&path);
        match ArchiveIdentity::parse(&label) {
            Ok(identity) => candidates.push((path, identity)),
            Err(e) if e.is_per_archive() => {
                events::archive_skipped(&label, &e.to_string());
                skipped.push((label, e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    let (selected, superseded) = select_latest(candidates);
    for (path, identity) in superseded {
        let kept = selected
            .iter()
            .find(|(_, kept)| kept.student() == identity.student())
            .map(|(kept_path, _)| file_label(kept_path))
            .unwrap_or_default();
        let label = file_label(&path);
        events::archive_superseded(&label, identity.student(), &kept);
        skipped.push((label, format!("superseded by {}", kept)));
    }

    events::extraction_started(selected.len());
    let mut records = Vec::new();
    for (path, identity) in &selected {
        match extract_submission(path, identity, &config.extract_dir, &config.source_files, operator) {
            Ok(record) => records.push(record),
            Err(e) if e.is_per_archive() => {
                let label = file_label(path);
                events::archive_skipped(&label, &e.to_string());
                skipped.push((label, e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }
    sort_by_handle(&mut records);
    events::submissions_found(records.len());

    let workspace = Workspace::new(
        config.workspace_dir.clone(),
        config.lab_path.clone(),
        &config.common_files,
    );
    workspace.prepare()?;

    let grader = Grader::new(runner, GradingPlan::from_config(&config));
    let mut interrupted = false;
    let mut graded = 0;
    for record in records.iter_mut() {
        if stop.should_stop() {
            interrupted = true;
            break;
        }

        workspace.stage(record.dir())?;
        let graded_result = grader.grade(record, workspace.root());
        // Purge even when grading failed; a dirty workspace is the worse error
        workspace.purge()?;
        graded_result?;
        graded += 1;
    }

    if interrupted {
        events::batch_interrupted(records.len() - graded);
        records.truncate(graded);
    }

    mark_late(&mut records, config.due);

    if !interrupted {
        events::review_begun(records.len());
        for record in records.iter_mut() {
            if stop.should_stop() {
                interrupted = true;
                break;
            }
            events::review_started(record.handle());
            operator.review(record)?.apply(record);
        }
    }

    report::write_report(&mut records, config.report_file.as_deref())?;
    events::batch_end(records.len(), skipped.len());

    Ok(BatchOutcome {
        records,
        skipped,
        interrupted,
    })
}
