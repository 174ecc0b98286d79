use crate::config::types::Result;
use crate::observability::audit::events;
use crate::operator::{MissingPathResolver, PathResolution};
use crate::submission::archive::SubmissionArchive;
use crate::submission::identity::ArchiveIdentity;
use crate::submission::record::SubmissionRecord;
use std::fs;
use std::path::Path;

/// Extract the required files of one archive into `root/<dir_name>`.
///
/// Each required path is looked up as `<dir_name>/<path>`. A missing file is
/// handed to `resolver`, which either names a substitute entry (placed at
/// the expected location) or skips it, in which case the gap becomes a
/// `Missing File` note. A required file is never dropped silently.
pub fn extract_submission<R>(
    archive_path: &Path,
    identity: &ArchiveIdentity,
    root: &Path,
    required: &[String],
    resolver: &mut R,
) -> Result<SubmissionRecord>
where
    R: MissingPathResolver + ?Sized,
{
    let archive = SubmissionArchive::open(archive_path)?;
    let dir_name = identity.dir_name();
    let submission_dir = root.join(&dir_name);

    // Stale files from an earlier run would otherwise be staged and graded.
    if submission_dir.exists() {
        fs::remove_dir_all(&submission_dir)?;
    }
    fs::create_dir_all(&submission_dir)?;

    let mut record = SubmissionRecord::new(
        identity.student(),
        submission_dir.clone(),
        identity.submitted_at()?,
    );

    for source in required {
        let expected = format!("{}/{}", dir_name, source);
        let dest = submission_dir.join(source);

        if archive.extract_to(&expected, &dest)? {
            continue;
        }

        loop {
            match resolver.resolve_missing(archive.name(), &expected, archive.listing())? {
                PathResolution::Substitute(entry) => {
                    if archive.extract_to(&entry, &dest)? {
                        events::file_substituted(archive.name(), &expected, &entry);
                        break;
                    }
                    log::warn!("{}: '{}' is not in the archive either", archive.name(), entry);
                }
                PathResolution::Skip => {
                    events::missing_file(archive.name(), &expected);
                    record.add_note(format!("Missing File: {}", source));
                    break;
                }
            }
        }
    }

    events::submission_extracted(record.handle(), record.dir());
    Ok(record)
}
