/// Shared scratch directory for compiling and verifying submissions.
///
/// One directory is reused for the whole batch. It holds the lab's common
/// files plus, while a submission is being graded, that submission's files
/// and build products. After each submission everything but the common
/// files is removed and the manifest is checked, so nothing one student
/// produced is visible while the next is graded.
use crate::config::types::{GradeError, Result};
use crate::observability::audit::events;
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub struct Workspace {
    root: PathBuf,
    lab_path: PathBuf,
    common_files: BTreeSet<String>,
}

impl Workspace {
    pub fn new(root: PathBuf, lab_path: PathBuf, common_files: &[String]) -> Self {
        Self {
            root,
            lab_path,
            common_files: common_files.iter().cloned().collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Recreate the directory from scratch and seed the common files
    pub fn prepare(&self) -> Result<()> {
        if fs::symlink_metadata(&self.root).is_ok() {
            remove_entry(&self.root).map_err(|e| {
                workspace_error(format!("remove old workspace {}", self.root.display()), e)
            })?;
        }
        fs::create_dir_all(&self.root)
            .map_err(|e| workspace_error(format!("create {}", self.root.display()), e))?;

        self.seed_common_files()?;
        events::workspace_prepared(&self.root, self.common_files.len());
        Ok(())
    }

    /// Copy the contents of `submission_dir` into the workspace.
    /// Returns the number of files copied.
    pub fn stage(&self, submission_dir: &Path) -> Result<usize> {
        copy_tree(submission_dir, &self.root).map_err(|e| {
            workspace_error(format!("stage {}", submission_dir.display()), e)
        })
    }

    /// Remove everything that is not a common file, restore the common
    /// files from the lab and verify the result. Returns the number of
    /// top-level entries removed.
    pub fn purge(&self) -> Result<usize> {
        let read_dir = fs::read_dir(&self.root)
            .map_err(|e| workspace_error(format!("list {}", self.root.display()), e))?;

        // A non-UTF-8 name is never a common file
        let mut doomed = Vec::new();
        for entry in read_dir {
            let entry =
                entry.map_err(|e| workspace_error(format!("list {}", self.root.display()), e))?;
            let common = entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.common_files.contains(name));
            if !common {
                doomed.push(entry.path());
            }
        }

        let removed = doomed.len();
        for path in doomed {
            remove_entry(&path)
                .map_err(|e| workspace_error(format!("remove {}", path.display()), e))?;
        }

        // A submission may have overwritten a helper file
        self.seed_common_files()?;
        self.verify()?;

        events::workspace_purged(&self.root, removed);
        Ok(removed)
    }

    /// Fail unless the top-level entries are exactly the common files
    pub fn verify(&self) -> Result<()> {
        let entries = self.entries()?;
        let expected: BTreeSet<OsString> = self.common_files.iter().map(OsString::from).collect();
        if entries == expected {
            return Ok(());
        }

        let extra: Vec<_> = entries.difference(&expected).cloned().collect();
        let missing: Vec<_> = expected.difference(&entries).cloned().collect();
        Err(GradeError::Workspace(format!(
            "{} does not match the common file set (unexpected: {:?}, missing: {:?})",
            self.root.display(),
            extra,
            missing
        )))
    }

    /// Names of the top-level entries, sorted
    pub fn entries(&self) -> Result<BTreeSet<OsString>> {
        let read_dir = fs::read_dir(&self.root)
            .map_err(|e| workspace_error(format!("list {}", self.root.display()), e))?;

        let mut names = BTreeSet::new();
        for entry in read_dir {
            let entry =
                entry.map_err(|e| workspace_error(format!("list {}", self.root.display()), e))?;
            names.insert(entry.file_name());
        }
        Ok(names)
    }

    fn seed_common_files(&self) -> Result<()> {
        for name in &self.common_files {
            let src = self.lab_path.join(name);
            let dest = self.root.join(name);
            if !src.is_file() {
                return Err(GradeError::Workspace(format!(
                    "Common file {} is missing",
                    src.display()
                )));
            }
            if fs::symlink_metadata(&dest).is_ok() {
                remove_entry(&dest)
                    .map_err(|e| workspace_error(format!("replace {}", dest.display()), e))?;
            }
            fs::copy(&src, &dest).map_err(|e| {
                workspace_error(format!("copy {} to {}", src.display(), dest.display()), e)
            })?;
        }
        Ok(())
    }
}

fn workspace_error(action: String, err: io::Error) -> GradeError {
    GradeError::Workspace(format!("Failed to {}: {}", action, err))
}

/// Remove a file, symlink (not its target) or directory tree
fn remove_entry(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        grant_owner_access(path)?;
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Give the owner rwx on `dir` and every directory below it.
/// A build can leave directories at 0500 or 000, which blocks removal.
fn grant_owner_access(dir: &Path) -> io::Result<()> {
    let mode = fs::symlink_metadata(dir)?.permissions().mode();
    if mode & 0o700 != 0o700 {
        fs::set_permissions(dir, fs::Permissions::from_mode(mode | 0o700))?;
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            grant_owner_access(&entry.path())?;
        }
    }
    Ok(())
}

fn copy_tree(src: &Path, dest: &Path) -> io::Result<usize> {
    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let target = dest.join(entry.file_name());

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
            copied += copy_tree(&entry.path(), &target)?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        } else {
            log::warn!("not staging special file {}", entry.path().display());
        }
    }
    Ok(copied)
}
