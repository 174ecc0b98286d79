/// Read-only view of a gzip-compressed submission tarball
use crate::config::types::{GradeError, Result};
use flate2::read::GzDecoder;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};

struct StoredFile {
    mode: u32,
    bytes: Vec<u8>,
}

/// All regular files of one archive, indexed by normalized relative path.
///
/// Tar is a sequential format, so the archive is read once up front; this
/// lets the extractor look entries up in any order and show the operator a
/// full listing when a required file is missing.
pub struct SubmissionArchive {
    name: String,
    listing: Vec<String>,
    files: BTreeMap<String, StoredFile>,
}

impl SubmissionArchive {
    pub fn open(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let archive_error = |reason: String| GradeError::Archive {
            file: name.clone(),
            reason,
        };

        let file = File::open(path).map_err(|e| archive_error(format!("open: {}", e)))?;
        let mut tar = tar::Archive::new(GzDecoder::new(file));
        let entries = tar
            .entries()
            .map_err(|e| archive_error(format!("read tar entries: {}", e)))?;

        let mut listing = Vec::new();
        let mut files = BTreeMap::new();
        for entry in entries {
            let mut entry = entry.map_err(|e| archive_error(format!("read tar entry: {}", e)))?;
            let raw = entry
                .path()
                .map_err(|e| archive_error(format!("read tar entry path: {}", e)))?
                .into_owned();
            listing.push(raw.to_string_lossy().to_string());

            if !entry.header().entry_type().is_file() {
                continue;
            }
            let Some(key) = normalize_entry_path(&raw) else {
                log::warn!("{}: ignoring unsafe entry path {}", name, raw.display());
                continue;
            };

            let mode = entry.header().mode().unwrap_or(0o644);
            let mut bytes = Vec::new();
            entry
                .read_to_end(&mut bytes)
                .map_err(|e| archive_error(format!("read {}: {}", key, e)))?;
            files.insert(key, StoredFile { mode, bytes });
        }

        Ok(Self {
            name,
            listing,
            files,
        })
    }

    /// Archive file name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every entry path as stored, in archive order
    pub fn listing(&self) -> &[String] {
        &self.listing
    }

    pub fn contains(&self, entry: &str) -> bool {
        normalize_entry_path(Path::new(entry))
            .map(|key| self.files.contains_key(&key))
            .unwrap_or(false)
    }

    /// Write `entry` to `dest`, creating parent directories.
    /// Returns `false` when the archive has no such regular file.
    pub fn extract_to(&self, entry: &str, dest: &Path) -> Result<bool> {
        let Some(stored) = normalize_entry_path(Path::new(entry)).and_then(|key| self.files.get(&key))
        else {
            return Ok(false);
        };

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dest, &stored.bytes)?;
        fs::set_permissions(dest, fs::Permissions::from_mode(stored.mode & 0o777))?;
        Ok(true)
    }
}

/// Strip `./` prefixes; reject absolute paths and `..`
fn normalize_entry_path(path: &Path) -> Option<String> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        return None;
    }
    clean.to_str().map(str::to_string)
}
