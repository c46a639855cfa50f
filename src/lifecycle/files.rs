use std::fs;
use std::path::{Path, PathBuf};

use log::warn;

use crate::core::Result;
use crate::lifecycle::handling::SubmissionId;
use crate::lifecycle::CleanupIssue;

/// Keeps the raw submission payloads on disk, one file per submission.
///
/// The payloads are write-once; they only ever leave the store through a
/// full [`clear`](SubmissionStore::clear).
pub struct SubmissionStore {
    root: PathBuf,
}

impl SubmissionStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn path_for(&self, submission: SubmissionId) -> PathBuf {
        self.root.join(format!("{submission}.xml"))
    }

    pub fn store(&self, submission: SubmissionId, payload: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(submission);
        fs::write(&path, payload)?;
        Ok(path)
    }

    pub fn read(&self, submission: SubmissionId) -> Result<Vec<u8>> {
        Ok(fs::read(self.path_for(submission))?)
    }

    /// Best-effort removal of every stored payload. Entries that are not
    /// regular writable files are left in place and reported as issues.
    pub fn clear(&self, issues: &mut Vec<CleanupIssue>) {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("could not list submission dir {}: {err}", self.root.display());
                issues.push(CleanupIssue::new(self.root.display().to_string(), err.to_string()));
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let removable = entry
                .metadata()
                .map(|meta| meta.is_file() && !meta.permissions().readonly())
                .unwrap_or(false);
            if !removable {
                warn!("skipping {}: not a regular writable file", path.display());
                issues.push(CleanupIssue::new(
                    path.display().to_string(),
                    "not a regular writable file",
                ));
                continue;
            }
            if let Err(err) = fs::remove_file(&path) {
                warn!("could not remove {}: {err}", path.display());
                issues.push(CleanupIssue::new(path.display().to_string(), err.to_string()));
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
