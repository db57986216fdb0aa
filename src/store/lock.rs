use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::error::{Result, UpgradeError};
use crate::store::LOCK_FILE;

/// Exclusive hold on a repository for the length of an upgrade.
/// The lock is released when the guard is dropped.
#[derive(Debug)]
pub struct RepoLock {
    file: File,
}

/// Acquire the repository lock, failing fast if another process holds it.
pub fn acquire_repo_lock(repo_root: &Path) -> Result<RepoLock> {
    let path = repo_root.join(LOCK_FILE);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(|e| UpgradeError::io(&path, e))?;

    file.try_lock_exclusive()
        .map_err(|_| UpgradeError::Locked(path.display().to_string()))?;

    Ok(RepoLock { file })
}

impl RepoLock {
    /// Release explicitly (normally handled by Drop).
    pub fn release(self) -> Result<()> {
        FileExt::unlock(&self.file).map_err(|e| UpgradeError::io(LOCK_FILE, e))
    }
}
