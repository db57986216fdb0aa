use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Result, UpgradeError};
use crate::report::Reporter;
use crate::store::BACKUP_PREFIX;

/// Pick a fresh backup directory name under the repository root.
///
/// The directory is created and immediately removed: the name is ours, but the path must
/// not exist when it becomes a rename target.
pub fn reserve_backup_dir(repo_root: &Path) -> Result<PathBuf> {
    let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
    let nonce = Uuid::new_v4().simple().to_string();
    let backup = repo_root.join(format!("{BACKUP_PREFIX}{stamp}-{}", &nonce[..8]));

    fs::create_dir(&backup).map_err(|e| UpgradeError::io(&backup, e))?;
    fs::remove_dir(&backup).map_err(|e| UpgradeError::io(&backup, e))?;
    Ok(backup)
}

/// Move `original` aside to a backup and put the committed `staging` store in its place.
///
/// Returns the backup location, which is never removed by this tool. If the second rename
/// fails the original data is left at the backup and `SwapIncomplete` is returned; there
/// is no automatic rollback.
pub fn swap_into_place(
    repo_root: &Path,
    staging: &Path,
    original: &Path,
    reporter: &dyn Reporter,
) -> Result<PathBuf> {
    let backup = reserve_backup_dir(repo_root)?;

    reporter.note(&format!(
        "Renaming '{}' to '{}'",
        original.display(),
        backup.display()
    ));
    fs::rename(original, &backup).map_err(|e| UpgradeError::io(original, e))?;

    reporter.note(&format!(
        "Renaming '{}' to '{}'",
        staging.display(),
        original.display()
    ));
    if let Err(source) = fs::rename(staging, original) {
        log::error!(
            "second rename failed, original data left at {}",
            backup.display()
        );
        return Err(UpgradeError::SwapIncomplete {
            original: original.to_path_buf(),
            backup,
            staging: staging.to_path_buf(),
            source,
        });
    }

    reporter.note("Success");
    reporter.banner(&[
        "AFTER YOU VERIFY THAT YOUR DATASTORE IS WORKING".to_string(),
        format!("REMOVE '{}'", backup.display()),
    ]);

    Ok(backup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Transcript;
    use tempfile::tempdir;

    fn dir_with_file(path: &Path, name: &str, contents: &str) {
        fs::create_dir_all(path).unwrap();
        fs::write(path.join(name), contents).unwrap();
    }

    #[test]
    fn reserved_backup_name_is_absent_and_prefixed() {
        let dir = tempdir().unwrap();
        let backup = reserve_backup_dir(dir.path()).unwrap();

        assert!(!backup.exists());
        assert_eq!(backup.parent(), Some(dir.path()));
        let name = backup.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(BACKUP_PREFIX));

        let other = reserve_backup_dir(dir.path()).unwrap();
        assert_ne!(backup, other);
    }

    #[test]
    fn swap_moves_original_aside_and_staging_into_place() {
        let dir = tempdir().unwrap();
        let original = dir.path().join("badgerds");
        let staging = dir.path().join("badger-staging-1");
        dir_with_file(&original, "data.db", "old");
        dir_with_file(&staging, "data.db", "new");

        let transcript = Transcript::default();
        let backup = swap_into_place(dir.path(), &staging, &original, &transcript).unwrap();

        assert_eq!(fs::read_to_string(original.join("data.db")).unwrap(), "new");
        assert_eq!(fs::read_to_string(backup.join("data.db")).unwrap(), "old");
        assert!(!staging.exists());
        assert!(transcript.contains("AFTER YOU VERIFY"));
        assert!(transcript.contains(&format!("REMOVE '{}'", backup.display())));
    }

    #[test]
    fn failed_second_rename_reports_manual_recovery() {
        let dir = tempdir().unwrap();
        let original = dir.path().join("badgerds");
        let staging = dir.path().join("badger-staging-gone");
        dir_with_file(&original, "data.db", "old");

        let err = swap_into_place(dir.path(), &staging, &original, &Transcript::default())
            .unwrap_err();

        match err {
            UpgradeError::SwapIncomplete {
                original: reported_original,
                backup,
                staging: reported_staging,
                ..
            } => {
                assert_eq!(reported_original, original);
                assert_eq!(reported_staging, staging);
                assert_eq!(fs::read_to_string(backup.join("data.db")).unwrap(), "old");
                assert!(!original.exists());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn failed_first_rename_leaves_everything_in_place() {
        let dir = tempdir().unwrap();
        let original = dir.path().join("missing");
        let staging = dir.path().join("badger-staging-1");
        dir_with_file(&staging, "data.db", "new");

        let err = swap_into_place(dir.path(), &staging, &original, &Transcript::default())
            .unwrap_err();
        assert!(matches!(err, UpgradeError::Io { .. }));
        assert_eq!(fs::read_to_string(staging.join("data.db")).unwrap(), "new");

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with(BACKUP_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
    }
}
