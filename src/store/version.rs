use std::fs;
use std::path::Path;

use crate::error::{Result, UpgradeError};
use crate::store::{SUPPORTED_REPO_VERSION, VERSION_FILE};

/// Read the repository version marker.
pub fn read_version(repo_root: &Path) -> Result<u64> {
    let path = repo_root.join(VERSION_FILE);
    let raw = fs::read_to_string(&path).map_err(|e| UpgradeError::io(&path, e))?;
    parse_version(&raw)
}

pub fn parse_version(raw: &str) -> Result<u64> {
    let trimmed = raw.trim();
    trimmed
        .parse::<u64>()
        .map_err(|_| UpgradeError::MalformedVersion(trimmed.to_string()))
}

/// Reject any repository that is not at the one version this tool upgrades from.
pub fn ensure_supported(repo_root: &Path) -> Result<u64> {
    let found = read_version(repo_root)?;
    if found != SUPPORTED_REPO_VERSION {
        return Err(UpgradeError::UnsupportedRepoVersion {
            found,
            supported: SUPPORTED_REPO_VERSION,
        });
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_with_surrounding_whitespace() {
        assert_eq!(parse_version("6").unwrap(), 6);
        assert_eq!(parse_version("  6\n").unwrap(), 6);
        assert_eq!(parse_version("\t12 \r\n").unwrap(), 12);
    }

    #[test]
    fn rejects_non_integers() {
        for raw in ["", "six", "6.0", "-6", "6 7"] {
            let err = parse_version(raw).unwrap_err();
            assert!(
                matches!(err, UpgradeError::MalformedVersion(_)),
                "{raw:?} gave {err}"
            );
        }
    }

    #[test]
    fn large_integers_parse() {
        assert_eq!(parse_version("4294967296").unwrap(), 4_294_967_296);
    }

    #[test]
    fn missing_marker_is_io_error_with_path() {
        let dir = tempdir().unwrap();
        let err = read_version(dir.path()).unwrap_err();
        match err {
            UpgradeError::Io { path, .. } => assert_eq!(path, dir.path().join(VERSION_FILE)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn only_supported_version_passes() {
        let dir = tempdir().unwrap();

        fs::write(dir.path().join(VERSION_FILE), "6\n").unwrap();
        assert_eq!(ensure_supported(dir.path()).unwrap(), 6);

        for other in ["5", "7", "0", "4294967296"] {
            fs::write(dir.path().join(VERSION_FILE), other).unwrap();
            let err = ensure_supported(dir.path()).unwrap_err();
            assert!(matches!(
                err,
                UpgradeError::UnsupportedRepoVersion { supported: 6, .. }
            ));
        }
    }
}
