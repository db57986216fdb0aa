use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::engine::StoreError;
use crate::store::spec::SpecError;

#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("unsupported repository version: {found} (this tool upgrades version {supported})")]
    UnsupportedRepoVersion { found: u64, supported: u64 },

    #[error("malformed version marker: {0:?}")]
    MalformedVersion(String),

    #[error("io error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    SpecParse(#[from] SpecError),

    #[error("no known store format could open '{}'", path.display())]
    UnsupportedStoreFormat { path: PathBuf },

    #[error("store error at '{}': {source}", path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    #[error("migration of '{}' was cancelled", path.display())]
    Cancelled { path: PathBuf },

    #[error(
        "swap incomplete, manual recovery needed: original data is at '{}', migrated data is at '{}', expected at '{}': {source}",
        backup.display(),
        staging.display(),
        original.display()
    )]
    SwapIncomplete {
        original: PathBuf,
        backup: PathBuf,
        staging: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("locked by another process: {0}")]
    Locked(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UpgradeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedRepoVersion { .. } => "unsupported_repo_version",
            Self::MalformedVersion(_) => "malformed_version",
            Self::Io { .. } => "io_error",
            Self::SpecParse(_) => "spec_parse_error",
            Self::UnsupportedStoreFormat { .. } => "unsupported_store_format",
            Self::Store { .. } => "store_error",
            Self::Cancelled { .. } => "cancelled",
            Self::SwapIncomplete { .. } => "swap_incomplete",
            Self::Locked(_) => "locked",
            Self::Json(_) => "json_error",
        }
    }

    /// Attach the path an I/O failure happened at.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn store(path: impl AsRef<Path>, source: StoreError) -> Self {
        Self::Store {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

pub type Result<T> = std::result::Result<T, UpgradeError>;
