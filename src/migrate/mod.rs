use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::error::{Result, UpgradeError};
use crate::report::Reporter;
use crate::store::lock::acquire_repo_lock;
use crate::store::spec::resolve_paths;
use crate::store::swap::swap_into_place;
use crate::store::version::ensure_supported;

pub mod cancel;
pub mod probe;
pub mod stream;

use cancel::CancelToken;
use probe::{Formats, Probe, probe};
use stream::{MigrationJob, migrate};

/// Progress is reported every this many entries.
pub const PROGRESS_EVERY: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpgradeOptions {
    /// Resolve and probe only; never create, rename or write anything but the lock file.
    pub dry_run: bool,
    pub progress_every: u64,
}

impl Default for UpgradeOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            progress_every: PROGRESS_EVERY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StoreOutcome {
    AlreadyCurrent,
    WouldMigrate {
        from: String,
    },
    Migrated {
        from: String,
        entries: u64,
        backup: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreReport {
    pub path: PathBuf,
    #[serde(flatten)]
    pub outcome: StoreOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradeSummary {
    pub repo: PathBuf,
    pub version: u64,
    pub dry_run: bool,
    pub stores: Vec<StoreReport>,
}

impl UpgradeSummary {
    pub fn backups(&self) -> impl Iterator<Item = &Path> {
        self.stores.iter().filter_map(|store| match &store.outcome {
            StoreOutcome::Migrated { backup, .. } => Some(backup.as_path()),
            _ => None,
        })
    }
}

/// Upgrades every badger store of one repository: version gate, spec resolution, then
/// probe, stream and swap for each store, one at a time.
///
/// An `Upgrader` performs a single run. Its cancel token belongs to that run only.
pub struct Upgrader<'a> {
    root: PathBuf,
    reporter: &'a dyn Reporter,
    formats: Formats,
    options: UpgradeOptions,
    cancel: CancelToken,
}

impl<'a> Upgrader<'a> {
    pub fn new(repo_root: &Path, reporter: &'a dyn Reporter) -> Self {
        Self {
            root: repo_root.to_path_buf(),
            reporter,
            formats: Formats::default(),
            options: UpgradeOptions::default(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_options(mut self, options: UpgradeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_formats(mut self, formats: Formats) -> Self {
        self.formats = formats;
        self
    }

    /// A handle that stops this upgrader's run when raised, before or during it.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the upgrade, stopping at the first store that fails.
    ///
    /// Stores upgraded before a failure stay upgraded.
    pub fn run(self) -> Result<UpgradeSummary> {
        let version = ensure_supported(&self.root)?;
        let paths = resolve_paths(&self.root, self.reporter)?;
        let lock = acquire_repo_lock(&self.root)?;

        let mut stores = Vec::with_capacity(paths.len());
        for dir in paths {
            let path = store_dir(&self.root, &dir);
            let outcome = self.upgrade_store(&path)?;
            stores.push(StoreReport { path, outcome });
        }
        lock.release()?;

        Ok(UpgradeSummary {
            repo: self.root.clone(),
            version,
            dry_run: self.options.dry_run,
            stores,
        })
    }

    fn upgrade_store(&self, path: &Path) -> Result<StoreOutcome> {
        self.reporter
            .note(&format!("Upgrading badger at {}", path.display()));

        let (format, source) = match probe(path, &self.formats, self.reporter)? {
            Probe::AlreadyCurrent => {
                self.reporter.note(&format!(
                    "{} is already in format {}, skipping",
                    path.display(),
                    self.formats.target.name()
                ));
                return Ok(StoreOutcome::AlreadyCurrent);
            }
            Probe::Legacy { format, store } => (format, store),
        };

        if self.options.dry_run {
            source
                .close()
                .map_err(|e| UpgradeError::store(path, e))?;
            self.reporter.note(&format!(
                "Would migrate {} from {format} to {}",
                path.display(),
                self.formats.target.name()
            ));
            return Ok(StoreOutcome::WouldMigrate {
                from: format.to_string(),
            });
        }

        let job = MigrationJob::new(&self.root, path, self.cancel.clone());
        log::debug!("migrating {} via {}", path.display(), job.staging.display());
        let stats = migrate(
            &job,
            source,
            self.formats.target.as_ref(),
            self.options.progress_every,
            self.reporter,
        )?;
        let backup = swap_into_place(&self.root, &job.staging, path, self.reporter)?;

        Ok(StoreOutcome::Migrated {
            from: format.to_string(),
            entries: stats.entries,
            backup,
        })
    }
}

/// Spec paths always name a location inside the repository, even when written absolute.
fn store_dir(repo_root: &Path, dir: &str) -> PathBuf {
    let relative: PathBuf = Path::new(dir)
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();
    repo_root.join(relative)
}

/// Upgrade the repository at `repo_root` with default settings.
pub fn upgrade(repo_root: &Path, reporter: &dyn Reporter) -> Result<UpgradeSummary> {
    Upgrader::new(repo_root, reporter).run()
}
