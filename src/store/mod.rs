pub mod lock;
pub mod spec;
pub mod swap;
pub mod version;

/// Repository version this tool upgrades from.
pub const SUPPORTED_REPO_VERSION: u64 = 6;

pub const VERSION_FILE: &str = "version";
pub const SPEC_FILE: &str = "datastore_spec";
pub const CONFIG_FILE: &str = "config";
pub const LOCK_FILE: &str = "repo.lock";

/// Prefix of directories a migration writes into before the swap.
pub const STAGING_PREFIX: &str = "badger-staging-";
/// Prefix of directories the original stores are renamed to.
pub const BACKUP_PREFIX: &str = "badger-backup-";
