use std::path::PathBuf;

/// Environment variable naming the repository root.
pub const REPO_ENV: &str = "IPFS_PATH";
/// Repository directory under `$HOME` when nothing else is given.
pub const DEFAULT_REPO_DIR: &str = ".ipfs";

/// Resolve the repository root from the environment.
///
/// Checks `IPFS_PATH` first, then falls back to `$HOME/.ipfs`. Returns `None` if
/// neither is usable.
pub fn resolve_repo_root() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(REPO_ENV).filter(|s| !s.is_empty()) {
        return Some(PathBuf::from(path));
    }
    std::env::var_os("HOME")
        .filter(|s| !s.is_empty())
        .map(|home| PathBuf::from(home).join(DEFAULT_REPO_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env-var tests must not run concurrently.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn resolve_repo_root_env_behavior() {
        let _guard = ENV_LOCK.lock().unwrap();
        let saved_home = std::env::var_os("HOME");

        // Reads IPFS_PATH when set
        unsafe { std::env::set_var(REPO_ENV, "/srv/ipfs") };
        assert_eq!(resolve_repo_root(), Some(PathBuf::from("/srv/ipfs")));

        // Ignores empty value and falls back to HOME
        unsafe { std::env::set_var(REPO_ENV, "") };
        unsafe { std::env::set_var("HOME", "/home/op") };
        assert_eq!(resolve_repo_root(), Some(PathBuf::from("/home/op/.ipfs")));

        // None when neither is set
        unsafe { std::env::remove_var(REPO_ENV) };
        unsafe { std::env::remove_var("HOME") };
        assert_eq!(resolve_repo_root(), None);

        if let Some(home) = saved_home {
            unsafe { std::env::set_var("HOME", home) };
        }
    }
}
