use std::path::Path;

use crate::engine::sqlite::Layout;
use crate::engine::{FormatAdapter, SourceStore, StoreError, TargetEngine};
use crate::error::{Result, UpgradeError};
use crate::report::Reporter;

/// The adapters one run works with.
pub struct Formats {
    /// Opens stores already in the layout `target` writes.
    pub current: Box<dyn FormatAdapter>,
    /// Older layouts, tried in order. Newest first.
    pub legacy: Vec<Box<dyn FormatAdapter>>,
    pub target: Box<dyn TargetEngine>,
}

impl Default for Formats {
    fn default() -> Self {
        Self {
            current: Box::new(Layout::CURRENT),
            legacy: Layout::LEGACY
                .iter()
                .map(|layout| Box::new(*layout) as Box<dyn FormatAdapter>)
                .collect(),
            target: Box::new(Layout::CURRENT),
        }
    }
}

/// What a probe found at a path.
pub enum Probe {
    AlreadyCurrent,
    Legacy {
        format: &'static str,
        store: Box<dyn SourceStore>,
    },
}

impl std::fmt::Debug for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyCurrent => f.write_str("AlreadyCurrent"),
            Self::Legacy { format, .. } => f.debug_struct("Legacy").field("format", format).finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// The store says it holds a different layout; try the next adapter.
    WrongFormat,
    /// Anything else. Stop probing.
    Fatal,
}

pub fn classify(err: &StoreError) -> Attempt {
    if err.is_format_mismatch() {
        Attempt::WrongFormat
    } else {
        Attempt::Fatal
    }
}

fn attempt(
    adapter: &dyn FormatAdapter,
    path: &Path,
    reporter: &dyn Reporter,
) -> Result<Option<Box<dyn SourceStore>>> {
    reporter.note(&format!("Trying format {}", adapter.name()));
    match adapter.open(path) {
        Ok(store) => Ok(Some(store)),
        Err(err) => match classify(&err) {
            Attempt::WrongFormat => {
                log::debug!("{} rejected {}: {err}", adapter.name(), path.display());
                Ok(None)
            }
            Attempt::Fatal => Err(UpgradeError::store(path, err)),
        },
    }
}

/// Identify the on-disk layout at `path`.
///
/// The current layout is checked first so an already upgraded store is left alone; then
/// each legacy layout in order. A failure other than a format mismatch ends the probe.
pub fn probe(path: &Path, formats: &Formats, reporter: &dyn Reporter) -> Result<Probe> {
    if let Some(store) = attempt(formats.current.as_ref(), path, reporter)? {
        store.close().map_err(|e| UpgradeError::store(path, e))?;
        return Ok(Probe::AlreadyCurrent);
    }

    for adapter in &formats.legacy {
        if let Some(store) = attempt(adapter.as_ref(), path, reporter)? {
            return Ok(Probe::Legacy {
                format: adapter.name(),
                store,
            });
        }
    }

    Err(UpgradeError::UnsupportedStoreFormat {
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Transcript;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct Refusing {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        fatal: bool,
    }

    impl FormatAdapter for Refusing {
        fn name(&self) -> &'static str {
            self.name
        }

        fn open(&self, _dir: &Path) -> std::result::Result<Box<dyn SourceStore>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fatal {
                Err(StoreError::Io(std::io::Error::other("permission denied")))
            } else {
                Err(StoreError::UnsupportedVersion {
                    found: 0,
                    expected: 9,
                })
            }
        }
    }

    #[test]
    fn identifies_each_legacy_layout() {
        for layout in Layout::LEGACY {
            let dir = tempdir().unwrap();
            let store = layout.create(dir.path()).unwrap();
            store.put(b"k", b"v").unwrap();
            store.close().unwrap();

            let transcript = Transcript::default();
            let found = probe(dir.path(), &Formats::default(), &transcript).unwrap();
            match found {
                Probe::Legacy { format, store } => {
                    assert_eq!(format, layout.as_str());
                    store.close().unwrap();
                }
                other => panic!("unexpected probe result: {other:?}"),
            }
            assert!(transcript.contains("Trying format v3"));
        }
    }

    #[test]
    fn current_layout_is_already_current() {
        let dir = tempdir().unwrap();
        Layout::CURRENT.create(dir.path()).unwrap().close().unwrap();

        let found = probe(dir.path(), &Formats::default(), &Transcript::default()).unwrap();
        assert!(matches!(found, Probe::AlreadyCurrent));
    }

    #[test]
    fn unknown_layout_is_unsupported() {
        let dir = tempdir().unwrap();
        rusqlite::Connection::open(dir.path().join(crate::engine::sqlite::DB_FILE))
            .unwrap()
            .execute_batch("CREATE TABLE t (x);")
            .unwrap();

        let err = probe(dir.path(), &Formats::default(), &Transcript::default()).unwrap_err();
        assert!(matches!(err, UpgradeError::UnsupportedStoreFormat { .. }));
    }

    #[test]
    fn missing_store_is_fatal_not_unsupported() {
        let dir = tempdir().unwrap();
        let err = probe(
            &dir.path().join("absent"),
            &Formats::default(),
            &Transcript::default(),
        )
        .unwrap_err();
        assert!(matches!(err, UpgradeError::Store { .. }));
    }

    #[test]
    fn fatal_error_stops_remaining_attempts() {
        let dir = tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let formats = Formats {
            current: Box::new(Layout::CURRENT),
            legacy: vec![
                Box::new(Refusing {
                    name: "newer",
                    calls: calls.clone(),
                    fatal: true,
                }),
                Box::new(Refusing {
                    name: "older",
                    calls: calls.clone(),
                    fatal: false,
                }),
            ],
            target: Box::new(Layout::CURRENT),
        };
        Layout::V1.create(dir.path()).unwrap().close().unwrap();

        let transcript = Transcript::default();
        let err = probe(dir.path(), &formats, &transcript).unwrap_err();
        assert!(matches!(err, UpgradeError::Store { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!transcript.contains("Trying format older"));
    }

    #[test]
    fn classify_separates_mismatch_from_fatal() {
        let mismatch = StoreError::UnsupportedVersion {
            found: 1,
            expected: 3,
        };
        assert_eq!(classify(&mismatch), Attempt::WrongFormat);
        assert_eq!(
            classify(&StoreError::Corrupt("bad".into())),
            Attempt::Fatal
        );
    }
}
