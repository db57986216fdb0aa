use std::ops::ControlFlow;
use std::path::Path;

use thiserror::Error;

pub mod sqlite;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store has unsupported on-disk version {found} (expected {expected})")]
    UnsupportedVersion { found: i64, expected: i64 },

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// The store's own format check rejected the path: it holds some other layout.
    ///
    /// This is the only failure a probe may step past. Everything else is fatal.
    pub fn is_format_mismatch(&self) -> bool {
        matches!(self, Self::UnsupportedVersion { .. })
    }
}

/// An owned key/value pair. Adapters hand out borrowed slices that are only valid for
/// the duration of a visit, so anything crossing a thread boundary is copied first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct KeyValue {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl KeyValue {
    pub fn copied(key: &[u8], value: &[u8]) -> Self {
        Self {
            key: key.to_vec(),
            value: value.to_vec(),
        }
    }
}

/// A store opened in a legacy layout, read once front to back.
pub trait SourceStore: Send {
    /// Visit every pair in the store's native order.
    ///
    /// Returns `Break` if the visitor stopped early, `Continue` once the store is exhausted.
    fn scan(
        &mut self,
        visit: &mut dyn FnMut(&[u8], &[u8]) -> ControlFlow<()>,
    ) -> Result<ControlFlow<()>, StoreError>;

    fn close(self: Box<Self>) -> Result<(), StoreError>;
}

/// Opens a directory under one specific on-disk layout.
pub trait FormatAdapter: Sync {
    fn name(&self) -> &'static str;

    fn open(&self, dir: &Path) -> Result<Box<dyn SourceStore>, StoreError>;
}

/// Creates fresh stores in the current layout.
pub trait TargetEngine: Sync {
    fn name(&self) -> &'static str;

    fn create(&self, dir: &Path) -> Result<Box<dyn TargetStore>, StoreError>;
}

pub trait TargetStore: Send {
    fn begin(&mut self) -> Result<Box<dyn WriteTxn + '_>, StoreError>;

    fn close(self: Box<Self>) -> Result<(), StoreError>;
}

/// A write transaction. Dropping it without calling `commit` discards every put.
pub trait WriteTxn {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
