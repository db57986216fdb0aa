use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::Serialize;

use super::{FormatAdapter, KeyValue, SourceStore, StoreError, TargetEngine, TargetStore, WriteTxn};

pub const DB_FILE: &str = "data.db";

/// On-disk layouts of the SQLite engine. A store is a directory holding one `data.db`
/// with the layout version stamped in `PRAGMA user_version`; each layout keeps its pairs
/// in a different table shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    V1,
    V2,
    V3,
}

struct Statements {
    schema: &'static str,
    scan: &'static str,
    insert: &'static str,
    get: &'static str,
    count: &'static str,
}

const V1_SQL: Statements = Statements {
    schema: "CREATE TABLE kv (k BLOB PRIMARY KEY, v BLOB NOT NULL);",
    scan: "SELECT k, v FROM kv",
    insert: "INSERT OR REPLACE INTO kv (k, v) VALUES (?1, ?2)",
    get: "SELECT v FROM kv WHERE k = ?1",
    count: "SELECT COUNT(*) FROM kv",
};

const V2_SQL: Statements = Statements {
    schema: "CREATE TABLE entries (key BLOB PRIMARY KEY, value BLOB NOT NULL) WITHOUT ROWID;",
    scan: "SELECT key, value FROM entries",
    insert: "INSERT OR REPLACE INTO entries (key, value) VALUES (?1, ?2)",
    get: "SELECT value FROM entries WHERE key = ?1",
    count: "SELECT COUNT(*) FROM entries",
};

const V3_SQL: Statements = Statements {
    schema: "CREATE TABLE records (key BLOB PRIMARY KEY, value BLOB NOT NULL) WITHOUT ROWID;
             CREATE TABLE meta (name TEXT PRIMARY KEY, value TEXT NOT NULL);
             INSERT INTO meta (name, value) VALUES ('layout', 'v3');",
    scan: "SELECT key, value FROM records",
    insert: "INSERT OR REPLACE INTO records (key, value) VALUES (?1, ?2)",
    get: "SELECT value FROM records WHERE key = ?1",
    count: "SELECT COUNT(*) FROM records",
};

impl Layout {
    /// The layout new stores are written in.
    pub const CURRENT: Layout = Layout::V3;

    /// Older layouts this engine can still read, newest first.
    pub const LEGACY: [Layout; 2] = [Layout::V2, Layout::V1];

    pub fn version(self) -> i64 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
            Self::V3 => "v3",
        }
    }

    fn sql(self) -> &'static Statements {
        match self {
            Self::V1 => &V1_SQL,
            Self::V2 => &V2_SQL,
            Self::V3 => &V3_SQL,
        }
    }

    /// Create an empty store in `dir`, creating the directory if needed.
    /// Refuses to touch a directory that already holds a database.
    pub fn create(self, dir: &Path) -> Result<SqliteStore, StoreError> {
        fs::create_dir_all(dir)?;
        let path = db_path(dir);
        if path.exists() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("'{}' already holds a store", dir.display()),
            )));
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA synchronous=FULL;")?;
        conn.execute_batch(self.sql().schema)?;
        conn.pragma_update(None, "user_version", self.version())?;
        log::debug!("created {} store at {}", self.as_str(), path.display());

        Ok(SqliteStore { conn, layout: self })
    }

    /// Open an existing store for reading and writing.
    pub fn open(self, dir: &Path) -> Result<SqliteStore, StoreError> {
        self.open_with(dir, OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX)
    }

    /// Open an existing store without taking write access. Used when probing.
    pub fn open_read_only(self, dir: &Path) -> Result<SqliteStore, StoreError> {
        self.open_with(dir, OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX)
    }

    fn open_with(self, dir: &Path, flags: OpenFlags) -> Result<SqliteStore, StoreError> {
        let conn = Connection::open_with_flags(db_path(dir), flags)?;
        let found: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if found != self.version() {
            return Err(StoreError::UnsupportedVersion {
                found,
                expected: self.version(),
            });
        }
        Ok(SqliteStore { conn, layout: self })
    }
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn db_path(dir: &Path) -> PathBuf {
    dir.join(DB_FILE)
}

pub struct SqliteStore {
    conn: Connection,
    layout: Layout,
}

impl SqliteStore {
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.conn
            .prepare_cached(self.layout.sql().insert)?
            .execute(params![key, value])?;
        Ok(())
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self
            .conn
            .query_row(self.layout.sql().get, params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn len(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .query_row(self.layout.sql().count, [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Every pair, sorted by key.
    pub fn entries(&mut self) -> Result<Vec<KeyValue>, StoreError> {
        let mut out = Vec::new();
        let _ = self.scan(&mut |key, value| {
            out.push(KeyValue::copied(key, value));
            ControlFlow::Continue(())
        })?;
        out.sort();
        Ok(out)
    }

    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, err)| StoreError::Sqlite(err))
    }
}

fn blob<'a>(value: ValueRef<'a>, column: &str) -> Result<&'a [u8], StoreError> {
    match value {
        ValueRef::Blob(bytes) | ValueRef::Text(bytes) => Ok(bytes),
        other => Err(StoreError::Corrupt(format!(
            "{column} has non-blob type {:?}",
            other.data_type()
        ))),
    }
}

impl SourceStore for SqliteStore {
    fn scan(
        &mut self,
        visit: &mut dyn FnMut(&[u8], &[u8]) -> ControlFlow<()>,
    ) -> Result<ControlFlow<()>, StoreError> {
        let mut stmt = self.conn.prepare(self.layout.sql().scan)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let key = blob(row.get_ref(0)?, "key")?;
            let value = blob(row.get_ref(1)?, "value")?;
            if visit(key, value).is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn close(self: Box<Self>) -> Result<(), StoreError> {
        SqliteStore::close(*self)
    }
}

impl TargetStore for SqliteStore {
    fn begin(&mut self) -> Result<Box<dyn WriteTxn + '_>, StoreError> {
        let insert = self.layout.sql().insert;
        let tx = self.conn.transaction()?;
        Ok(Box::new(SqliteTxn { tx, insert }))
    }

    fn close(self: Box<Self>) -> Result<(), StoreError> {
        SqliteStore::close(*self)
    }
}

struct SqliteTxn<'c> {
    tx: rusqlite::Transaction<'c>,
    insert: &'static str,
}

impl WriteTxn for SqliteTxn<'_> {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.tx
            .prepare_cached(self.insert)?
            .execute(params![key, value])?;
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit()?;
        Ok(())
    }
}

impl FormatAdapter for Layout {
    fn name(&self) -> &'static str {
        self.as_str()
    }

    fn open(&self, dir: &Path) -> Result<Box<dyn SourceStore>, StoreError> {
        Ok(Box::new(self.open_read_only(dir)?))
    }
}

impl TargetEngine for Layout {
    fn name(&self) -> &'static str {
        self.as_str()
    }

    fn create(&self, dir: &Path) -> Result<Box<dyn TargetStore>, StoreError> {
        Ok(Box::new(Layout::create(*self, dir)?))
    }
}
