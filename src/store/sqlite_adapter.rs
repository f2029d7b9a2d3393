//! SQLite adapter (via rusqlite).
//!
//! Every session opens its own connection to the same database file.
//! Statements run in autocommit mode, so each put is its own transaction.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, ErrorCode};

use super::{connect_error, schema_error, Backend, Store};
use crate::error::{SetupError, StoreError, StoreResult};

const NAME: &str = "sqlite";

pub struct SqliteBackend {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteBackend {
    pub fn new(path: &Path, busy_timeout: Duration) -> Self {
        SqliteBackend {
            path: path.to_path_buf(),
            busy_timeout,
        }
    }

    fn open(&self) -> Result<Connection, SetupError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| connect_error(NAME, e))?;
        }
        let conn = Connection::open(&self.path).map_err(|e| connect_error(NAME, e))?;
        conn.busy_timeout(self.busy_timeout)
            .map_err(|e| connect_error(NAME, e))?;
        Ok(conn)
    }
}

impl Backend for SqliteBackend {
    fn name(&self) -> &str {
        NAME
    }

    fn prepare(&self) -> Result<(), SetupError> {
        let conn = self.open()?;
        conn.execute_batch("CREATE TABLE IF NOT EXISTS kv (k TEXT PRIMARY KEY, v BLOB)")
            .map_err(|e| schema_error(NAME, e))?;
        Ok(())
    }

    fn connect(&self) -> Result<Box<dyn Store>, SetupError> {
        Ok(Box::new(SqliteStore { conn: self.open()? }))
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    fn handle_error(e: rusqlite::Error) -> StoreError {
        let msg = e.to_string();
        match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
            rusqlite::Error::SqliteFailure(err, _) => match err.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => StoreError::Timeout(msg),
                ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::SystemIoFailure => {
                    StoreError::ConnectionFailed(msg)
                }
                _ => StoreError::Backend(msg),
            },
            _ => StoreError::Backend(msg),
        }
    }
}

impl Store for SqliteStore {
    fn put(&mut self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.conn
            .prepare_cached("INSERT OR REPLACE INTO kv (k, v) VALUES (?1, ?2)")
            .and_then(|mut stmt| stmt.execute(params![key, value]))
            .map(|_| ())
            .map_err(Self::handle_error)
    }

    fn get(&mut self, key: &str) -> StoreResult<Vec<u8>> {
        self.conn
            .prepare_cached("SELECT v FROM kv WHERE k = ?1")
            .and_then(|mut stmt| stmt.query_row(params![key], |row| row.get::<_, Vec<u8>>(0)))
            .map_err(Self::handle_error)
    }
}
