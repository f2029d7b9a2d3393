//! Store adapters
//!
//! Every backend is reached through the same two-method [`Store`] session.
//! A [`Backend`] prepares the schema once and opens sessions; the harness
//! opens one session per worker, so no session is ever shared between
//! threads:
//!
//! - sqlite: one `rusqlite::Connection` per worker on the same file.
//!   Writers are serialized by SQLite's file lock; waiters block up to the
//!   busy timeout.
//! - postgres: one `postgres::Client` (server connection) per worker.
//! - redis: one `redis::Connection` per worker.

use std::sync::Arc;

use crate::config::{BackendKind, BenchmarkConfig, ConnectionSettings};
use crate::error::{SetupError, StoreResult};

pub mod postgres_adapter;
pub mod redis_adapter;
pub mod sqlite_adapter;

pub use postgres_adapter::PostgresBackend;
pub use redis_adapter::RedisBackend;
pub use sqlite_adapter::SqliteBackend;

/// A single session against a backend.
pub trait Store: Send {
    /// Insert or overwrite `key`.
    fn put(&mut self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Fetch `key`. A missing key is `StoreError::NotFound`.
    fn get(&mut self, key: &str) -> StoreResult<Vec<u8>>;
}

/// Factory for sessions against one backend.
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    /// One-time setup (schema creation, reachability check).
    fn prepare(&self) -> Result<(), SetupError>;

    /// Open a fresh, independent session.
    fn connect(&self) -> Result<Box<dyn Store>, SetupError>;
}

/// Build the adapter for `kind` from the connection settings.
pub fn backend_for(kind: BackendKind, settings: &ConnectionSettings) -> Arc<dyn Backend> {
    match kind {
        BackendKind::Sqlite => Arc::new(SqliteBackend::new(
            &settings.sqlite_path,
            settings.sqlite_busy_timeout,
        )),
        BackendKind::Postgres => Arc::new(PostgresBackend::new(
            &settings.postgres_url,
            settings.connect_timeout,
        )),
        BackendKind::Redis => Arc::new(RedisBackend::new(
            &settings.redis_url,
            settings.connect_timeout,
        )),
    }
}

/// Adapters for every backend the config selects, in run order.
pub fn backends_for(config: &BenchmarkConfig) -> Vec<Arc<dyn Backend>> {
    config
        .backends
        .kinds()
        .into_iter()
        .map(|kind| backend_for(kind, &config.connections))
        .collect()
}

pub(crate) fn connect_error(backend: &str, reason: impl ToString) -> SetupError {
    SetupError::Connect {
        backend: backend.to_string(),
        reason: reason.to_string(),
    }
}

pub(crate) fn schema_error(backend: &str, reason: impl ToString) -> SetupError {
    SetupError::Schema {
        backend: backend.to_string(),
        reason: reason.to_string(),
    }
}
