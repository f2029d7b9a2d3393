//! Postgres adapter (via the synchronous `postgres` client).
//!
//! One server connection per session; statements are prepared once when the
//! session opens and run in autocommit mode.

use std::time::Duration;

use postgres::error::SqlState;
use postgres::{Client, Config, NoTls, Statement};

use super::{connect_error, schema_error, Backend, Store};
use crate::error::{SetupError, StoreError, StoreResult};

const NAME: &str = "postgres";

const UPSERT: &str = "INSERT INTO kv (k, v) VALUES ($1, $2) \
                      ON CONFLICT (k) DO UPDATE SET v = EXCLUDED.v";
const SELECT: &str = "SELECT v FROM kv WHERE k = $1";

pub struct PostgresBackend {
    url: String,
    connect_timeout: Duration,
}

impl PostgresBackend {
    pub fn new(url: &str, connect_timeout: Duration) -> Self {
        PostgresBackend {
            url: url.to_string(),
            connect_timeout,
        }
    }

    fn open(&self) -> Result<Client, SetupError> {
        let mut config: Config = self.url.parse().map_err(|e| connect_error(NAME, e))?;
        config.connect_timeout(self.connect_timeout);
        config.connect(NoTls).map_err(|e| connect_error(NAME, e))
    }
}

impl Backend for PostgresBackend {
    fn name(&self) -> &str {
        NAME
    }

    fn prepare(&self) -> Result<(), SetupError> {
        let mut client = self.open()?;
        client
            .batch_execute("CREATE TABLE IF NOT EXISTS kv (k TEXT PRIMARY KEY, v BYTEA)")
            .map_err(|e| schema_error(NAME, e))?;
        Ok(())
    }

    fn connect(&self) -> Result<Box<dyn Store>, SetupError> {
        let mut client = self.open()?;
        let upsert = client.prepare(UPSERT).map_err(|e| schema_error(NAME, e))?;
        let select = client.prepare(SELECT).map_err(|e| schema_error(NAME, e))?;
        Ok(Box::new(PostgresStore {
            client,
            upsert,
            select,
        }))
    }
}

pub struct PostgresStore {
    client: Client,
    upsert: Statement,
    select: Statement,
}

impl PostgresStore {
    fn handle_error(e: postgres::Error) -> StoreError {
        let msg = e.to_string();
        if e.is_closed() {
            return StoreError::ConnectionFailed(msg);
        }
        let code = e.code();
        if code == Some(&SqlState::QUERY_CANCELED) || code == Some(&SqlState::LOCK_NOT_AVAILABLE) {
            return StoreError::Timeout(msg);
        }
        let io = std::error::Error::source(&e).and_then(|s| s.downcast_ref::<std::io::Error>());
        match io {
            Some(io) if io.kind() == std::io::ErrorKind::TimedOut => StoreError::Timeout(msg),
            Some(_) => StoreError::ConnectionFailed(msg),
            None => StoreError::Backend(msg),
        }
    }
}

impl Store for PostgresStore {
    fn put(&mut self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.client
            .execute(&self.upsert, &[&key, &value])
            .map(|_| ())
            .map_err(Self::handle_error)
    }

    fn get(&mut self, key: &str) -> StoreResult<Vec<u8>> {
        let row = self
            .client
            .query_opt(&self.select, &[&key])
            .map_err(Self::handle_error)?
            .ok_or(StoreError::NotFound)?;
        row.try_get::<_, Vec<u8>>(0).map_err(Self::handle_error)
    }
}
