//! Redis adapter (via the synchronous `redis` client).
//!
//! Each session owns one TCP connection, so every worker talks to the
//! server over its own socket. Values are stored with plain SET/GET.

use std::time::Duration;

use redis::{Client, Connection, RedisError};

use super::{connect_error, Backend, Store};
use crate::error::{SetupError, StoreError, StoreResult};

const NAME: &str = "redis";

pub struct RedisBackend {
    url: String,
    connect_timeout: Duration,
}

impl RedisBackend {
    pub fn new(url: &str, connect_timeout: Duration) -> Self {
        RedisBackend {
            url: url.to_string(),
            connect_timeout,
        }
    }

    fn open(&self) -> Result<Connection, SetupError> {
        let client = Client::open(self.url.as_str()).map_err(|e| connect_error(NAME, e))?;
        client
            .get_connection_with_timeout(self.connect_timeout)
            .map_err(|e| connect_error(NAME, e))
    }
}

impl Backend for RedisBackend {
    fn name(&self) -> &str {
        NAME
    }

    /// Nothing to create; PING proves the server answers.
    fn prepare(&self) -> Result<(), SetupError> {
        let mut conn = self.open()?;
        redis::cmd("PING")
            .query::<String>(&mut conn)
            .map_err(|e| connect_error(NAME, e))?;
        Ok(())
    }

    fn connect(&self) -> Result<Box<dyn Store>, SetupError> {
        Ok(Box::new(RedisStore { conn: self.open()? }))
    }
}

pub struct RedisStore {
    conn: Connection,
}

impl RedisStore {
    fn handle_redis_error(e: RedisError) -> StoreError {
        let msg = e.to_string();
        if e.is_timeout() {
            StoreError::Timeout(msg)
        } else if e.is_connection_dropped() || e.is_connection_refusal() || e.is_io_error() {
            StoreError::ConnectionFailed(msg)
        } else {
            StoreError::Backend(msg)
        }
    }
}

impl Store for RedisStore {
    fn put(&mut self, key: &str, value: &[u8]) -> StoreResult<()> {
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query::<()>(&mut self.conn)
            .map_err(Self::handle_redis_error)
    }

    fn get(&mut self, key: &str) -> StoreResult<Vec<u8>> {
        redis::cmd("GET")
            .arg(key)
            .query::<Option<Vec<u8>>>(&mut self.conn)
            .map_err(Self::handle_redis_error)?
            .ok_or(StoreError::NotFound)
    }
}
