//! # Synchronous client API
//!
//! Purpose: expose a compact, blocking API for issuing commands to a
//! `mydb-server` instance over its inline-line protocol.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `KVClient` hides pooling and protocol details.
//! 2. **Borrow-Friendly API**: Accept `&[u8]` to avoid unnecessary copies.
//! 3. **Fail Fast**: Protocol violations surface immediately as errors.
//! 4. **Performance First**: Prefer direct TCP writes and buffer reuse.

use std::fmt;
use std::time::Duration;

use crate::pool::{ConnectionPool, PoolConfig};
use crate::resp::RespValue;

/// Result type for the sync client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the sync client.
#[derive(Debug)]
pub enum ClientError {
    /// Network or IO failure while reading/writing.
    Io(std::io::Error),
    /// Response framing or parse error.
    Protocol,
    /// Server returned an error reply.
    Server { message: Vec<u8> },
    /// Response type did not match the expected command response.
    UnexpectedResponse,
    /// Pool is at capacity and no idle connections are available.
    PoolExhausted,
    /// Address could not be parsed into a socket address.
    InvalidAddress,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Io(err) => write!(f, "io error: {}", err),
            ClientError::Protocol => write!(f, "protocol error"),
            ClientError::Server { message } => {
                write!(f, "server error: {}", String::from_utf8_lossy(message))
            }
            ClientError::UnexpectedResponse => write!(f, "unexpected response"),
            ClientError::PoolExhausted => write!(f, "connection pool exhausted"),
            ClientError::InvalidAddress => write!(f, "invalid address"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Io(err)
    }
}

/// Configuration for the synchronous client and its pool.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address, e.g. "127.0.0.1:6379".
    pub addr: String,
    /// Maximum idle connections kept in the pool.
    pub max_idle: usize,
    /// Maximum total connections (idle + in-use).
    pub max_total: usize,
    /// Optional TCP read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            addr: "127.0.0.1:6379".to_string(),
            max_idle: 8,
            max_total: 16,
            read_timeout: None,
            write_timeout: None,
            connect_timeout: None,
        }
    }
}

/// Synchronous client with connection pooling.
///
/// This is a facade over the pool and the inline-command encoder/RESP
/// decoder. Each call acquires a connection, executes one command, and
/// returns the connection to the pool.
pub struct KVClient {
    pool: ConnectionPool,
}

impl KVClient {
    /// Creates a client with default configuration.
    pub fn connect(addr: impl Into<String>) -> ClientResult<Self> {
        let mut config = ClientConfig::default();
        config.addr = addr.into();
        Self::with_config(config)
    }

    /// Creates a client with a custom configuration.
    pub fn with_config(config: ClientConfig) -> ClientResult<Self> {
        let pool = ConnectionPool::new(PoolConfig {
            addr: config.addr,
            max_idle: config.max_idle,
            max_total: config.max_total,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            connect_timeout: config.connect_timeout,
        })?;
        Ok(KVClient { pool })
    }

    fn exec(&self, verb: &str, args: &[&[u8]]) -> ClientResult<RespValue> {
        let mut conn = self.pool.acquire()?;
        conn.exec(verb, args)
    }

    fn ok(&self, verb: &str, args: &[&[u8]]) -> ClientResult<()> {
        match self.exec(verb, args)? {
            RespValue::Simple(_) => Ok(()),
            RespValue::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    fn integer(&self, verb: &str, args: &[&[u8]]) -> ClientResult<i64> {
        match self.exec(verb, args)? {
            RespValue::Integer(value) => Ok(value),
            RespValue::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    fn bulk(&self, verb: &str, args: &[&[u8]]) -> ClientResult<Option<Vec<u8>>> {
        match self.exec(verb, args)? {
            RespValue::Bulk(data) => Ok(data),
            RespValue::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    fn array_of_bulks(&self, verb: &str, args: &[&[u8]]) -> ClientResult<Vec<Vec<u8>>> {
        match self.exec(verb, args)? {
            RespValue::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    RespValue::Bulk(Some(data)) => Ok(data),
                    RespValue::Bulk(None) => Ok(Vec::new()),
                    _ => Err(ClientError::UnexpectedResponse),
                })
                .collect(),
            RespValue::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    // ---- connection lifecycle ----

    /// Authenticates against a password-protected server.
    pub fn auth(&self, password: &str) -> ClientResult<()> {
        self.ok("AUTH", &[password.as_bytes()])
    }

    /// Pings the server. Returns the raw response payload.
    pub fn ping(&self, payload: Option<&[u8]>) -> ClientResult<Vec<u8>> {
        let response = match payload {
            Some(data) => self.exec("PING", &[data])?,
            None => self.exec("PING", &[])?,
        };
        match response {
            RespValue::Simple(text) => Ok(text),
            RespValue::Bulk(Some(data)) => Ok(data),
            RespValue::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    // ---- STRING ----

    /// Fetches a value by key. Returns `Ok(None)` when the key is missing.
    pub fn get(&self, key: &[u8]) -> ClientResult<Option<Vec<u8>>> {
        self.bulk("GET", &[key])
    }

    /// Sets a value for a key without expiration.
    pub fn set(&self, key: &[u8], value: &[u8]) -> ClientResult<()> {
        self.ok("SET", &[key, value])
    }

    pub fn incr(&self, key: &[u8]) -> ClientResult<i64> {
        self.integer("INCR", &[key])
    }

    pub fn decr(&self, key: &[u8]) -> ClientResult<i64> {
        self.integer("DECR", &[key])
    }

    // ---- generic key ops ----

    /// Deletes keys. Returns the number removed.
    pub fn del(&self, keys: &[&[u8]]) -> ClientResult<i64> {
        self.integer("DEL", keys)
    }

    pub fn exists(&self, keys: &[&[u8]]) -> ClientResult<i64> {
        self.integer("EXISTS", keys)
    }

    pub fn type_of(&self, key: &[u8]) -> ClientResult<Vec<u8>> {
        match self.exec("TYPE", &[key])? {
            RespValue::Simple(text) => Ok(text),
            RespValue::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub fn keys(&self, pattern: &[u8]) -> ClientResult<Vec<Vec<u8>>> {
        self.array_of_bulks("KEYS", &[pattern])
    }

    /// Sets a time-to-live on a key. Returns true when the TTL was set.
    pub fn expire(&self, key: &[u8], ttl: Duration) -> ClientResult<bool> {
        let seconds = ttl.as_secs().to_string();
        Ok(self.integer("EXPIRE", &[key, seconds.as_bytes()])? == 1)
    }

    pub fn flushdb(&self) -> ClientResult<()> {
        self.ok("FLUSHDB", &[])
    }

    pub fn dbsize(&self) -> ClientResult<i64> {
        self.integer("DBSIZE", &[])
    }

    /// Fetches server INFO output.
    pub fn info(&self) -> ClientResult<Vec<u8>> {
        self.bulk("INFO", &[])?.ok_or(ClientError::UnexpectedResponse)
    }

    // ---- LIST ----

    pub fn lpush(&self, key: &[u8], values: &[&[u8]]) -> ClientResult<i64> {
        let mut args = vec![key];
        args.extend_from_slice(values);
        self.integer("LPUSH", &args)
    }

    pub fn rpush(&self, key: &[u8], values: &[&[u8]]) -> ClientResult<i64> {
        let mut args = vec![key];
        args.extend_from_slice(values);
        self.integer("RPUSH", &args)
    }

    pub fn lpop(&self, key: &[u8]) -> ClientResult<Option<Vec<u8>>> {
        self.bulk("LPOP", &[key])
    }

    pub fn rpop(&self, key: &[u8]) -> ClientResult<Option<Vec<u8>>> {
        self.bulk("RPOP", &[key])
    }

    pub fn llen(&self, key: &[u8]) -> ClientResult<i64> {
        self.integer("LLEN", &[key])
    }

    pub fn lrange(&self, key: &[u8], start: i64, stop: i64) -> ClientResult<Vec<Vec<u8>>> {
        let start = start.to_string();
        let stop = stop.to_string();
        self.array_of_bulks("LRANGE", &[key, start.as_bytes(), stop.as_bytes()])
    }

    // ---- SET ----

    pub fn sadd(&self, key: &[u8], members: &[&[u8]]) -> ClientResult<i64> {
        let mut args = vec![key];
        args.extend_from_slice(members);
        self.integer("SADD", &args)
    }

    pub fn srem(&self, key: &[u8], members: &[&[u8]]) -> ClientResult<i64> {
        let mut args = vec![key];
        args.extend_from_slice(members);
        self.integer("SREM", &args)
    }

    pub fn smembers(&self, key: &[u8]) -> ClientResult<Vec<Vec<u8>>> {
        self.array_of_bulks("SMEMBERS", &[key])
    }

    pub fn scard(&self, key: &[u8]) -> ClientResult<i64> {
        self.integer("SCARD", &[key])
    }

    pub fn sismember(&self, key: &[u8], member: &[u8]) -> ClientResult<bool> {
        Ok(self.integer("SISMEMBER", &[key, member])? == 1)
    }

    // ---- HASH ----

    pub fn hset(&self, key: &[u8], field: &[u8], value: &[u8]) -> ClientResult<bool> {
        Ok(self.integer("HSET", &[key, field, value])? == 1)
    }

    pub fn hget(&self, key: &[u8], field: &[u8]) -> ClientResult<Option<Vec<u8>>> {
        self.bulk("HGET", &[key, field])
    }

    pub fn hdel(&self, key: &[u8], fields: &[&[u8]]) -> ClientResult<i64> {
        let mut args = vec![key];
        args.extend_from_slice(fields);
        self.integer("HDEL", &args)
    }

    /// Returns `HGETALL`'s flattened field/value pairs.
    pub fn hgetall(&self, key: &[u8]) -> ClientResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let flat = self.array_of_bulks("HGETALL", &[key])?;
        Ok(flat.chunks_exact(2).map(|pair| (pair[0].clone(), pair[1].clone())).collect())
    }

    pub fn hkeys(&self, key: &[u8]) -> ClientResult<Vec<Vec<u8>>> {
        self.array_of_bulks("HKEYS", &[key])
    }

    pub fn hvals(&self, key: &[u8]) -> ClientResult<Vec<Vec<u8>>> {
        self.array_of_bulks("HVALS", &[key])
    }

    // ---- HyperLogLog ----

    pub fn hll_add(&self, key: &[u8], element: &[u8]) -> ClientResult<()> {
        self.integer("HLL.ADD", &[key, element]).map(|_| ())
    }

    pub fn hll_count(&self, key: &[u8]) -> ClientResult<i64> {
        self.integer("HLL.COUNT", &[key])
    }

    // ---- Pub/Sub ----

    pub fn publish(&self, channel: &[u8], message: &[u8]) -> ClientResult<i64> {
        self.integer("PUBLISH", &[channel, message])
    }

    // ---- Persistence ----

    pub fn save(&self) -> ClientResult<()> {
        self.ok("SAVE", &[])
    }

    pub fn load(&self) -> ClientResult<()> {
        self.ok("LOAD", &[])
    }
}
