//! # Error taxonomy
//!
//! One `thiserror`-derived enum shared by the engine, store, and
//! persistence crates, matching the error classes of the protocol design
//! (protocol, type, not-found, persistence, forwarding, fatal).

use thiserror::Error;

/// Result alias used throughout the `mydb-*` library crates.
pub type MydbResult<T> = Result<T, MydbError>;

/// Errors surfaced by the cache-and-durability core.
///
/// Connection handling maps each variant to a RESP reply; nothing here
/// carries connection state, so the same error type is reusable from the
/// engine, the store, and the persistence layer.
#[derive(Debug, Error)]
pub enum MydbError {
    /// Read/write against a key whose stored type does not match the
    /// operation. No mutation occurs when this is returned.
    #[error("WRONGTYPE operation against a key holding the wrong kind of value")]
    WrongType,

    /// The requested key does not exist, or has lazily expired.
    #[error("key not found")]
    NotFound,

    /// A value could not be parsed as the type an operation requires
    /// (e.g. INCR/DECR against a non-integer string).
    #[error("value is not a valid integer")]
    NotAnInteger,

    /// AOF append or replay failed.
    #[error("AOF error: {0}")]
    Aof(String),

    /// Snapshot read, decrypt, or parse failed.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure in the snapshot codec.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
