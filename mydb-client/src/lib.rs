//! # mydb sync client
//!
//! Provide a lightweight, synchronous client with connection pooling to
//! minimize TCP handshake overhead against a `mydb-server` instance.

mod client;
mod pool;
mod resp;

pub use client::{ClientConfig, ClientError, ClientResult, KVClient};
