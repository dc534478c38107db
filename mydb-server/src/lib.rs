//! # mydb-server
//!
//! The connection handler (C8), protocol codec (C7), cluster router
//! (C9), pub/sub broker (C10), request metrics (C12), and the blocking
//! accept loop built on top of `mydb-store::Database`. Exposed as a
//! library so integration tests can drive the real accept loop over a
//! loopback socket with `mydb-client`.

pub mod cluster;
pub mod connection;
pub mod metrics;
pub mod protocol;
pub mod pubsub;
pub mod server;
