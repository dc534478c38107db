//! # mydb-store
//!
//! The typed store (C2), TTL index (C3), HyperLogLog (C4), and the
//! `Database` facade that coordinates them with the cache engine (C1)
//! and persistence (C5/C6).

pub mod database;
pub mod hll;
pub mod ttl;
pub mod value;

pub use database::{Database, InfoSnapshot};
pub use hll::HyperLogLog;
pub use ttl::TtlIndex;
pub use value::{TypedStore, Value};
