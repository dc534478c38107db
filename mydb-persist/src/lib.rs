//! # Persistence
//!
//! Two independent durability paths, both grounded on
//! `examples/original_source/src/db.cpp`: the append-only command log
//! (C5, `aof`) and the encrypted whole-state snapshot (C6, `snapshot` +
//! `cipher`). Neither module knows about the storage types directly;
//! callers hand over plain records/documents and get them back.

pub mod aof;
pub mod cipher;
pub mod snapshot;

pub use aof::{AofRecord, AofWriter};
pub use snapshot::{SnapshotDocument, SnapshotError};
