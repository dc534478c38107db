//! # mydb-engine
//!
//! The three eviction engines (LRU, LFU, ARC) over `Arc<[u8]>` string
//! values, unified behind a tagged-variant dispatcher (`CachePolicy`)
//! rather than trait objects, per the "polymorphic cache interface"
//! design note: the three engines share one narrow capability set, so a
//! closed enum is a better fit than open inheritance.

mod arc;
mod lfu;
mod lru;
mod policy;

pub use arc::ArcCache;
pub use lfu::LfuCache;
pub use lru::LruCache;
pub use policy::{CachePolicy, CacheStats, Entry};
