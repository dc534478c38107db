//! # Tagged-variant cache dispatcher
//!
//! The three engines
//! share one narrow capability set. `CachePolicy` is a closed enum over
//! the three concrete states, not a trait object, and owns the single
//! coarse mutex held for the duration of a mutator or reader.

use std::sync::Arc as StdArc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::arc::ArcCache;
use crate::lfu::LfuCache;
use crate::lru::LruCache;
use mydb_common::config::CachePolicyName;

/// A resident (key, value) snapshot, used by `items()`, SAVE, and KEYS.
#[derive(Debug, Clone)]
pub struct Entry {
    pub key: StdArc<[u8]>,
    pub value: StdArc<[u8]>,
}

/// Hit/miss/eviction counters, aggregated into INFO's `cache_hits`,
/// `cache_misses`, and `hit_ratio` fields.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub hit_latency: Duration,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

enum Inner {
    Lru(LruCache),
    Lfu(LfuCache),
    Arc(ArcCache),
}

/// A single eviction engine instance, chosen by `cache_policy` at
/// construction and serialized behind one mutex for its whole lifetime.
pub struct CachePolicy {
    inner: Mutex<Inner>,
}

impl CachePolicy {
    pub fn new(name: CachePolicyName, capacity: usize) -> Self {
        let inner = match name {
            CachePolicyName::Lru | CachePolicyName::Enhanced => Inner::Lru(LruCache::new(capacity)),
            CachePolicyName::Lfu => Inner::Lfu(LfuCache::new(capacity)),
            CachePolicyName::Arc => Inner::Arc(ArcCache::new(capacity)),
        };
        CachePolicy {
            inner: Mutex::new(inner),
        }
    }

    pub fn put(&self, key: StdArc<[u8]>, value: StdArc<[u8]>) {
        let mut guard = self.inner.lock();
        match &mut *guard {
            Inner::Lru(c) => c.put(key, value),
            Inner::Lfu(c) => c.put(key, value),
            Inner::Arc(c) => c.put(key, value),
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<StdArc<[u8]>> {
        let mut guard = self.inner.lock();
        match &mut *guard {
            Inner::Lru(c) => c.get(key),
            Inner::Lfu(c) => c.get(key),
            Inner::Arc(c) => c.get(key),
        }
    }

    pub fn erase(&self, key: &[u8]) -> bool {
        let mut guard = self.inner.lock();
        match &mut *guard {
            Inner::Lru(c) => c.erase(key),
            Inner::Lfu(c) => c.erase(key),
            Inner::Arc(c) => c.erase(key),
        }
    }

    pub fn clear(&self) {
        let mut guard = self.inner.lock();
        match &mut *guard {
            Inner::Lru(c) => c.clear(),
            Inner::Lfu(c) => c.clear(),
            Inner::Arc(c) => c.clear(),
        }
    }

    pub fn set_expiry(&self, key: &[u8], ttl: Duration) -> bool {
        let mut guard = self.inner.lock();
        match &mut *guard {
            Inner::Lru(c) => c.set_expiry(key, ttl),
            Inner::Lfu(c) => c.set_expiry(key, ttl),
            Inner::Arc(c) => c.set_expiry(key, ttl),
        }
    }

    /// Remaining TTL for a resident key, or `None` when the key is
    /// missing. An inner `Some(None)` means resident without expiry.
    pub fn expiry(&self, key: &[u8]) -> Option<Option<std::time::Instant>> {
        let guard = self.inner.lock();
        match &*guard {
            Inner::Lru(c) => c.expiry(key),
            Inner::Lfu(c) => c.expiry(key),
            Inner::Arc(c) => c.expiry(key),
        }
    }

    pub fn items(&self) -> Vec<Entry> {
        let guard = self.inner.lock();
        match &*guard {
            Inner::Lru(c) => c.items(),
            Inner::Lfu(c) => c.items(),
            Inner::Arc(c) => c.items(),
        }
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.lock();
        match &*guard {
            Inner::Lru(c) => c.len(),
            Inner::Lfu(c) => c.len(),
            Inner::Arc(c) => c.len(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        let guard = self.inner.lock();
        match &*guard {
            Inner::Lru(c) => c.stats(),
            Inner::Lfu(c) => c.stats(),
            Inner::Arc(c) => c.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_to_selected_policy() {
        let policy = CachePolicy::new(CachePolicyName::Lru, 2);
        policy.put(StdArc::from(&b"a"[..]), StdArc::from(&b"1"[..]));
        assert_eq!(policy.get(b"a").as_deref(), Some(&b"1"[..]));
        assert_eq!(policy.len(), 1);
    }
}
