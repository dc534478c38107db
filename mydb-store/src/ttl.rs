//! # TTL index
//!
//! A deadline-per-key map for the typed-store's non-string types (lists,
//! sets, hashes, zsets, HLL banks) — string TTLs are tracked inside the
//! cache engine itself. Expiry is enforced lazily, at read time, never
//! by a background sweep.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Deadline map shared by every non-cached key in the typed store.
#[derive(Default)]
pub struct TtlIndex {
    deadlines: HashMap<Vec<u8>, Instant>,
}

impl TtlIndex {
    pub fn new() -> Self {
        TtlIndex::default()
    }

    pub fn set(&mut self, key: &[u8], ttl: Duration) {
        self.deadlines.insert(key.to_vec(), Instant::now() + ttl);
    }

    /// Returns `true` and erases the deadline entry when the key has an
    /// expired deadline at `now`. Callers must still remove the key's
    /// value from its owning map.
    pub fn check_and_expire(&mut self, key: &[u8], now: Instant) -> bool {
        match self.deadlines.get(key) {
            Some(deadline) if *deadline <= now => {
                self.deadlines.remove(key);
                true
            }
            _ => false,
        }
    }

    pub fn remaining(&self, key: &[u8]) -> Option<Duration> {
        let deadline = *self.deadlines.get(key)?;
        Some(deadline.saturating_duration_since(Instant::now()))
    }

    pub fn has_deadline(&self, key: &[u8]) -> bool {
        self.deadlines.contains_key(key)
    }

    pub fn clear_key(&mut self, key: &[u8]) {
        self.deadlines.remove(key);
    }

    pub fn clear_all(&mut self) {
        self.deadlines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_expiry_after_deadline() {
        let mut ttl = TtlIndex::new();
        ttl.set(b"k", Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(ttl.check_and_expire(b"k", Instant::now()));
        assert!(!ttl.has_deadline(b"k"));
    }

    #[test]
    fn untracked_key_never_expires() {
        let mut ttl = TtlIndex::new();
        assert!(!ttl.check_and_expire(b"missing", Instant::now()));
    }
}
