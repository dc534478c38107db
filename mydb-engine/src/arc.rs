//! # ARC (Adaptive Replacement Cache) engine
//!
//! Classic T1/T2/B1/B2 ARC state machine with an adaptive target size
//! `p`. The "new key" branch here follows the `|T1|+|T2|+|B1|+|B2| ≥ C`
//! / pop-B2-tail condition (see DESIGN.md for the corner case where this
//! diverges from a stricter `|T1|+|T2| = C` / pop-B1 reading).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc as StdArc;
use std::time::{Duration, Instant};

use crate::policy::{CacheStats, Entry};

struct Resident {
    value: StdArc<[u8]>,
    expires_at: Option<Instant>,
}

/// Adaptive Replacement Cache with capacity `C`.
pub struct ArcCache {
    capacity: usize,
    p: usize,
    t1: VecDeque<StdArc<[u8]>>,
    t2: VecDeque<StdArc<[u8]>>,
    b1: VecDeque<StdArc<[u8]>>,
    b2: VecDeque<StdArc<[u8]>>,
    residents: HashMap<StdArc<[u8]>, Resident>,
    stats: CacheStats,
}

fn remove_from(deque: &mut VecDeque<StdArc<[u8]>>, key: &[u8]) -> bool {
    if let Some(pos) = deque.iter().position(|k| k.as_ref() == key) {
        deque.remove(pos);
        true
    } else {
        false
    }
}

impl ArcCache {
    pub fn new(capacity: usize) -> Self {
        ArcCache {
            capacity,
            p: 0,
            t1: VecDeque::new(),
            t2: VecDeque::new(),
            b1: VecDeque::new(),
            b2: VecDeque::new(),
            residents: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.t1.len() + self.t2.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    /// `p` target, exposed for tests of the adaptation formula.
    pub fn target_p(&self) -> usize {
        self.p
    }

    /// Moves the resident tail of the over-sized list into the matching
    /// ghost list's head.
    fn replace(&mut self) {
        if self.t1.len() > self.p {
            if let Some(evicted) = self.t1.pop_back() {
                self.residents.remove(&evicted);
                self.b1.push_front(evicted);
                self.stats.evictions += 1;
            }
        } else if let Some(evicted) = self.t2.pop_back() {
            self.residents.remove(&evicted);
            self.b2.push_front(evicted);
            self.stats.evictions += 1;
        }
    }

    fn install_t2_front(&mut self, key: StdArc<[u8]>, value: StdArc<[u8]>) {
        self.residents.insert(
            StdArc::clone(&key),
            Resident {
                value,
                expires_at: None,
            },
        );
        self.t2.push_front(key);
    }

    pub fn put(&mut self, key: StdArc<[u8]>, value: StdArc<[u8]>) {
        if self.capacity == 0 {
            return;
        }

        // Case I: resident hit in T1 or T2.
        if remove_from(&mut self.t1, &key) || remove_from(&mut self.t2, &key) {
            self.stats.hits += 1;
            self.install_t2_front(key, value);
            return;
        }

        // Case II: ghost hit in B1. The ratio uses |B1| as it stood with
        // the hit key still counted, so it's computed before removing it.
        if self.b1.iter().any(|k| k.as_ref() == key.as_ref()) {
            self.stats.misses += 1;
            let ratio = self.b2.len() / self.b1.len().max(1);
            self.p = (self.p + ratio.max(1)).min(self.capacity);
            remove_from(&mut self.b1, &key);
            self.replace();
            self.install_t2_front(key, value);
            return;
        }

        // Case III: ghost hit in B2, symmetric to case II.
        if self.b2.iter().any(|k| k.as_ref() == key.as_ref()) {
            self.stats.misses += 1;
            let ratio = self.b1.len() / self.b2.len().max(1);
            self.p = self.p.saturating_sub(ratio.max(1));
            remove_from(&mut self.b2, &key);
            self.replace();
            self.install_t2_front(key, value);
            return;
        }

        // Case IV: brand-new key.
        self.stats.misses += 1;
        if self.t1.len() + self.b1.len() == self.capacity {
            if self.t1.len() < self.capacity {
                if let Some(evicted) = self.b1.pop_back() {
                    self.residents.remove(&evicted);
                }
                self.replace();
            } else if let Some(evicted) = self.t1.pop_back() {
                self.residents.remove(&evicted);
                self.stats.evictions += 1;
            }
        } else if self.t1.len() + self.t2.len() + self.b1.len() + self.b2.len() >= self.capacity {
            if self.t1.len() + self.t2.len() + self.b1.len() + self.b2.len() == 2 * self.capacity {
                self.b2.pop_back();
            }
            self.replace();
        }

        self.residents.insert(
            StdArc::clone(&key),
            Resident {
                value,
                expires_at: None,
            },
        );
        self.t1.push_front(key);

        if self.t1.len() + self.t2.len() > self.capacity {
            self.replace();
        }
    }

    /// Symmetric read-only case: resident hits promote to T2; ghost hits
    /// cannot be satisfied without a value to install, so they miss.
    pub fn get(&mut self, key: &[u8]) -> Option<StdArc<[u8]>> {
        let now = Instant::now();
        let in_t1 = self.t1.iter().any(|k| k.as_ref() == key);
        let in_t2 = !in_t1 && self.t2.iter().any(|k| k.as_ref() == key);

        if in_t1 || in_t2 {
            let expired = self
                .residents
                .get(key)
                .map(|r| matches!(r.expires_at, Some(d) if now >= d))
                .unwrap_or(false);
            if expired {
                remove_from(&mut self.t1, key);
                remove_from(&mut self.t2, key);
                self.residents.remove(key);
                self.stats.misses += 1;
                return None;
            }

            let owned_key = self.residents.get_key_value(key).unwrap().0.clone();
            remove_from(&mut self.t1, key);
            remove_from(&mut self.t2, key);
            let value = StdArc::clone(&self.residents.get(key).unwrap().value);
            self.t2.push_front(owned_key);
            self.stats.hits += 1;
            Some(value)
        } else {
            self.stats.misses += 1;
            None
        }
    }

    pub fn erase(&mut self, key: &[u8]) -> bool {
        let removed = remove_from(&mut self.t1, key)
            || remove_from(&mut self.t2, key)
            || remove_from(&mut self.b1, key)
            || remove_from(&mut self.b2, key);
        self.residents.remove(key);
        removed
    }

    pub fn clear(&mut self) {
        self.t1.clear();
        self.t2.clear();
        self.b1.clear();
        self.b2.clear();
        self.residents.clear();
        self.p = 0;
    }

    pub fn set_expiry(&mut self, key: &[u8], ttl: Duration) -> bool {
        match self.residents.get_mut(key) {
            Some(res) => {
                res.expires_at = Some(Instant::now() + ttl);
                true
            }
            None => false,
        }
    }

    pub fn expiry(&self, key: &[u8]) -> Option<Option<Instant>> {
        self.residents.get(key).map(|r| r.expires_at)
    }

    pub fn items(&self) -> Vec<Entry> {
        self.t1
            .iter()
            .chain(self.t2.iter())
            .filter_map(|k| {
                self.residents.get(k).map(|r| Entry {
                    key: StdArc::clone(k),
                    value: StdArc::clone(&r.value),
                })
            })
            .collect()
    }

    /// Checks the four size invariants; used by tests.
    #[cfg(test)]
    fn check_invariants(&self) {
        let c = self.capacity;
        assert!(self.t1.len() + self.t2.len() <= c);
        assert!(self.t1.len() + self.b1.len() <= c);
        assert!(self.t2.len() + self.b2.len() <= 2 * c);
        assert!(self.t1.len() + self.t2.len() + self.b1.len() + self.b2.len() <= 2 * c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> StdArc<[u8]> {
        StdArc::from(s.as_bytes())
    }

    #[test]
    fn ghost_promotion_matches_scenario_3() {
        let mut cache = ArcCache::new(2);
        cache.put(key("a"), key("1"));
        cache.put(key("b"), key("2"));
        cache.put(key("c"), key("3")); // evicts a into b1
        cache.put(key("d"), key("4")); // evicts b into b1
        cache.put(key("a"), key("5")); // ghost hit in b1, a enters T2

        assert_eq!(cache.get(b"a").as_deref(), Some(&b"5"[..]));
        cache.check_invariants();
    }

    #[test]
    fn invariants_hold_across_random_churn() {
        let mut cache = ArcCache::new(4);
        for i in 0..50 {
            let k = format!("k{}", i % 11);
            cache.put(key(&k), key("v"));
            cache.check_invariants();
            if i % 3 == 0 {
                cache.get(k.as_bytes());
                cache.check_invariants();
            }
        }
    }

    #[test]
    fn capacity_zero_is_a_no_op() {
        let mut cache = ArcCache::new(0);
        cache.put(key("a"), key("1"));
        assert_eq!(cache.get(b"a"), None);
    }

    #[test]
    fn b1_ghost_hit_adapts_p_using_the_ratio_before_removal() {
        // Drives the cache to |B1| = |B2| = 2, then hits a B1 ghost.
        // At that ratio, using |B1| before removal (2) gives p += 1;
        // using |B1| after removal (1) would instead give p += 2 — the
        // two readings only disagree once both ghost lists are nonempty.
        let mut cache = ArcCache::new(4);
        cache.put(key("a"), key("1"));
        cache.put(key("b"), key("2"));
        cache.put(key("c"), key("3"));
        cache.put(key("d"), key("4"));
        cache.put(key("d"), key("4b")); // hit, d moves to T2
        cache.put(key("e"), key("5")); // new key, evicts a: T1 -> B1
        cache.put(key("b"), key("2b")); // hit, b moves to T2
        cache.put(key("f"), key("6")); // new key, evicts c: T1 -> B1, |B1| = {c, a}
        cache.put(key("f"), key("6b")); // hit, f moves to T2
        cache.put(key("e"), key("5b")); // hit, e moves to T2, T1 now empty
        cache.put(key("g"), key("7")); // new key, evicts d: T2 -> B2
        cache.put(key("g"), key("7b")); // hit, g moves to T2, T1 empty again
        cache.put(key("h"), key("8")); // new key, evicts b: T2 -> B2, |B2| = {b, d}

        assert_eq!(cache.target_p(), 0);
        cache.put(key("c"), key("9")); // ghost hit in B1, |B1| = |B2| = 2
        assert_eq!(cache.target_p(), 1);
        cache.check_invariants();
    }
}
