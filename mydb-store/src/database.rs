//! # Database facade
//!
//! Ties together the cache engine (C1), typed store (C2), TTL index
//! (C3), HyperLogLog banks (C4), and persistence (C5/C6) behind the
//! full wire command surface. Grounded on
//! `examples/original_source/src/db.cpp`'s `DB` class, which plays the
//! same coordinating role over its own cache/list/HLL members.
//!
//! Non-cache state (`store`, `ttl`, `hlls`, the AOF
//! handle) is serialized by one coarse mutex; the cache engine keeps its
//! own internal mutex (`mydb_engine::CachePolicy`). A command that
//! touches both acquires the store mutex first and calls into the cache
//! while holding it — the two never nest the other way, so there is no
//! lock-order cycle.

use std::sync::Arc as StdArc;
use std::time::Duration;

use parking_lot::Mutex;
use wildmatch::WildMatch;

use mydb_common::{Config, MydbError, MydbResult};
use mydb_engine::CachePolicy;
use mydb_persist::aof::{AofRecord, AofWriter};
use mydb_persist::{cipher, snapshot};

use crate::hll::HyperLogLog;
use crate::ttl::TtlIndex;
use crate::value::TypedStore;

struct Inner {
    store: TypedStore,
    ttl: TtlIndex,
    hlls: std::collections::HashMap<Vec<u8>, HyperLogLog>,
    aof: AofWriter,
}

/// The `none|string|list|set|hash|zset` vocabulary TYPE replies with.
pub const TYPE_NONE: &str = "none";
pub const TYPE_STRING: &str = "string";

/// Point-in-time counters for the `INFO` command.
#[derive(Debug, Clone)]
pub struct InfoSnapshot {
    pub db_size: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub hit_ratio: f64,
}

pub struct Database {
    cache: CachePolicy,
    inner: Mutex<Inner>,
    config: Config,
    encryption_key: [u8; 32],
}

impl Database {
    /// Constructs a fresh engine, replaying the AOF at `config.aof_path`
    /// into the cache/typed-store/HLL state before accepting commands.
    pub fn open(config: Config) -> MydbResult<Self> {
        let cache = CachePolicy::new(config.cache_policy, config.cache_size);
        let mut store = TypedStore::new();
        let mut ttl = TtlIndex::new();
        let mut hlls: std::collections::HashMap<Vec<u8>, HyperLogLog> = std::collections::HashMap::new();
        let precision = config.hll_precision;

        let aof = AofWriter::open(&config.aof_path, |record: &AofRecord| {
            apply_replayed_record(&cache, &mut store, &mut ttl, &mut hlls, precision, record);
        })?;

        let encryption_key = cipher::resolve_key();

        Ok(Database {
            cache,
            inner: Mutex::new(Inner { store, ttl, hlls, aof }),
            config,
            encryption_key,
        })
    }

    fn log(&self, inner: &mut Inner, verb: &str, args: &[Vec<u8>]) {
        if let Err(err) = inner.aof.append(verb, args) {
            tracing::warn!(verb, error = %err, "AOF append failed");
        }
    }

    // ---- STRING ----

    pub fn get(&self, key: &[u8]) -> Option<StdArc<[u8]>> {
        self.cache.get(key)
    }

    pub fn set(&self, key: &[u8], value: &[u8]) {
        let mut inner = self.inner.lock();
        inner.store.delete(key);
        inner.ttl.clear_key(key);
        self.cache.put(StdArc::from(key), StdArc::from(value));
        self.log(&mut inner, "SET", &[key.to_vec(), value.to_vec()]);
    }

    pub fn incr(&self, key: &[u8]) -> MydbResult<i64> {
        self.incr_by(key, 1)
    }

    pub fn decr(&self, key: &[u8]) -> MydbResult<i64> {
        self.incr_by(key, -1)
    }

    fn incr_by(&self, key: &[u8], delta: i64) -> MydbResult<i64> {
        let mut inner = self.inner.lock();
        if inner.store.contains(key) {
            return Err(MydbError::WrongType);
        }
        let current = match self.cache.get(key) {
            Some(bytes) => std::str::from_utf8(&bytes)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or(MydbError::NotAnInteger)?,
            None => 0,
        };
        let next = current.saturating_add(delta);
        self.cache.put(StdArc::from(key), StdArc::from(next.to_string().as_bytes()));
        self.log(&mut inner, if delta >= 0 { "INCR" } else { "DECR" }, &[key.to_vec()]);
        Ok(next)
    }

    // ---- generic key ops ----

    pub fn del(&self, keys: &[Vec<u8>]) -> i64 {
        let mut inner = self.inner.lock();
        let mut removed = 0i64;
        for key in keys {
            let in_cache = self.cache.erase(key);
            let in_store = inner.store.delete(key);
            inner.ttl.clear_key(key);
            if in_cache || in_store {
                removed += 1;
                self.log(&mut inner, "DEL", std::slice::from_ref(key));
            }
        }
        removed
    }

    pub fn exists(&self, keys: &[Vec<u8>]) -> i64 {
        let inner = self.inner.lock();
        keys.iter()
            .filter(|key| self.cache.get(key).is_some() || inner.store.contains(key))
            .count() as i64
    }

    pub fn type_of(&self, key: &[u8]) -> &'static str {
        let inner = self.inner.lock();
        if let Some(type_name) = inner.store.type_of(key) {
            return type_name;
        }
        if self.cache.get(key).is_some() {
            return TYPE_STRING;
        }
        TYPE_NONE
    }

    /// Glob-matches `*`/`?` over the union of cache and typed-store keys.
    pub fn keys(&self, pattern: &[u8]) -> Vec<Vec<u8>> {
        let pattern = String::from_utf8_lossy(pattern);
        let matcher = WildMatch::new(&pattern);
        let inner = self.inner.lock();

        let mut out: Vec<Vec<u8>> = self
            .cache
            .items()
            .into_iter()
            .map(|entry| entry.key.to_vec())
            .chain(inner.store.keys())
            .filter(|key| matcher.matches(&String::from_utf8_lossy(key)))
            .collect();
        out.sort();
        out.dedup();
        out
    }

    pub fn expire(&self, key: &[u8], seconds: u64) -> bool {
        let mut inner = self.inner.lock();
        let ttl = Duration::from_secs(seconds);
        if self.cache.set_expiry(key, ttl) {
            return true;
        }
        if inner.store.contains(key) {
            inner.ttl.set(key, ttl);
            return true;
        }
        false
    }

    pub fn flushdb(&self) {
        let mut inner = self.inner.lock();
        self.cache.clear();
        inner.store.clear();
        inner.ttl.clear_all();
        inner.hlls.clear();
        self.log(&mut inner, "FLUSHDB", &[]);
    }

    pub fn dbsize(&self) -> i64 {
        let inner = self.inner.lock();
        (self.cache.len() + inner.store.len() + inner.hlls.len()) as i64
    }

    pub fn info(&self) -> InfoSnapshot {
        let stats = self.cache.stats();
        InfoSnapshot {
            db_size: self.dbsize() as usize,
            cache_hits: stats.hits,
            cache_misses: stats.misses,
            hit_ratio: stats.hit_ratio(),
        }
    }

    // ---- LIST ----

    pub fn lpush(&self, key: &[u8], values: &[Vec<u8>]) -> MydbResult<i64> {
        let mut inner = self.inner.lock();
        self.guard_against_string(key)?;
        let result = inner.store.lpush(key, values)?;
        let mut args = vec![key.to_vec()];
        args.extend(values.iter().cloned());
        self.log(&mut inner, "LPUSH", &args);
        Ok(result)
    }

    pub fn rpush(&self, key: &[u8], values: &[Vec<u8>]) -> MydbResult<i64> {
        let mut inner = self.inner.lock();
        self.guard_against_string(key)?;
        let result = inner.store.rpush(key, values)?;
        let mut args = vec![key.to_vec()];
        args.extend(values.iter().cloned());
        self.log(&mut inner, "RPUSH", &args);
        Ok(result)
    }

    pub fn lpop(&self, key: &[u8]) -> MydbResult<Option<Vec<u8>>> {
        let mut inner = self.inner.lock();
        self.expire_store_key_if_due(&mut inner, key);
        let popped = inner.store.lpop(key)?;
        if popped.is_some() {
            self.log(&mut inner, "LPOP", &[key.to_vec()]);
        }
        Ok(popped)
    }

    pub fn rpop(&self, key: &[u8]) -> MydbResult<Option<Vec<u8>>> {
        let mut inner = self.inner.lock();
        self.expire_store_key_if_due(&mut inner, key);
        let popped = inner.store.rpop(key)?;
        if popped.is_some() {
            self.log(&mut inner, "RPOP", &[key.to_vec()]);
        }
        Ok(popped)
    }

    pub fn llen(&self, key: &[u8]) -> MydbResult<i64> {
        let mut inner = self.inner.lock();
        self.expire_store_key_if_due(&mut inner, key);
        inner.store.llen(key)
    }

    pub fn lrange(&self, key: &[u8], start: i64, stop: i64) -> MydbResult<Vec<Vec<u8>>> {
        let mut inner = self.inner.lock();
        self.expire_store_key_if_due(&mut inner, key);
        inner.store.lrange(key, start, stop)
    }

    // ---- SET ----

    pub fn sadd(&self, key: &[u8], members: &[Vec<u8>]) -> MydbResult<i64> {
        let mut inner = self.inner.lock();
        self.guard_against_string(key)?;
        let added = inner.store.sadd(key, members)?;
        let mut args = vec![key.to_vec()];
        args.extend(members.iter().cloned());
        self.log(&mut inner, "SADD", &args);
        Ok(added)
    }

    pub fn srem(&self, key: &[u8], members: &[Vec<u8>]) -> MydbResult<i64> {
        let mut inner = self.inner.lock();
        let removed = inner.store.srem(key, members)?;
        let mut args = vec![key.to_vec()];
        args.extend(members.iter().cloned());
        self.log(&mut inner, "SREM", &args);
        Ok(removed)
    }

    pub fn smembers(&self, key: &[u8]) -> MydbResult<Vec<Vec<u8>>> {
        let mut inner = self.inner.lock();
        self.expire_store_key_if_due(&mut inner, key);
        inner.store.smembers(key)
    }

    pub fn scard(&self, key: &[u8]) -> MydbResult<i64> {
        let mut inner = self.inner.lock();
        self.expire_store_key_if_due(&mut inner, key);
        inner.store.scard(key)
    }

    pub fn sismember(&self, key: &[u8], member: &[u8]) -> MydbResult<bool> {
        let mut inner = self.inner.lock();
        self.expire_store_key_if_due(&mut inner, key);
        inner.store.sismember(key, member)
    }

    // ---- HASH ----

    pub fn hset(&self, key: &[u8], field: &[u8], value: &[u8]) -> MydbResult<bool> {
        let mut inner = self.inner.lock();
        self.guard_against_string(key)?;
        let was_new = inner.store.hset(key, field, value)?;
        self.log(&mut inner, "HSET", &[key.to_vec(), field.to_vec(), value.to_vec()]);
        Ok(was_new)
    }

    pub fn hget(&self, key: &[u8], field: &[u8]) -> MydbResult<Option<Vec<u8>>> {
        let mut inner = self.inner.lock();
        self.expire_store_key_if_due(&mut inner, key);
        inner.store.hget(key, field)
    }

    pub fn hdel(&self, key: &[u8], fields: &[Vec<u8>]) -> MydbResult<i64> {
        let mut inner = self.inner.lock();
        let removed = inner.store.hdel(key, fields)?;
        let mut args = vec![key.to_vec()];
        args.extend(fields.iter().cloned());
        self.log(&mut inner, "HDEL", &args);
        Ok(removed)
    }

    pub fn hgetall(&self, key: &[u8]) -> MydbResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut inner = self.inner.lock();
        self.expire_store_key_if_due(&mut inner, key);
        inner.store.hgetall(key)
    }

    pub fn hkeys(&self, key: &[u8]) -> MydbResult<Vec<Vec<u8>>> {
        let mut inner = self.inner.lock();
        self.expire_store_key_if_due(&mut inner, key);
        inner.store.hkeys(key)
    }

    pub fn hvals(&self, key: &[u8]) -> MydbResult<Vec<Vec<u8>>> {
        let mut inner = self.inner.lock();
        self.expire_store_key_if_due(&mut inner, key);
        inner.store.hvals(key)
    }

    // ---- HyperLogLog ----

    pub fn hll_add(&self, key: &[u8], element: &[u8]) {
        let mut inner = self.inner.lock();
        let precision = self.config.hll_precision;
        inner
            .hlls
            .entry(key.to_vec())
            .or_insert_with(|| HyperLogLog::new(precision))
            .add(element);
        self.log(&mut inner, "HLL.ADD", &[key.to_vec(), element.to_vec()]);
    }

    pub fn hll_count(&self, key: &[u8]) -> i64 {
        let inner = self.inner.lock();
        inner.hlls.get(key).map(|hll| hll.count()).unwrap_or(0)
    }

    fn expire_store_key_if_due(&self, inner: &mut Inner, key: &[u8]) {
        if inner.ttl.check_and_expire(key, std::time::Instant::now()) {
            inner.store.delete(key);
        }
    }

    fn guard_against_string(&self, key: &[u8]) -> MydbResult<()> {
        if self.cache.get(key).is_some() {
            return Err(MydbError::WrongType);
        }
        Ok(())
    }

    // ---- Persistence (C6) ----

    pub fn save(&self) -> MydbResult<()> {
        let mut inner = self.inner.lock();
        let mut document = snapshot::SnapshotDocument::new();

        for entry in self.cache.items() {
            document.put_string(
                String::from_utf8_lossy(&entry.key).into_owned(),
                &entry.value,
                &self.encryption_key,
            );
        }
        for (key, items) in inner.store.list_entries() {
            document.lists.insert(
                String::from_utf8_lossy(&key).into_owned(),
                items.into_iter().map(|item| String::from_utf8_lossy(&item).into_owned()).collect(),
            );
        }
        for (key, hll) in inner.hlls.iter() {
            document
                .hlls
                .insert(String::from_utf8_lossy(key).into_owned(), hll.registers().to_vec());
        }

        snapshot::save(&self.config.snapshot_path, &document, &self.encryption_key)
            .map_err(|err| MydbError::Snapshot(err.to_string()))?;
        inner.aof.truncate()?;
        Ok(())
    }

    pub fn load(&self) -> MydbResult<()> {
        let document = snapshot::load(&self.config.snapshot_path, &self.encryption_key)
            .map_err(|err| MydbError::Snapshot(err.to_string()))?;
        let strings = document
            .decrypt_strings(&self.encryption_key)
            .map_err(|err| MydbError::Snapshot(err.to_string()))?;

        let mut inner = self.inner.lock();
        self.cache.clear();
        inner.store.clear();
        inner.ttl.clear_all();
        inner.hlls.clear();

        for (key, value) in strings {
            self.cache.put(StdArc::from(key.into_bytes().as_slice()), StdArc::from(value.as_slice()));
        }
        for (key, items) in document.lists {
            let items: Vec<Vec<u8>> = items.into_iter().map(|item| item.into_bytes()).collect();
            inner.store.restore_list(key.into_bytes(), items);
        }
        for (key, registers) in document.hlls {
            inner
                .hlls
                .insert(key.into_bytes(), HyperLogLog::from_registers(self.config.hll_precision, registers));
        }

        Ok(())
    }
}

/// Applies one replayed AOF record directly to the pre-construction
/// state. Unknown verbs cannot occur here since `AofWriter` only
/// replays verbs `is_loggable` accepts, but malformed arities are
/// tolerated silently.
fn apply_replayed_record(
    cache: &CachePolicy,
    store: &mut TypedStore,
    ttl: &mut TtlIndex,
    hlls: &mut std::collections::HashMap<Vec<u8>, HyperLogLog>,
    hll_precision: u8,
    record: &AofRecord,
) {
    let _ = ttl;
    match record.verb.as_str() {
        "SET" if record.args.len() == 2 => {
            cache.put(StdArc::from(record.args[0].as_slice()), StdArc::from(record.args[1].as_slice()));
        }
        "DEL" => {
            for key in &record.args {
                cache.erase(key);
                store.delete(key);
            }
        }
        "LPUSH" if record.args.len() >= 2 => {
            let _ = store.lpush(&record.args[0], &record.args[1..]);
        }
        "RPUSH" if record.args.len() >= 2 => {
            let _ = store.rpush(&record.args[0], &record.args[1..]);
        }
        "LPOP" if record.args.len() == 1 => {
            let _ = store.lpop(&record.args[0]);
        }
        "RPOP" if record.args.len() == 1 => {
            let _ = store.rpop(&record.args[0]);
        }
        "HLL.ADD" if record.args.len() == 2 => {
            hlls
                .entry(record.args[0].clone())
                .or_insert_with(|| HyperLogLog::new(hll_precision))
                .add(&record.args[1]);
        }
        "INCR" | "DECR" if record.args.len() == 1 => {
            let delta = if record.verb == "INCR" { 1i64 } else { -1i64 };
            let current = cache
                .get(&record.args[0])
                .and_then(|bytes| std::str::from_utf8(&bytes).ok().and_then(|s| s.parse::<i64>().ok()))
                .unwrap_or(0);
            let next = current.saturating_add(delta);
            cache.put(StdArc::from(record.args[0].as_slice()), StdArc::from(next.to_string().as_bytes()));
        }
        "SADD" if record.args.len() >= 2 => {
            let _ = store.sadd(&record.args[0], &record.args[1..]);
        }
        "SREM" if record.args.len() >= 2 => {
            let _ = store.srem(&record.args[0], &record.args[1..]);
        }
        "HSET" if record.args.len() == 3 => {
            let _ = store.hset(&record.args[0], &record.args[1], &record.args[2]);
        }
        "HDEL" if record.args.len() >= 2 => {
            let _ = store.hdel(&record.args[0], &record.args[1..]);
        }
        "FLUSHDB" => {
            cache.clear();
            store.clear();
            hlls.clear();
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &std::path::Path, policy: mydb_common::CachePolicyName) -> Config {
        Config {
            cache_policy: policy,
            cache_size: 2,
            aof_path: dir.join("test.aof").to_string_lossy().into_owned(),
            snapshot_path: dir.join("test.snapshot").to_string_lossy().into_owned(),
            ..Config::default()
        }
    }

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("mydb-database-test-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn lru_eviction_order_matches_scenario_1() {
        let dir = temp_dir("scenario1");
        let db = Database::open(test_config(&dir, mydb_common::CachePolicyName::Lru)).unwrap();
        db.set(b"a", b"1");
        db.set(b"b", b"2");
        assert_eq!(db.get(b"a").as_deref(), Some(&b"1"[..]));
        db.set(b"c", b"3");
        assert_eq!(db.get(b"a").as_deref(), Some(&b"1"[..]));
        assert_eq!(db.get(b"b"), None);
        assert_eq!(db.get(b"c").as_deref(), Some(&b"3"[..]));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn ttl_expiry_matches_scenario_4() {
        let dir = temp_dir("scenario4");
        let db = Database::open(test_config(&dir, mydb_common::CachePolicyName::Lru)).unwrap();
        db.set(b"k", b"v");
        db.expire(b"k", 0);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(db.get(b"k"), None);
        assert_eq!(db.exists(&[b"k".to_vec()]), 0);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn type_mismatch_on_string_key_is_rejected() {
        let dir = temp_dir("typemismatch");
        let db = Database::open(test_config(&dir, mydb_common::CachePolicyName::Lru)).unwrap();
        db.set(b"k", b"v");
        assert!(matches!(db.lpush(b"k", &[b"x".to_vec()]), Err(MydbError::WrongType)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn save_then_load_preserves_strings_and_lists() {
        let dir = temp_dir("saveload");
        let db = Database::open(test_config(&dir, mydb_common::CachePolicyName::Lru)).unwrap();
        db.set(b"k", b"v");
        db.rpush(b"L", &[b"a".to_vec(), b"b".to_vec()]).unwrap();
        db.hll_add(b"h", b"elem");
        db.save().unwrap();

        let db2 = Database::open(test_config(&dir, mydb_common::CachePolicyName::Lru)).unwrap();
        db2.load().unwrap();
        assert_eq!(db2.get(b"k").as_deref(), Some(&b"v"[..]));
        assert_eq!(db2.lrange(b"L", 0, -1).unwrap(), vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(db2.hll_count(b"h"), 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn flushdb_clears_everything() {
        let dir = temp_dir("flushdb");
        let db = Database::open(test_config(&dir, mydb_common::CachePolicyName::Lru)).unwrap();
        db.set(b"k", b"v");
        db.rpush(b"L", &[b"a".to_vec()]).unwrap();
        db.flushdb();
        assert_eq!(db.dbsize(), 0);
        std::fs::remove_dir_all(&dir).ok();
    }
}
