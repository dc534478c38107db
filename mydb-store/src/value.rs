//! # Typed store (C2)
//!
//! Grounded on `examples/original_source/src/db.cpp` and
//! `include/data_types.h`: everything that is not a STRING lives here,
//! keyed alongside (never inside) the cache engine.
//! Every operation is total: type mismatch returns `MydbError::WrongType`
//! without mutating the map, so a type-mismatched operation leaves the
//! value bit-identical.
//!
//! ZSET is represented so `TYPE` and the five-variant model stay uniform,
//! but no wire command creates or mutates one; see
//! DESIGN.md.

use std::collections::{HashMap, HashSet, VecDeque};

use mydb_common::{MydbError, MydbResult};

#[derive(Debug, Clone)]
pub enum Value {
    List(VecDeque<Vec<u8>>),
    Set(HashSet<Vec<u8>>),
    Hash(HashMap<Vec<u8>, Vec<u8>>),
    Zset(Vec<(Vec<u8>, f64)>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Hash(_) => "hash",
            Value::Zset(_) => "zset",
        }
    }
}

/// Owns every non-STRING value. One coarse lock at the `Database` layer
/// guards this alongside the cache engine, so methods here take `&mut
/// self` freely with no internal locking of their own.
#[derive(Default)]
pub struct TypedStore {
    values: HashMap<Vec<u8>, Value>,
}

impl TypedStore {
    pub fn new() -> Self {
        TypedStore::default()
    }

    pub fn type_of(&self, key: &[u8]) -> Option<&'static str> {
        self.values.get(key).map(Value::type_name)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.values.contains_key(key)
    }

    pub fn delete(&mut self, key: &[u8]) -> bool {
        self.values.remove(key).is_some()
    }

    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.values.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    fn list_mut(&mut self, key: &[u8]) -> MydbResult<Option<&mut VecDeque<Vec<u8>>>> {
        match self.values.get_mut(key) {
            Some(Value::List(list)) => Ok(Some(list)),
            Some(_) => Err(MydbError::WrongType),
            None => Ok(None),
        }
    }

    /// Prepends `values` in order reversed (`LPUSH k a b` yields `[b,a,
    /// ...existing]`).
    pub fn lpush(&mut self, key: &[u8], values: &[Vec<u8>]) -> MydbResult<i64> {
        if let Some(Value::List(_)) | None = self.values.get(key) {
        } else {
            return Err(MydbError::WrongType);
        }
        let list = self
            .values
            .entry(key.to_vec())
            .or_insert_with(|| Value::List(VecDeque::new()));
        let list = match list {
            Value::List(list) => list,
            _ => unreachable!("type checked above"),
        };
        for value in values {
            list.push_front(value.clone());
        }
        Ok(list.len() as i64)
    }

    pub fn rpush(&mut self, key: &[u8], values: &[Vec<u8>]) -> MydbResult<i64> {
        if let Some(Value::List(_)) | None = self.values.get(key) {
        } else {
            return Err(MydbError::WrongType);
        }
        let list = self
            .values
            .entry(key.to_vec())
            .or_insert_with(|| Value::List(VecDeque::new()));
        let list = match list {
            Value::List(list) => list,
            _ => unreachable!("type checked above"),
        };
        for value in values {
            list.push_back(value.clone());
        }
        Ok(list.len() as i64)
    }

    pub fn lpop(&mut self, key: &[u8]) -> MydbResult<Option<Vec<u8>>> {
        let popped = match self.list_mut(key)? {
            Some(list) => list.pop_front(),
            None => return Ok(None),
        };
        self.delete_if_empty_list(key);
        Ok(popped)
    }

    pub fn rpop(&mut self, key: &[u8]) -> MydbResult<Option<Vec<u8>>> {
        let popped = match self.list_mut(key)? {
            Some(list) => list.pop_back(),
            None => return Ok(None),
        };
        self.delete_if_empty_list(key);
        Ok(popped)
    }

    fn delete_if_empty_list(&mut self, key: &[u8]) {
        if matches!(self.values.get(key), Some(Value::List(list)) if list.is_empty()) {
            self.values.remove(key);
        }
    }

    pub fn llen(&self, key: &[u8]) -> MydbResult<i64> {
        match self.values.get(key) {
            Some(Value::List(list)) => Ok(list.len() as i64),
            Some(_) => Err(MydbError::WrongType),
            None => Ok(0),
        }
    }

    /// Inclusive indices with negative-from-end semantics, clamped to
    /// `[0, size-1]`; an inverted or out-of-range window yields empty.
    pub fn lrange(&self, key: &[u8], start: i64, stop: i64) -> MydbResult<Vec<Vec<u8>>> {
        let list = match self.values.get(key) {
            Some(Value::List(list)) => list,
            Some(_) => return Err(MydbError::WrongType),
            None => return Ok(Vec::new()),
        };
        let len = list.len() as i64;
        if len == 0 {
            return Ok(Vec::new());
        }

        let normalize = |idx: i64| -> i64 {
            if idx < 0 {
                (len + idx).max(0)
            } else {
                idx
            }
        };
        let start = normalize(start).min(len - 1).max(0);
        let stop = normalize(stop).min(len - 1);

        if stop < start {
            return Ok(Vec::new());
        }
        Ok(list
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .collect())
    }

    pub fn sadd(&mut self, key: &[u8], members: &[Vec<u8>]) -> MydbResult<i64> {
        if let Some(Value::Set(_)) | None = self.values.get(key) {
        } else {
            return Err(MydbError::WrongType);
        }
        let set = self
            .values
            .entry(key.to_vec())
            .or_insert_with(|| Value::Set(HashSet::new()));
        let set = match set {
            Value::Set(set) => set,
            _ => unreachable!("type checked above"),
        };
        let mut added = 0i64;
        for member in members {
            if set.insert(member.clone()) {
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn srem(&mut self, key: &[u8], members: &[Vec<u8>]) -> MydbResult<i64> {
        let set = match self.values.get_mut(key) {
            Some(Value::Set(set)) => set,
            Some(_) => return Err(MydbError::WrongType),
            None => return Ok(0),
        };
        let mut removed = 0i64;
        for member in members {
            if set.remove(member) {
                removed += 1;
            }
        }
        if matches!(self.values.get(key), Some(Value::Set(set)) if set.is_empty()) {
            self.values.remove(key);
        }
        Ok(removed)
    }

    pub fn smembers(&self, key: &[u8]) -> MydbResult<Vec<Vec<u8>>> {
        match self.values.get(key) {
            Some(Value::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(MydbError::WrongType),
            None => Ok(Vec::new()),
        }
    }

    pub fn scard(&self, key: &[u8]) -> MydbResult<i64> {
        match self.values.get(key) {
            Some(Value::Set(set)) => Ok(set.len() as i64),
            Some(_) => Err(MydbError::WrongType),
            None => Ok(0),
        }
    }

    pub fn sismember(&self, key: &[u8], member: &[u8]) -> MydbResult<bool> {
        match self.values.get(key) {
            Some(Value::Set(set)) => Ok(set.contains(member)),
            Some(_) => Err(MydbError::WrongType),
            None => Ok(false),
        }
    }

    /// Sets a field unconditionally; returns `true` when the field is new.
    pub fn hset(&mut self, key: &[u8], field: &[u8], value: &[u8]) -> MydbResult<bool> {
        if let Some(Value::Hash(_)) | None = self.values.get(key) {
        } else {
            return Err(MydbError::WrongType);
        }
        let hash = self
            .values
            .entry(key.to_vec())
            .or_insert_with(|| Value::Hash(HashMap::new()));
        let hash = match hash {
            Value::Hash(hash) => hash,
            _ => unreachable!("type checked above"),
        };
        Ok(hash.insert(field.to_vec(), value.to_vec()).is_none())
    }

    pub fn hget(&self, key: &[u8], field: &[u8]) -> MydbResult<Option<Vec<u8>>> {
        match self.values.get(key) {
            Some(Value::Hash(hash)) => Ok(hash.get(field).cloned()),
            Some(_) => Err(MydbError::WrongType),
            None => Ok(None),
        }
    }

    pub fn hdel(&mut self, key: &[u8], fields: &[Vec<u8>]) -> MydbResult<i64> {
        let hash = match self.values.get_mut(key) {
            Some(Value::Hash(hash)) => hash,
            Some(_) => return Err(MydbError::WrongType),
            None => return Ok(0),
        };
        let mut removed = 0i64;
        for field in fields {
            if hash.remove(field).is_some() {
                removed += 1;
            }
        }
        if matches!(self.values.get(key), Some(Value::Hash(hash)) if hash.is_empty()) {
            self.values.remove(key);
        }
        Ok(removed)
    }

    pub fn hgetall(&self, key: &[u8]) -> MydbResult<Vec<(Vec<u8>, Vec<u8>)>> {
        match self.values.get(key) {
            Some(Value::Hash(hash)) => Ok(hash.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            Some(_) => Err(MydbError::WrongType),
            None => Ok(Vec::new()),
        }
    }

    pub fn hkeys(&self, key: &[u8]) -> MydbResult<Vec<Vec<u8>>> {
        match self.values.get(key) {
            Some(Value::Hash(hash)) => Ok(hash.keys().cloned().collect()),
            Some(_) => Err(MydbError::WrongType),
            None => Ok(Vec::new()),
        }
    }

    pub fn hvals(&self, key: &[u8]) -> MydbResult<Vec<Vec<u8>>> {
        match self.values.get(key) {
            Some(Value::Hash(hash)) => Ok(hash.values().cloned().collect()),
            Some(_) => Err(MydbError::WrongType),
            None => Ok(Vec::new()),
        }
    }

    /// Rebuilds a list entry from a snapshot (LOAD path).
    pub fn restore_list(&mut self, key: Vec<u8>, items: Vec<Vec<u8>>) {
        self.values.insert(key, Value::List(items.into_iter().collect()));
    }

    /// Snapshots every list entry for SAVE, as `(key, items)` pairs.
    pub fn list_entries(&self) -> Vec<(Vec<u8>, Vec<Vec<u8>>)> {
        self.values
            .iter()
            .filter_map(|(k, v)| match v {
                Value::List(list) => Some((k.clone(), list.iter().cloned().collect())),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_semantics_match_scenario_5() {
        let mut store = TypedStore::new();
        store.rpush(b"L", &[b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]).unwrap();
        assert_eq!(
            store.lrange(b"L", 0, -1).unwrap(),
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]
        );
        assert_eq!(store.lpop(b"L").unwrap(), Some(b"a".to_vec()));
        assert_eq!(store.llen(b"L").unwrap(), 2);
    }

    #[test]
    fn lpush_reverses_input_order() {
        let mut store = TypedStore::new();
        store.lpush(b"k", &[b"a".to_vec(), b"b".to_vec()]).unwrap();
        assert_eq!(store.lrange(b"k", 0, -1).unwrap(), vec![b"b".to_vec(), b"a".to_vec()]);
    }

    #[test]
    fn type_mismatch_leaves_value_untouched() {
        let mut store = TypedStore::new();
        store.sadd(b"k", &[b"member".to_vec()]).unwrap();
        assert!(matches!(store.lpush(b"k", &[b"x".to_vec()]), Err(MydbError::WrongType)));
        assert_eq!(store.smembers(b"k").unwrap(), vec![b"member".to_vec()]);
    }

    #[test]
    fn popping_the_last_element_deletes_the_key() {
        let mut store = TypedStore::new();
        store.rpush(b"k", &[b"only".to_vec()]).unwrap();
        store.lpop(b"k").unwrap();
        assert!(!store.contains(b"k"));
    }

    #[test]
    fn hash_operations_delete_key_when_emptied() {
        let mut store = TypedStore::new();
        store.hset(b"h", b"f1", b"v1").unwrap();
        store.hset(b"h", b"f2", b"v2").unwrap();
        assert_eq!(store.hdel(b"h", &[b"f1".to_vec()]).unwrap(), 1);
        assert!(store.contains(b"h"));
        assert_eq!(store.hdel(b"h", &[b"f2".to_vec()]).unwrap(), 1);
        assert!(!store.contains(b"h"));
    }
}
