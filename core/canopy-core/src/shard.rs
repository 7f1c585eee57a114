//! Key-partitioned map used by the in-process caches.
//!
//! A key's hash picks one of `SHARD_COUNT` shards; each shard has its own
//! `RwLock`, so writers on distinct keys rarely touch the same lock.
//! Poisoned locks are recovered: a cache entry is never worth a panic.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

const SHARD_COUNT: usize = 16;

pub struct ShardedMap<V> {
    shards: Vec<RwLock<HashMap<String, V>>>,
}

impl<V: Clone> Default for ShardedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> ShardedMap<V> {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT)
                .map(|_| RwLock::new(HashMap::new()))
                .collect(),
        }
    }

    pub fn from_map(entries: HashMap<String, V>) -> Self {
        let map = Self::new();
        for (key, value) in entries {
            map.insert(key, value);
        }
        map
    }

    fn shard_index(key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % SHARD_COUNT
    }

    fn read(&self, key: &str) -> RwLockReadGuard<'_, HashMap<String, V>> {
        self.shards[Self::shard_index(key)]
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self, key: &str) -> RwLockWriteGuard<'_, HashMap<String, V>> {
        self.shards[Self::shard_index(key)]
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.read(key).get(key).cloned()
    }

    pub fn insert(&self, key: String, value: V) -> Option<V> {
        let mut shard = self.write(&key);
        shard.insert(key, value)
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.write(key).remove(key)
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            shard
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clear();
        }
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| {
                shard
                    .read()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .len()
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point-in-time copy of every entry, shard by shard.
    pub fn snapshot(&self) -> HashMap<String, V> {
        let mut out = HashMap::new();
        for shard in &self.shards {
            let guard = shard.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            out.extend(guard.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn insert_get_remove() {
        let map = ShardedMap::new();
        assert_eq!(map.insert("a".to_string(), 1), None);
        assert_eq!(map.insert("a".to_string(), 2), Some(1));
        assert_eq!(map.get("a"), Some(2));
        assert_eq!(map.remove("a"), Some(2));
        assert!(map.get("a").is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn concurrent_writes_to_distinct_keys_all_land() {
        let map = Arc::new(ShardedMap::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let map = Arc::clone(&map);
                thread::spawn(move || {
                    for i in 0..100 {
                        map.insert(format!("{}-{}", t, i), i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(map.len(), 800);
        assert_eq!(map.get("7-99"), Some(99));
        assert_eq!(map.snapshot().len(), 800);
    }

    #[test]
    fn clear_empties_every_shard() {
        let map = ShardedMap::from_map((0..50).map(|i| (i.to_string(), i)).collect());
        assert_eq!(map.len(), 50);
        map.clear();
        assert!(map.is_empty());
    }
}
