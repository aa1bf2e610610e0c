//! Bounded recency cache for lexicon and document-length lookups.

use std::collections::VecDeque;
use std::hash::Hash;

use ahash::AHashMap;

/// A bounded map that evicts the least recently touched entry.
///
/// Every touch appends the key to a recency queue with a fresh tick; older
/// queue records of the same key become stale and are skipped when the
/// queue is popped during eviction.
#[derive(Debug)]
pub struct LookupCache<K, V> {
    capacity: usize,
    entries: AHashMap<K, (V, u64)>,
    recency: VecDeque<(K, u64)>,
    tick: u64,
    hits: u64,
    misses: u64,
}

impl<K, V> LookupCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        LookupCache {
            capacity: capacity.max(1),
            entries: AHashMap::new(),
            recency: VecDeque::new(),
            tick: 0,
            hits: 0,
            misses: 0,
        }
    }

    fn record(&mut self, key: K, tick: u64) {
        self.recency.push_back((key, tick));
        if self.recency.len() > self.capacity * 4 {
            self.compact();
        }
    }

    /// Drop stale recency records.
    fn compact(&mut self) {
        let entries = &self.entries;
        self.recency
            .retain(|(key, tick)| entries.get(key).is_some_and(|(_, current)| current == tick));
    }

    /// Look up `key`, marking it most recently used.
    pub fn get(&mut self, key: &K) -> Option<V> {
        if !self.entries.contains_key(key) {
            self.misses += 1;
            return None;
        }
        self.hits += 1;
        self.tick += 1;
        let tick = self.tick;
        let (value, current) = self.entries.get_mut(key)?;
        *current = tick;
        let value = value.clone();
        self.record(key.clone(), tick);
        Some(value)
    }

    /// Insert or replace `key`, evicting the oldest entries beyond capacity.
    pub fn insert(&mut self, key: K, value: V) {
        self.tick += 1;
        let tick = self.tick;
        self.entries.insert(key.clone(), (value, tick));
        self.record(key, tick);

        while self.entries.len() > self.capacity {
            let Some((key, tick)) = self.recency.pop_front() else {
                break;
            };
            if self.entries.get(&key).is_some_and(|(_, current)| *current == tick) {
                self.entries.remove(&key);
            }
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lookups answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that found nothing.
    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest() {
        let mut cache = LookupCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&"a"));
        assert_eq!(cache.get(&"b"), Some(2));
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut cache = LookupCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get(&"a"), Some(1));
        cache.insert("c", 3);

        assert!(cache.contains(&"a"));
        assert!(!cache.contains(&"b"));
        assert!(cache.contains(&"c"));
    }

    #[test]
    fn test_hit_and_miss_counters() {
        let mut cache: LookupCache<(String, String), u64> = LookupCache::new(10);
        let key = ("lexicon.txt".to_string(), "apple".to_string());
        assert_eq!(cache.get(&key), None);
        cache.insert(key.clone(), 3);
        assert_eq!(cache.get(&key), Some(3));
        assert_eq!(cache.get(&key), Some(3));
        assert_eq!((cache.hits(), cache.misses()), (2, 1));

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.hits(), 2);
    }

    #[test]
    fn test_repeated_touches_stay_bounded() {
        let mut cache = LookupCache::new(3);
        for round in 0..1000u64 {
            cache.insert(round % 5, round);
            cache.get(&(round % 3));
        }
        assert!(cache.len() <= 3);
        assert!(cache.recency.len() <= cache.capacity() * 4 + 1);
    }
}
