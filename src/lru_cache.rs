use std::collections::{HashMap, VecDeque};

use crate::store::CacheStore;

/// A capacity-bounded cache with least-recently-used eviction.
///
/// Entries live in a `HashMap` keyed by their cache key, while a separate
/// order queue tracks recency from oldest (front) to newest (back). Every
/// [`get`](CacheStore::get) and every insertion of an existing key moves
/// that key to the newest end; when an insertion pushes the cache over its
/// maximum size, the oldest key is evicted from both structures.
///
/// Reordering scans the queue linearly. That keeps the structure simple
/// and is plenty for the entry counts a memoized function sees; the
/// behavior, not the complexity, is the contract.
///
/// # Examples
///
/// ```
/// use memolito::{CacheStore, LruCache};
///
/// let mut cache = LruCache::new(Some(2));
/// cache.insert("a", 1);
/// cache.insert("b", 2);
/// cache.insert("c", 3); // evicts "a", the least recently used
///
/// assert!(!cache.contains("a"));
/// assert!(cache.contains("b"));
/// assert!(cache.contains("c"));
/// ```
///
/// A `get` refreshes recency and saves an entry from eviction:
///
/// ```
/// use memolito::{CacheStore, LruCache};
///
/// let mut cache = LruCache::new(Some(2));
/// cache.insert("a", 1);
/// cache.insert("b", 2);
/// cache.get("a"); // "a" is now the most recently used
/// cache.insert("c", 3); // evicts "b" instead
///
/// assert!(cache.contains("a"));
/// assert!(!cache.contains("b"));
/// ```
#[derive(Debug)]
pub struct LruCache<V> {
    map: HashMap<String, V>,
    order: VecDeque<String>,
    max_size: Option<usize>,
}

impl<V> LruCache<V> {
    /// Creates a cache that evicts its least recently used entry once it
    /// holds more than `max_size` entries. `None` disables eviction.
    pub fn new(max_size: Option<usize>) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            max_size,
        }
    }

    /// The configured maximum entry count, if any.
    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    /// Moves `key` to the newest end of the order queue.
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
            self.order.push_back(key.to_string());
        }
    }
}

impl<V> Default for LruCache<V> {
    /// An unbounded cache; equivalent to `LruCache::new(None)`.
    fn default() -> Self {
        Self::new(None)
    }
}

impl<V: Clone> CacheStore<V> for LruCache<V> {
    fn get(&mut self, key: &str) -> Option<V> {
        if self.map.contains_key(key) {
            self.touch(key);
        }
        self.map.get(key).cloned()
    }

    fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    fn insert(&mut self, key: &str, value: V) {
        if self.map.insert(key.to_string(), value).is_some() {
            // Known key: refresh recency, no eviction.
            self.touch(key);
            return;
        }
        self.order.push_back(key.to_string());
        if let Some(max_size) = self.max_size {
            while self.order.len() > max_size {
                if let Some(oldest) = self.order.pop_front() {
                    self.map.remove(&oldest);
                }
            }
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        let removed = self.map.remove(key).is_some();
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        removed
    }

    fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_within_limit() {
        let mut cache = LruCache::new(Some(3));
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("a"), Some(1));
    }

    #[test]
    fn test_eviction_removes_oldest() {
        let mut cache = LruCache::new(Some(2));
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);

        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut cache = LruCache::new(Some(2));
        cache.insert("a", 1);
        cache.insert("b", 2);

        // Touch "a" so that "b" becomes the eviction candidate.
        assert_eq!(cache.get("a"), Some(1));
        cache.insert("c", 3);

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn test_contains_does_not_refresh_recency() {
        let mut cache = LruCache::new(Some(2));
        cache.insert("a", 1);
        cache.insert("b", 2);

        // A membership check must not save "a" from eviction.
        assert!(cache.contains("a"));
        cache.insert("c", 3);

        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn test_reinsert_existing_key_refreshes_without_eviction() {
        let mut cache = LruCache::new(Some(2));
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 10);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(10));

        // "a" was refreshed, so "b" is the oldest now.
        cache.insert("c", 3);
        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
    }

    #[test]
    fn test_remove() {
        let mut cache = LruCache::new(Some(2));
        cache.insert("a", 1);
        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));
        assert!(cache.is_empty());

        // Removal frees capacity.
        cache.insert("b", 2);
        cache.insert("c", 3);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_clear() {
        let mut cache = LruCache::new(Some(3));
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.clear();
        assert!(cache.is_empty());

        // The order queue was cleared too; fresh inserts behave normally.
        cache.insert("c", 3);
        cache.insert("d", 4);
        cache.insert("e", 5);
        cache.insert("f", 6);
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("c"));
    }

    #[test]
    fn test_unlimited_cache_never_evicts() {
        let mut cache = LruCache::new(None);
        for i in 0..1_000 {
            cache.insert(&format!("key{}", i), i);
        }
        assert_eq!(cache.len(), 1_000);
        assert!(cache.contains("key0"));
    }

    #[test]
    fn test_max_size_one() {
        let mut cache = LruCache::new(Some(1));
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert!(!cache.contains("a"));
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_eviction_sequence_matches_access_order() {
        let mut cache = LruCache::new(Some(3));
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);

        cache.get("a");
        cache.get("c");
        // Recency now: b (oldest), a, c.

        cache.insert("d", 4);
        assert!(!cache.contains("b"));

        cache.insert("e", 5);
        assert!(!cache.contains("a"));

        assert!(cache.contains("c"));
        assert!(cache.contains("d"));
        assert!(cache.contains("e"));
    }
}
