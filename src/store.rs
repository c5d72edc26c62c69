use std::collections::HashMap;

/// Capability contract shared by every cache a memoization engine can use.
///
/// The engine only ever needs five operations: a recency-refreshing lookup,
/// a pure membership check, insertion, removal, and a full clear. The
/// built-in [`LruCache`](crate::LruCache) is one implementation; the
/// unbounded [`UnboundedCache`] is another, and callers may supply their
/// own (for example a cache shared between several engines).
///
/// # Recency rules
///
/// * [`get`](CacheStore::get) counts as an access: implementations with a
///   recency order must mark the key most recently used.
/// * [`contains`](CacheStore::contains) is a pure membership check and must
///   **not** alter recency.
///
/// # Examples
///
/// ```
/// use memolito::{CacheStore, UnboundedCache};
///
/// let mut cache = UnboundedCache::new();
/// cache.insert("a", 1);
/// assert_eq!(cache.get("a"), Some(1));
/// assert!(cache.contains("a"));
/// assert!(cache.remove("a"));
/// assert!(cache.is_empty());
/// ```
pub trait CacheStore<V: Clone> {
    /// Looks up a key, marking it most recently used if present.
    fn get(&mut self, key: &str) -> Option<V>;

    /// Pure membership check; does not alter recency.
    fn contains(&self, key: &str) -> bool;

    /// Inserts or replaces the value for a key. Implementations with a
    /// capacity limit evict their least recently used entry when the
    /// insertion would exceed it.
    fn insert(&mut self, key: &str, value: V);

    /// Removes a key. Returns `true` if it was present.
    fn remove(&mut self, key: &str) -> bool;

    /// Removes every entry.
    fn clear(&mut self);

    /// Number of stored entries.
    fn len(&self) -> usize;

    /// Whether the cache holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A cache without any capacity limit or eviction.
///
/// Satisfies the same [`CacheStore`] contract as the bounded
/// [`LruCache`](crate::LruCache); entries only leave through explicit
/// removal, a full clear, or TTL expiry driven by the engine.
#[derive(Debug, Default)]
pub struct UnboundedCache<V> {
    map: HashMap<String, V>,
}

impl<V> UnboundedCache<V> {
    /// Creates an empty unbounded cache.
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }
}

impl<V: Clone> CacheStore<V> for UnboundedCache<V> {
    fn get(&mut self, key: &str) -> Option<V> {
        self.map.get(key).cloned()
    }

    fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    fn insert(&mut self, key: &str, value: V) {
        self.map.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) -> bool {
        self.map.remove(key).is_some()
    }

    fn clear(&mut self) {
        self.map.clear();
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}
