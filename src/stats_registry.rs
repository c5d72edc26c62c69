//! Global registry of engine statistics, indexed by name.
//!
//! Engines built with a [`name`](crate::MemoBuilder::name) register their
//! [`CacheStats`] here, so monitoring code can query hit rates without a
//! reference to the engine itself. Names are global: building a second
//! engine under an existing name replaces the registered statistics.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::stats::CacheStats;

static STATS_REGISTRY: Lazy<RwLock<HashMap<String, Arc<CacheStats>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Registers `stats` under `name`, replacing any previous registration.
pub fn register(name: &str, stats: Arc<CacheStats>) {
    STATS_REGISTRY.write().insert(name.to_string(), stats);
}

/// The live statistics registered under `name`, if any.
///
/// The returned [`Arc`] shares the engine's counters: reads observe
/// subsequent activity.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use memolito::{stats_registry, Memo};
///
/// let memo = Memo::builder(|n: u32| n + 1)
///     .ttl(Duration::from_secs(60))
///     .name("increment")
///     .build();
///
/// memo.call(1);
/// memo.call(1);
///
/// let stats = stats_registry::get("increment").unwrap();
/// assert_eq!(stats.hits(), 1);
/// assert_eq!(stats.misses(), 1);
/// ```
pub fn get(name: &str) -> Option<Arc<CacheStats>> {
    STATS_REGISTRY.read().get(name).cloned()
}

/// All registered names, in no particular order.
pub fn list() -> Vec<String> {
    STATS_REGISTRY.read().keys().cloned().collect()
}

/// Drops the registration for `name`. Returns `true` if it existed.
///
/// The engine itself keeps counting; only the registry entry goes away.
pub fn unregister(name: &str) -> bool {
    STATS_REGISTRY.write().remove(name).is_some()
}
