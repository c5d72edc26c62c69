use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::cache_entry::{CacheSlot, EntryCore, EntryHandle, EntryOps};
use crate::keys::CacheableKey;
use crate::lru_cache::LruCache;
use crate::store::CacheStore;

#[cfg(feature = "stats")]
use crate::stats::CacheStats;
#[cfg(feature = "stats")]
use crate::stats_registry;

/// Expiry configuration for a memoization engine or a single entry.
///
/// # Variants
///
/// * `Off` - At the engine level, caching is bypassed entirely: every call
///   invokes the callee. At the entry level (via
///   [`EntryHandle::set_ttl`](crate::EntryHandle::set_ttl)), no timer is
///   armed.
/// * `Forever` - Entries are cached and never auto-expire. They still leave
///   the cache through LRU eviction and explicit clears.
/// * `After(duration)` - Entries expire `duration` after being cached.
///
/// A plain [`Duration`] converts into a `Ttl`, with `Duration::ZERO`
/// mapping to `Off` (a zero timeout disables caching).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use memolito::Ttl;
///
/// assert_eq!(Ttl::from(Duration::ZERO), Ttl::Off);
/// assert_eq!(
///     Ttl::from(Duration::from_secs(5)),
///     Ttl::After(Duration::from_secs(5))
/// );
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ttl {
    Off,
    Forever,
    After(Duration),
}

impl Ttl {
    /// Whether this configuration caches at all.
    pub(crate) fn caches(&self) -> bool {
        !matches!(self, Ttl::Off)
    }

    /// The expiry deadline for an entry cached at `now`, if one applies.
    pub(crate) fn deadline_after(&self, now: Instant) -> Option<Instant> {
        match self {
            Ttl::After(duration) => Some(now + *duration),
            Ttl::Off | Ttl::Forever => None,
        }
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        if duration.is_zero() {
            Ttl::Off
        } else {
            Ttl::After(duration)
        }
    }
}

/// Memoizes `callee` for `ttl` per distinct argument key.
///
/// The convenience surface over [`Memo::builder`]: an unbounded built-in
/// cache, the default argument-derived keys, and no observer. A `ttl` of
/// `Duration::ZERO` disables caching, so every call invokes the callee.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use std::time::Duration;
/// use memolito::memoize;
///
/// let calls = Cell::new(0u32);
/// let square = memoize(
///     |n: u64| {
///         calls.set(calls.get() + 1);
///         n * n
///     },
///     Duration::from_secs(60),
/// );
///
/// assert_eq!(square.call(12), 144);
/// assert_eq!(square.call(12), 144);
/// assert_eq!(calls.get(), 1); // second call was served from the cache
/// ```
pub fn memoize<A, R, F>(callee: F, ttl: Duration) -> Memo<A, R, F>
where
    A: CacheableKey,
    R: Clone + Send + 'static,
    F: Fn(A) -> R,
{
    Memo::builder(callee).ttl(ttl).build()
}

/// A memoized function: the wrapped callee plus its cache, key resolver,
/// and expiry configuration.
///
/// Built through [`Memo::builder`] or the [`memoize`] shorthand. Call the
/// wrapped function with [`call`](Memo::call); inspect and manage the
/// cache with [`cached_value`](Memo::cached_value),
/// [`clear_entry`](Memo::clear_entry), and [`clear_cache`](Memo::clear_cache).
///
/// Per-key state machine: a key is absent until a call populates it; a
/// populated key serves hits (each hit marks it most recently used) until
/// its timer fires, it is explicitly cleared, LRU eviction claims it, or
/// the whole cache is cleared — after which the key is absent again and the
/// next call repopulates it.
///
/// The engine serializes store access through a [`parking_lot::Mutex`] but
/// never holds the lock while the callee or the `on_cached` observer runs,
/// so both may freely call back into the engine or the entry handle.
/// Overlapping calls for one key from different threads may each invoke
/// the callee; the last insertion wins. For coalescing of in-flight work
/// use [`AsyncMemo`](crate::AsyncMemo).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use memolito::Memo;
///
/// let lookup = Memo::builder(|id: u32| format!("user:{id}"))
///     .ttl(Duration::from_secs(30))
///     .max_size(100)
///     .build();
///
/// assert_eq!(lookup.call(7), "user:7");
/// assert_eq!(lookup.cached_value(&7), Some("user:7".to_string()));
///
/// lookup.clear_entry(&7);
/// assert_eq!(lookup.cached_value(&7), None);
/// ```
pub struct Memo<A, R, F, C = LruCache<CacheSlot<R>>> {
    callee: F,
    ttl: Ttl,
    cache: Arc<Mutex<C>>,
    resolver: Box<dyn Fn(&A) -> String + Send + Sync>,
    on_cached: Option<Box<dyn Fn(&EntryHandle<R>) + Send + Sync>>,
    cache_if: Option<Box<dyn Fn(&R) -> bool + Send + Sync>>,
    #[cfg(feature = "stats")]
    stats: Arc<CacheStats>,
}

impl<A, R, F> Memo<A, R, F>
where
    A: CacheableKey,
{
    /// Starts building a memoized function around `callee`.
    ///
    /// The builder defaults to [`Ttl::Off`] (no caching) — set a
    /// [`ttl`](MemoBuilder::ttl) to actually memoize — with an unbounded
    /// built-in cache and keys derived from the arguments via
    /// [`CacheableKey`].
    pub fn builder(callee: F) -> MemoBuilder<A, R, F> {
        MemoBuilder {
            callee,
            ttl: Ttl::Off,
            cache: Arc::new(Mutex::new(LruCache::default())),
            resolver: Box::new(|args: &A| args.to_cache_key()),
            on_cached: None,
            cache_if: None,
            #[cfg(feature = "stats")]
            name: None,
        }
    }
}

impl<A, R, F, C> Memo<A, R, F, C>
where
    R: Clone + Send + 'static,
    F: Fn(A) -> R,
    C: CacheStore<CacheSlot<R>> + Send + 'static,
{
    /// Invokes the memoized function.
    ///
    /// With caching disabled ([`Ttl::Off`]), the callee runs every time.
    /// Otherwise the arguments resolve to a key; a hit returns the cached
    /// value and marks the entry most recently used. On a miss the callee
    /// runs (a panic propagates and nothing is cached), the result is
    /// cached with a fresh expiry timer, and the `on_cached` observer (if
    /// any) receives the new entry's handle.
    ///
    /// The returned value is re-read from the cache after population, so an
    /// observer that clears or replaces the entry inside its callback is
    /// honored; only when the entry is already gone again does the call
    /// fall back to the locally computed result.
    pub fn call(&self, args: A) -> R {
        if !self.ttl.caches() {
            return (self.callee)(args);
        }
        let key = (self.resolver)(&args);
        if let Some(slot) = self.cache.lock().get(&key) {
            #[cfg(feature = "stats")]
            self.stats.record_hit();
            return slot.value().clone();
        }
        #[cfg(feature = "stats")]
        self.stats.record_miss();

        let value = (self.callee)(args);
        if let Some(cache_if) = &self.cache_if {
            if !cache_if(&value) {
                return value;
            }
        }

        let entry = EntryCore::new(key.clone(), Arc::downgrade(&self.cache));
        let slot = CacheSlot::new(value.clone(), entry.clone());
        self.cache.lock().insert(&key, slot);
        entry.rearm(self.ttl);

        if let Some(observer) = &self.on_cached {
            observer(&EntryHandle::new(value.clone(), entry));
        }

        match self.cache.lock().get(&key) {
            Some(slot) => slot.value().clone(),
            None => value,
        }
    }

    /// Returns the cached value for `args` without invoking the callee.
    ///
    /// Goes through the store's recency-refreshing `get`, so a present
    /// entry is marked most recently used. Returns `None` when the key is
    /// absent or caching is disabled.
    pub fn cached_value(&self, args: &A) -> Option<R> {
        if !self.ttl.caches() {
            return None;
        }
        let key = (self.resolver)(args);
        let slot = self.cache.lock().get(&key);
        #[cfg(feature = "stats")]
        match &slot {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        slot.map(|slot| slot.value().clone())
    }

    /// Removes the entry for `args`, cancelling its pending timer.
    ///
    /// A no-op if the key is absent.
    pub fn clear_entry(&self, args: &A) {
        if !self.ttl.caches() {
            return;
        }
        let key = (self.resolver)(args);
        let mut cache = self.cache.lock();
        if let Some(slot) = cache.get(&key) {
            slot.cancel_timer();
            cache.remove(&key);
        }
    }

    /// Removes every entry from the cache.
    ///
    /// Timers still pending for removed entries become no-ops: expiry is
    /// identity-checked against the stored entry, so even a key that gets
    /// repopulated right away is safe from the old timer.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    /// The cache behind this engine. Useful for sharing one cache between
    /// several engines or for inspecting entry counts.
    pub fn cache(&self) -> &Arc<Mutex<C>> {
        &self.cache
    }

    /// Hit/miss counters for this engine.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

/// Configures and builds a [`Memo`].
///
/// # Options
///
/// | option | effect |
/// |---|---|
/// | [`ttl`](MemoBuilder::ttl) | expiry per entry; `Ttl::Off` / `Duration::ZERO` disables caching |
/// | [`resolver`](MemoBuilder::resolver) | overrides how arguments map to a cache key |
/// | [`cache`](MemoBuilder::cache) | supplies an externally owned store, bypassing the built-in one |
/// | [`max_size`](MemoBuilder::max_size) | entry limit for the built-in LRU cache (unbounded if omitted) |
/// | [`on_cached`](MemoBuilder::on_cached) | observer invoked with each newly populated entry |
/// | [`cache_if`](MemoBuilder::cache_if) | predicate deciding whether a computed value is retained |
/// | [`reject_errors`](MemoBuilder::reject_errors) | `Result` callees: drop `Err` values instead of caching them |
/// | [`name`](MemoBuilder::name) | registers the engine's statistics under a name (`stats` feature) |
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use memolito::Memo;
///
/// let parse = Memo::builder(|input: String| input.parse::<i64>())
///     .ttl(Duration::from_secs(10))
///     .reject_errors(true)
///     .build();
///
/// assert!(parse.call("42".to_string()).is_ok());
/// assert!(parse.call("not a number".to_string()).is_err());
/// // The failed parse was not retained.
/// assert_eq!(parse.cached_value(&"not a number".to_string()), None);
/// ```
pub struct MemoBuilder<A, R, F, C = LruCache<CacheSlot<R>>> {
    callee: F,
    ttl: Ttl,
    cache: Arc<Mutex<C>>,
    resolver: Box<dyn Fn(&A) -> String + Send + Sync>,
    on_cached: Option<Box<dyn Fn(&EntryHandle<R>) + Send + Sync>>,
    cache_if: Option<Box<dyn Fn(&R) -> bool + Send + Sync>>,
    #[cfg(feature = "stats")]
    name: Option<String>,
}

impl<A, R, F, C> MemoBuilder<A, R, F, C> {
    /// Sets the expiry configuration. Accepts a [`Ttl`] or a plain
    /// [`Duration`]; `Duration::ZERO` (and `Ttl::After(Duration::ZERO)`)
    /// normalize to [`Ttl::Off`].
    pub fn ttl(mut self, ttl: impl Into<Ttl>) -> Self {
        self.ttl = match ttl.into() {
            Ttl::After(duration) if duration.is_zero() => Ttl::Off,
            other => other,
        };
        self
    }

    /// Overrides how arguments map to a cache key. The resolver's output
    /// is reduced to the final key through its own [`CacheableKey`]
    /// implementation.
    ///
    /// Engines sharing one cache must agree on key resolution, or they
    /// will read each other's entries.
    pub fn resolver<K, F2>(mut self, resolver: F2) -> Self
    where
        K: CacheableKey,
        F2: Fn(&A) -> K + Send + Sync + 'static,
    {
        self.resolver = Box::new(move |args| resolver(args).to_cache_key());
        self
    }

    /// Installs an observer invoked with the [`EntryHandle`] of each newly
    /// populated entry. The observer runs after the entry is inserted and
    /// its timer armed; clearing the entry from inside the observer is
    /// honored by the populating call's return path.
    pub fn on_cached<F2>(mut self, observer: F2) -> Self
    where
        F2: Fn(&EntryHandle<R>) + Send + Sync + 'static,
    {
        self.on_cached = Some(Box::new(observer));
        self
    }

    /// Installs a retention predicate: a computed value for which it
    /// returns `false` is handed back to the caller without being cached.
    pub fn cache_if<F2>(mut self, predicate: F2) -> Self
    where
        F2: Fn(&R) -> bool + Send + Sync + 'static,
    {
        self.cache_if = Some(Box::new(predicate));
        self
    }

    /// Registers the engine's statistics in the global
    /// [`stats_registry`](crate::stats_registry) under `name` at build
    /// time.
    #[cfg(feature = "stats")]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Supplies an externally owned cache, replacing the built-in one.
    ///
    /// The cache may be shared between engines (clone the [`Arc`]); its
    /// lifetime is the caller's responsibility, and an eviction or clear
    /// performed through one engine affects all of them.
    pub fn cache<C2>(self, cache: Arc<Mutex<C2>>) -> MemoBuilder<A, R, F, C2>
    where
        R: Clone,
        C2: CacheStore<CacheSlot<R>>,
    {
        MemoBuilder {
            callee: self.callee,
            ttl: self.ttl,
            cache,
            resolver: self.resolver,
            on_cached: self.on_cached,
            cache_if: self.cache_if,
            #[cfg(feature = "stats")]
            name: self.name,
        }
    }

    /// Finishes the builder.
    pub fn build(self) -> Memo<A, R, F, C>
    where
        R: Clone + Send + 'static,
        F: Fn(A) -> R,
        C: CacheStore<CacheSlot<R>> + Send + 'static,
    {
        #[cfg(feature = "stats")]
        let stats = Arc::new(CacheStats::new());
        #[cfg(feature = "stats")]
        if let Some(name) = &self.name {
            stats_registry::register(name, Arc::clone(&stats));
        }

        Memo {
            callee: self.callee,
            ttl: self.ttl,
            cache: self.cache,
            resolver: self.resolver,
            on_cached: self.on_cached,
            cache_if: self.cache_if,
            #[cfg(feature = "stats")]
            stats,
        }
    }
}

impl<A, R, F> MemoBuilder<A, R, F> {
    /// Caps the built-in LRU cache at `max_size` entries. Only meaningful
    /// before [`cache`](MemoBuilder::cache) swaps the store out.
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.cache = Arc::new(Mutex::new(LruCache::new(Some(max_size))));
        self
    }
}

impl<A, T: 'static, E: 'static, F, C> MemoBuilder<A, Result<T, E>, F, C> {
    /// For `Result`-returning callees: when `reject` is `true`, `Err`
    /// values are returned to the caller but never retained in the cache,
    /// so the next call retries the callee. `false` caches errors like any
    /// other value.
    pub fn reject_errors(self, reject: bool) -> Self {
        if reject {
            self.cache_if(|result: &Result<T, E>| result.is_ok())
        } else {
            let mut builder = self;
            builder.cache_if = None;
            builder
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_ttl_from_duration() {
        assert_eq!(Ttl::from(Duration::ZERO), Ttl::Off);
        assert_eq!(
            Ttl::from(Duration::from_millis(5)),
            Ttl::After(Duration::from_millis(5))
        );
    }

    #[test]
    fn test_call_caches_within_ttl() {
        let calls = AtomicUsize::new(0);
        let memo = memoize(
            |n: u32| {
                calls.fetch_add(1, Ordering::SeqCst);
                n * 2
            },
            Duration::from_secs(60),
        );

        assert_eq!(memo.call(21), 42);
        assert_eq!(memo.call(21), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A different key computes again.
        assert_eq!(memo.call(5), 10);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_zero_duration_disables_caching() {
        let calls = AtomicUsize::new(0);
        let memo = memoize(
            |n: u32| {
                calls.fetch_add(1, Ordering::SeqCst);
                n
            },
            Duration::ZERO,
        );

        memo.call(1);
        memo.call(1);
        memo.call(1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(memo.cached_value(&1), None);
    }

    #[test]
    fn test_unset_ttl_disables_caching() {
        let calls = AtomicUsize::new(0);
        let memo = Memo::builder(|n: u32| {
            calls.fetch_add(1, Ordering::SeqCst);
            n
        })
        .build();

        memo.call(1);
        memo.call(1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_forever_caches_without_timer() {
        let calls = AtomicUsize::new(0);
        let memo = Memo::builder(|n: u32| {
            calls.fetch_add(1, Ordering::SeqCst);
            n + 1
        })
        .ttl(Ttl::Forever)
        .build();

        assert_eq!(memo.call(1), 2);
        assert_eq!(memo.call(1), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cached_value_and_clear_entry() {
        let memo = memoize(|n: u32| n * 10, Duration::from_secs(60));

        assert_eq!(memo.cached_value(&3), None);
        memo.call(3);
        assert_eq!(memo.cached_value(&3), Some(30));

        memo.clear_entry(&3);
        assert_eq!(memo.cached_value(&3), None);
    }

    #[test]
    fn test_clear_cache_empties_everything() {
        let memo = memoize(|n: u32| n, Duration::from_secs(60));
        memo.call(1);
        memo.call(2);
        memo.call(3);

        memo.clear_cache();
        assert_eq!(memo.cached_value(&1), None);
        assert_eq!(memo.cached_value(&2), None);
        assert_eq!(memo.cached_value(&3), None);
    }

    #[test]
    fn test_max_size_evicts_least_recently_used() {
        let calls = AtomicUsize::new(0);
        let memo = Memo::builder(|n: u32| {
            calls.fetch_add(1, Ordering::SeqCst);
            n
        })
        .ttl(Duration::from_secs(60))
        .max_size(2)
        .build();

        memo.call(1);
        memo.call(2);
        memo.call(1); // hit: 1 is now the most recently used
        memo.call(3); // evicts 2

        assert_eq!(memo.cached_value(&2), None);
        assert_eq!(memo.cached_value(&1), Some(1));
        assert_eq!(memo.cached_value(&3), Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_custom_resolver() {
        let calls = AtomicUsize::new(0);
        let memo = Memo::builder(|(id, _attempt): (u32, u32)| {
            calls.fetch_add(1, Ordering::SeqCst);
            id
        })
        .ttl(Duration::from_secs(60))
        .resolver(|args: &(u32, u32)| args.0)
        .build();

        // Same id, different attempt: one computation.
        memo.call((7, 1));
        memo.call((7, 2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cache_if_rejects_values() {
        let calls = AtomicUsize::new(0);
        let memo = Memo::builder(|n: i32| {
            calls.fetch_add(1, Ordering::SeqCst);
            n * 2
        })
        .ttl(Duration::from_secs(60))
        .cache_if(|value: &i32| *value >= 0)
        .build();

        assert_eq!(memo.call(-1), -2);
        assert_eq!(memo.call(-1), -2);
        assert_eq!(calls.load(Ordering::SeqCst), 2); // never cached

        assert_eq!(memo.call(1), 2);
        assert_eq!(memo.call(1), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3); // cached
    }

    #[test]
    fn test_reject_errors_skips_err_values() {
        let calls = AtomicUsize::new(0);
        let memo = Memo::builder(|n: i32| {
            calls.fetch_add(1, Ordering::SeqCst);
            if n < 0 {
                Err("negative")
            } else {
                Ok(n)
            }
        })
        .ttl(Duration::from_secs(60))
        .reject_errors(true)
        .build();

        assert_eq!(memo.call(-1), Err("negative"));
        assert_eq!(memo.call(-1), Err("negative"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert_eq!(memo.call(4), Ok(4));
        assert_eq!(memo.call(4), Ok(4));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_reject_errors_opt_out_caches_err_values() {
        let calls = AtomicUsize::new(0);
        let memo = Memo::builder(|n: i32| {
            calls.fetch_add(1, Ordering::SeqCst);
            if n < 0 {
                Err("negative")
            } else {
                Ok(n)
            }
        })
        .ttl(Duration::from_secs(60))
        .reject_errors(false)
        .build();

        assert_eq!(memo.call(-1), Err("negative"));
        assert_eq!(memo.call(-1), Err("negative"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_on_cached_observer_sees_new_entries() {
        let observed = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&observed);
        let memo = Memo::builder(|n: u32| n * 2)
            .ttl(Duration::from_secs(60))
            .on_cached(move |entry| {
                seen.lock().push((entry.key().to_string(), *entry.value()));
            })
            .build();

        memo.call(1);
        memo.call(1); // hit: observer not invoked again
        memo.call(2);

        assert_eq!(*observed.lock(), vec![("1".to_string(), 2), ("2".to_string(), 4)]);
    }

    #[test]
    fn test_observer_clearing_entry_is_honored() {
        let memo = Memo::builder(|n: u32| n * 2)
            .ttl(Duration::from_secs(60))
            .on_cached(|entry| entry.clear())
            .build();

        // The populating call still returns the computed value...
        assert_eq!(memo.call(3), 6);
        // ...but the entry is gone and the next call recomputes.
        assert_eq!(memo.cached_value(&3), None);
    }

    #[test]
    fn test_single_argument_tuple_shares_key_with_bare_argument() {
        let shared: Arc<Mutex<LruCache<CacheSlot<u32>>>> =
            Arc::new(Mutex::new(LruCache::default()));

        let tuple_memo = Memo::builder(|args: (u32,)| args.0 * 3)
            .ttl(Duration::from_secs(60))
            .cache(Arc::clone(&shared))
            .build();

        let bare_calls = AtomicUsize::new(0);
        let bare_memo = Memo::builder(|n: u32| {
            bare_calls.fetch_add(1, Ordering::SeqCst);
            n * 3
        })
        .ttl(Duration::from_secs(60))
        .cache(shared)
        .build();

        assert_eq!(tuple_memo.call((9,)), 27);
        // The 1-tuple collapsed to the bare element's key, so the second
        // engine is served by the first engine's entry.
        assert_eq!(bare_memo.call(9), 27);
        assert_eq!(bare_calls.load(Ordering::SeqCst), 0);
    }
}
