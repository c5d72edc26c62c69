use std::collections::VecDeque;
use std::future::Future;
use std::marker::PhantomData;
#[cfg(feature = "stats")]
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;

use crate::cache_entry::next_entry_id;
use crate::keys::CacheableKey;
use crate::memo::Ttl;

#[cfg(feature = "stats")]
use crate::stats::CacheStats;
#[cfg(feature = "stats")]
use crate::stats_registry;

/// The shared, boxed future an async engine caches per key.
type SharedResult<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

struct AsyncSlot<T, E> {
    future: SharedResult<T, E>,
    id: u64,
    expires_at: Option<Instant>,
}

impl<T, E> AsyncSlot<T, E> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

impl<T, E> Clone for AsyncSlot<T, E> {
    fn clone(&self) -> Self {
        Self {
            future: self.future.clone(),
            id: self.id,
            expires_at: self.expires_at,
        }
    }
}

/// Memoizes `callee` (an async function) for `ttl` per distinct argument
/// key, with an unbounded cache and failed results rejected.
///
/// See [`AsyncMemo::builder`] for the full configuration surface.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use memolito::memoize_async;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let double = memoize_async(
///     |n: u32| async move { Ok::<_, String>(n * 2) },
///     Duration::from_secs(30),
/// );
///
/// assert_eq!(double.call(21).await, Ok(42));
/// assert_eq!(double.call(21).await, Ok(42)); // served from the cache
/// # }
/// ```
pub fn memoize_async<A, T, E, F>(callee: F, ttl: Duration) -> AsyncMemo<A, T, E, F>
where
    A: CacheableKey,
{
    AsyncMemo::builder(callee).ttl(ttl).build()
}

/// A memoized async function that caches the in-flight future itself.
///
/// Where [`Memo`](crate::Memo) caches computed values, `AsyncMemo` caches
/// the callee's future as a [`Shared`] handle the moment it is created,
/// without awaiting it. Every call within the TTL window — including calls
/// that arrive while the first is still in flight — awaits a clone of the
/// same shared future, so one key coalesces into at most one callee
/// invocation per absent window, even across threads (the slot map's
/// per-entry locking provides the population lock).
///
/// Failure handling: when an awaited future resolves to `Err` and
/// `reject_failed` is on (the default), the entry is evicted — identity
/// checked, so a repopulated entry under the same key is untouched — while
/// the `Err` is still returned to every awaiter. A failed result never
/// stays cached; a repeat call retries the callee.
///
/// Expiry here is lazy: each slot carries its deadline and is replaced on
/// the first access past it. An entry past its deadline is unreachable
/// even if no access has cleaned it up yet.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use memolito::AsyncMemo;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let calls = Arc::new(AtomicUsize::new(0));
/// let counted = Arc::clone(&calls);
/// let fetch = AsyncMemo::builder(move |id: u64| {
///     let counted = Arc::clone(&counted);
///     async move {
///         counted.fetch_add(1, Ordering::SeqCst);
///         Ok::<_, String>(format!("user:{id}"))
///     }
/// })
/// .ttl(Duration::from_secs(30))
/// .build();
///
/// let first = fetch.call(7);
/// let second = fetch.call(7);
/// // Overlapping in-flight calls coalesce onto one shared future.
/// let (a, b) = tokio::join!(first, second);
/// assert_eq!(a, b);
/// assert_eq!(calls.load(Ordering::SeqCst), 1);
/// # }
/// ```
pub struct AsyncMemo<A, T, E, F> {
    callee: F,
    ttl: Ttl,
    reject_failed: bool,
    max_size: Option<usize>,
    slots: DashMap<String, AsyncSlot<T, E>>,
    order: Mutex<VecDeque<String>>,
    resolver: Box<dyn Fn(&A) -> String + Send + Sync>,
    #[cfg(feature = "stats")]
    stats: Arc<CacheStats>,
}

impl<A, T, E, F> AsyncMemo<A, T, E, F>
where
    A: CacheableKey,
{
    /// Starts building an async memoization engine around `callee`.
    ///
    /// Defaults: [`Ttl::Off`] (no caching — set a
    /// [`ttl`](AsyncMemoBuilder::ttl)), unbounded cache, failed results
    /// rejected, keys derived from the arguments via [`CacheableKey`].
    pub fn builder(callee: F) -> AsyncMemoBuilder<A, T, E, F> {
        AsyncMemoBuilder {
            callee,
            ttl: Ttl::Off,
            reject_failed: true,
            max_size: None,
            resolver: Box::new(|args: &A| args.to_cache_key()),
            #[cfg(feature = "stats")]
            name: None,
            _result: PhantomData,
        }
    }
}

impl<A, T, E, F> AsyncMemo<A, T, E, F>
where
    T: Clone,
    E: Clone,
{
    /// Invokes the memoized async function.
    ///
    /// With caching disabled ([`Ttl::Off`]), the callee runs and is
    /// awaited directly. Otherwise the arguments resolve to a key; if a
    /// live slot exists its shared future is awaited (a hit, refreshing
    /// recency), and if not the callee is invoked, its future cached
    /// un-awaited, and then awaited.
    pub async fn call<Fut>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        if !self.ttl.caches() {
            return (self.callee)(args).await;
        }
        let key = (self.resolver)(&args);
        let (future, id, fresh) = self.lookup_or_populate(&key, args);
        if fresh {
            self.note_inserted(&key);
        } else {
            self.touch(&key);
        }

        let result = future.await;
        if self.reject_failed && result.is_err() {
            self.evict_if_current(&key, id);
        }
        result
    }

    /// Returns the resolved cached value for `args`, if any.
    ///
    /// `None` when the key is absent, the slot is past its deadline, the
    /// cached future is still in flight, or caching is disabled. A
    /// resolved hit refreshes recency.
    pub fn cached_value(&self, args: &A) -> Option<Result<T, E>> {
        if !self.ttl.caches() {
            return None;
        }
        let key = (self.resolver)(args);
        let resolved = {
            let slot = self.slots.get(&key)?;
            if !slot.is_live(Instant::now()) {
                return None;
            }
            slot.future.peek().cloned()
        };
        if resolved.is_some() {
            self.touch(&key);
        }
        resolved
    }

    /// Removes the entry for `args`. Callers already awaiting its shared
    /// future still receive the result.
    pub fn clear_entry(&self, args: &A) {
        if !self.ttl.caches() {
            return;
        }
        let key = (self.resolver)(args);
        if self.slots.remove(&key).is_some() {
            self.forget_order(&key);
        }
    }

    /// Removes every entry.
    pub fn clear_cache(&self) {
        self.slots.clear();
        self.order.lock().clear();
    }

    /// Number of cached slots, including ones past their deadline that no
    /// access has replaced yet.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the cache holds no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Hit/miss counters for this engine.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn lookup_or_populate<Fut>(&self, key: &str, args: A) -> (SharedResult<T, E>, u64, bool)
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let now = Instant::now();
        // The entry guard is dropped before any order-queue work: eviction
        // must never remove another key while a map shard is locked.
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    #[cfg(feature = "stats")]
                    self.stats.record_hit();
                    let slot = occupied.get();
                    (slot.future.clone(), slot.id, false)
                } else {
                    #[cfg(feature = "stats")]
                    self.stats.record_miss();
                    let slot = self.fresh_slot(args, now);
                    let handle = (slot.future.clone(), slot.id, false);
                    occupied.insert(slot);
                    handle
                }
            }
            Entry::Vacant(vacant) => {
                #[cfg(feature = "stats")]
                self.stats.record_miss();
                let slot = self.fresh_slot(args, now);
                let handle = (slot.future.clone(), slot.id, true);
                vacant.insert(slot);
                handle
            }
        }
    }

    fn fresh_slot<Fut>(&self, args: A, now: Instant) -> AsyncSlot<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        AsyncSlot {
            future: (self.callee)(args).boxed().shared(),
            id: next_entry_id(),
            expires_at: self.ttl.deadline_after(now),
        }
    }

    /// Appends a freshly inserted key to the recency queue and evicts the
    /// least recently used keys while over the size limit.
    fn note_inserted(&self, key: &str) {
        let mut evicted = Vec::new();
        {
            let mut order = self.order.lock();
            order.push_back(key.to_string());
            if let Some(max_size) = self.max_size {
                while order.len() > max_size {
                    if let Some(oldest) = order.pop_front() {
                        evicted.push(oldest);
                    } else {
                        break;
                    }
                }
            }
        }
        for oldest in evicted {
            self.slots.remove(&oldest);
        }
    }

    fn touch(&self, key: &str) {
        let mut order = self.order.lock();
        if let Some(pos) = order.iter().position(|k| k == key) {
            order.remove(pos);
            order.push_back(key.to_string());
        }
    }

    fn forget_order(&self, key: &str) {
        let mut order = self.order.lock();
        if let Some(pos) = order.iter().position(|k| k == key) {
            order.remove(pos);
        }
    }

    /// Evicts the slot for `key` only if it is still the one identified by
    /// `id`; a repopulated slot stays.
    fn evict_if_current(&self, key: &str, id: u64) {
        let removed = self.slots.remove_if(key, |_, slot| slot.id == id).is_some();
        if removed {
            self.forget_order(key);
        }
    }
}

/// Configures and builds an [`AsyncMemo`].
///
/// # Options
///
/// | option | effect |
/// |---|---|
/// | [`ttl`](AsyncMemoBuilder::ttl) | expiry per entry; `Ttl::Off` / `Duration::ZERO` disables caching |
/// | [`resolver`](AsyncMemoBuilder::resolver) | overrides how arguments map to a cache key |
/// | [`max_size`](AsyncMemoBuilder::max_size) | entry limit with LRU eviction (unbounded if omitted) |
/// | [`reject_failed`](AsyncMemoBuilder::reject_failed) | whether `Err` results are evicted once observed (default `true`) |
/// | [`name`](AsyncMemoBuilder::name) | registers the engine's statistics under a name (`stats` feature) |
pub struct AsyncMemoBuilder<A, T, E, F> {
    callee: F,
    ttl: Ttl,
    reject_failed: bool,
    max_size: Option<usize>,
    resolver: Box<dyn Fn(&A) -> String + Send + Sync>,
    #[cfg(feature = "stats")]
    name: Option<String>,
    _result: PhantomData<fn() -> (T, E)>,
}

impl<A, T, E, F> AsyncMemoBuilder<A, T, E, F> {
    /// Sets the expiry configuration; `Duration::ZERO` normalizes to
    /// [`Ttl::Off`].
    pub fn ttl(mut self, ttl: impl Into<Ttl>) -> Self {
        self.ttl = match ttl.into() {
            Ttl::After(duration) if duration.is_zero() => Ttl::Off,
            other => other,
        };
        self
    }

    /// Caps the cache at `max_size` entries with LRU eviction.
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Overrides how arguments map to a cache key.
    pub fn resolver<K, F2>(mut self, resolver: F2) -> Self
    where
        K: CacheableKey,
        F2: Fn(&A) -> K + Send + Sync + 'static,
    {
        self.resolver = Box::new(move |args| resolver(args).to_cache_key());
        self
    }

    /// Controls automatic eviction of failed results. With `false`, an
    /// `Err` stays cached until it expires like any other value.
    pub fn reject_failed(mut self, reject: bool) -> Self {
        self.reject_failed = reject;
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

    /// Finishes the builder.
    pub fn build(self) -> AsyncMemo<A, T, E, F> {
        #[cfg(feature = "stats")]
        let stats = Arc::new(CacheStats::new());
        #[cfg(feature = "stats")]
        if let Some(name) = &self.name {
            stats_registry::register(name, Arc::clone(&stats));
        }

        AsyncMemo {
            callee: self.callee,
            ttl: self.ttl,
            reject_failed: self.reject_failed,
            max_size: self.max_size,
            slots: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            resolver: self.resolver,
            #[cfg(feature = "stats")]
            stats,
        }
    }
}
