use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;

use crate::expiry::{self, ExpireTarget};
use crate::memo::Ttl;
use crate::store::CacheStore;

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Hands out a process-unique identity for a cache entry.
///
/// The identity is what lets a stale timer recognize that the key it was
/// armed for has since been repopulated, so it must never delete the newer
/// entry.
pub(crate) fn next_entry_id() -> u64 {
    NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed)
}

/// What a store maps a cache key to: the memoized value plus the entry's
/// lifecycle state (identity, timer epoch, weak back-reference to the
/// cache it lives in).
///
/// Slots are cheap to clone; the lifecycle state is shared behind an
/// [`Arc`].
#[derive(Clone)]
pub struct CacheSlot<R> {
    value: R,
    entry: Arc<dyn EntryOps>,
}

impl<R> CacheSlot<R> {
    pub(crate) fn new(value: R, entry: Arc<dyn EntryOps>) -> Self {
        Self { value, entry }
    }

    /// The memoized value.
    pub fn value(&self) -> &R {
        &self.value
    }

    /// The cache key this slot is stored under.
    pub fn key(&self) -> &str {
        self.entry.key()
    }

    pub(crate) fn entry_id(&self) -> u64 {
        self.entry.id()
    }

    pub(crate) fn cancel_timer(&self) {
        self.entry.cancel_timer();
    }
}

/// Type-erased lifecycle operations of one cache entry.
///
/// Erasure breaks the type-level cycle between slots (stored inside the
/// cache) and the entry state (which must name the concrete cache type to
/// reach back into it).
pub(crate) trait EntryOps: Send + Sync {
    fn id(&self) -> u64;
    fn key(&self) -> &str;
    /// Invalidates any pending timer without touching the cache.
    fn cancel_timer(&self);
    /// Cancels the timer and removes the entry from the cache, if the
    /// cache is still alive and still holds this very entry.
    fn clear(&self);
    /// Cancels any prior timer and arms a new one per `ttl`.
    fn rearm(&self, ttl: Ttl);
}

/// Concrete lifecycle state of one entry, parameterized by the cache type
/// it can reach back into.
///
/// Holds the cache only weakly: a pending timer must not keep an otherwise
/// unreachable cache alive.
pub(crate) struct EntryCore<C, R> {
    id: u64,
    key: String,
    epoch: AtomicU64,
    cache: Weak<Mutex<C>>,
    weak_self: Weak<EntryCore<C, R>>,
    _value: PhantomData<fn() -> R>,
}

impl<C, R> EntryCore<C, R>
where
    C: CacheStore<CacheSlot<R>> + Send + 'static,
    R: Clone + Send + 'static,
{
    pub(crate) fn new(key: String, cache: Weak<Mutex<C>>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            id: next_entry_id(),
            key,
            epoch: AtomicU64::new(0),
            cache,
            weak_self: weak_self.clone(),
            _value: PhantomData,
        })
    }

    /// Removes this entry from the cache, identity-checked: a newer entry
    /// stored under the same key is left alone.
    fn remove_from_cache(&self) {
        if let Some(cache) = self.cache.upgrade() {
            let mut cache = cache.lock();
            let is_current = cache
                .get(&self.key)
                .map_or(false, |slot| slot.entry_id() == self.id);
            if is_current {
                cache.remove(&self.key);
            }
        }
    }
}

impl<C, R> EntryOps for EntryCore<C, R>
where
    C: CacheStore<CacheSlot<R>> + Send + 'static,
    R: Clone + Send + 'static,
{
    fn id(&self) -> u64 {
        self.id
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn cancel_timer(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    fn clear(&self) {
        self.cancel_timer();
        self.remove_from_cache();
    }

    fn rearm(&self, ttl: Ttl) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ttl::After(duration) = ttl {
            let target: Weak<dyn ExpireTarget> = self.weak_self.clone();
            expiry::schedule(Instant::now() + duration, epoch, target);
        }
    }
}

impl<C, R> ExpireTarget for EntryCore<C, R>
where
    C: CacheStore<CacheSlot<R>> + Send + 'static,
    R: Clone + Send + 'static,
{
    fn expire(&self, epoch: u64) {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            // Cancelled or rearmed after this timer was scheduled.
            return;
        }
        self.remove_from_cache();
    }
}

/// Public view of one freshly cached entry, handed to the `on_cached`
/// observer.
///
/// The handle carries the entry's key and value and exposes its two
/// lifecycle operations: [`clear`](EntryHandle::clear) and
/// [`set_ttl`](EntryHandle::set_ttl). Holding a handle does not keep the
/// entry in the cache — eviction, expiry, and clears proceed regardless —
/// and the lifecycle operations are identity-checked no-ops once the entry
/// is gone.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use memolito::{Memo, Ttl};
///
/// let memo = Memo::builder(|n: u32| n * 2)
///     .ttl(Duration::from_secs(60))
///     .on_cached(|entry| {
///         // Give large results a shorter life.
///         if *entry.value() > 100 {
///             entry.set_ttl(Ttl::After(Duration::from_secs(5)));
///         }
///     })
///     .build();
///
/// assert_eq!(memo.call(3), 6);
/// ```
pub struct EntryHandle<R> {
    value: R,
    entry: Arc<dyn EntryOps>,
}

impl<R> EntryHandle<R> {
    pub(crate) fn new(value: R, entry: Arc<dyn EntryOps>) -> Self {
        Self { value, entry }
    }

    /// The cache key the entry is stored under.
    pub fn key(&self) -> &str {
        self.entry.key()
    }

    /// The value that was cached.
    pub fn value(&self) -> &R {
        &self.value
    }

    /// Cancels the entry's timer and removes it from the cache.
    ///
    /// A no-op if the cache has been dropped or the key has since been
    /// repopulated by a newer entry.
    pub fn clear(&self) {
        self.entry.clear();
    }

    /// Replaces the entry's expiry: any pending timer is cancelled and a
    /// new one armed per `ttl`. [`Ttl::Forever`] and [`Ttl::Off`] both
    /// leave the entry without a timer, so it stays cached until evicted
    /// or cleared.
    pub fn set_ttl(&self, ttl: impl Into<Ttl>) {
        self.entry.rearm(ttl.into());
    }
}

impl<R: Clone> Clone for EntryHandle<R> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            entry: Arc::clone(&self.entry),
        }
    }
}
