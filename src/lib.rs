//! # Memolito
//!
//! Timed memoization for expensive function calls.
//!
//! Memolito wraps a function, derives a cache key from each call's
//! arguments, and serves repeated calls within a time window from a cache
//! instead of recomputing. Entries expire through per-entry TTL timers,
//! are bounded by LRU eviction, and the timers hold only weak references —
//! a pending timer never keeps a dropped cache alive.
//!
//! ## Features
//!
//! - **Instance-based**: wrap any `Fn` closure; no macros, no globals
//! - **TTL expiry**: per-entry timers on a shared background worker, or
//!   `Ttl::Forever` to cache until evicted
//! - **LRU bounds**: cap the cache by entry count; hits refresh recency
//! - **Pluggable keys**: [`CacheableKey`] derivation with single-argument
//!   collapse, or a custom resolver per engine
//! - **Pluggable stores**: swap the built-in cache for an
//!   [`UnboundedCache`] or your own [`CacheStore`], shared across engines
//! - **Async coalescing**: [`AsyncMemo`] caches the in-flight future
//!   itself, so overlapping calls for one key await a single computation
//! - **Statistics**: hit/miss counters and a global name-indexed registry
//!   (`stats` feature, on by default)
//!
//! ## Quick Start
//!
//! ```
//! use std::cell::Cell;
//! use std::time::Duration;
//! use memolito::memoize;
//!
//! let calls = Cell::new(0u32);
//! let expensive = memoize(
//!     |n: u64| {
//!         calls.set(calls.get() + 1);
//!         n * n
//!     },
//!     Duration::from_secs(60),
//! );
//!
//! assert_eq!(expensive.call(12), 144);
//! assert_eq!(expensive.call(12), 144); // cache hit
//! assert_eq!(calls.get(), 1);
//! ```
//!
//! ## Bounded caches and custom configuration
//!
//! ```
//! use std::time::Duration;
//! use memolito::Memo;
//!
//! let lookup = Memo::builder(|id: u32| format!("user:{id}"))
//!     .ttl(Duration::from_secs(30))
//!     .max_size(1_000)
//!     .build();
//!
//! lookup.call(7);
//! assert_eq!(lookup.cached_value(&7), Some("user:7".to_string()));
//! ```
//!
//! ## Expiry semantics
//!
//! A `ttl` of `Duration::ZERO` (or [`Ttl::Off`]) disables caching
//! entirely: every call invokes the callee. [`Ttl::Forever`] caches
//! without a timer. Any positive duration arms a real timer whose
//! callback reaches the cache only through weak references, so dropping
//! the engine (and with it the cache) before the timer fires is safe.
//!
//! ## Standalone caches
//!
//! The cache behind the engine is an ordinary public type. It can be used
//! directly, or handed to several engines as a shared store:
//!
//! ```
//! use memolito::{CacheStore, LruCache};
//!
//! let mut cache = LruCache::new(Some(2));
//! cache.insert("a", 1);
//! cache.insert("b", 2);
//! cache.insert("c", 3); // evicts "a"
//! assert!(!cache.contains("a"));
//! ```

mod async_memo;
mod cache_entry;
mod expiry;
mod keys;
mod lru_cache;
mod memo;
mod store;

#[cfg(feature = "stats")]
mod stats;

#[cfg(feature = "stats")]
pub mod stats_registry;

pub use async_memo::{memoize_async, AsyncMemo, AsyncMemoBuilder};
pub use cache_entry::{CacheSlot, EntryHandle};
pub use keys::{structural_hash, CacheableKey};
pub use lru_cache::LruCache;
pub use memo::{memoize, Memo, MemoBuilder, Ttl};
pub use store::{CacheStore, UnboundedCache};

#[cfg(feature = "stats")]
pub use stats::CacheStats;
