// src/cache/mod.rs

//! Expiring in-memory storage.
//!
//! - [`ttl_map`] is the entry map with per-entry expiry shared by everything
//!   below. It owns the eviction rules; it has no locking of its own.
//! - [`store`] provides [`ExpiringCache`], a type-erased memoization cache.
//! - [`sweeper`] runs periodic purges for anything implementing [`Sweep`].
//!
//! The per-target lock registry in [`crate::locks`] reuses [`TtlMap`] for its
//! own storage instead of sharing the cache.

use std::time::Duration;

pub mod store;
pub mod sweeper;
pub mod ttl_map;

pub use store::ExpiringCache;
pub use sweeper::{Sweep, spawn_sweeper};
pub use ttl_map::{CacheEntry, TtlMap};

/// TTL used by [`ExpiringCache::set_default`] and the global cache.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// How often expired entries are purged when nobody reads them.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(150);
