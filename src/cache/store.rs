// src/cache/store.rs

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::sweeper::Sweep;
use super::ttl_map::TtlMap;
use super::{DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL};
use crate::config::CacheSection;

type ErasedValue = Box<dyn Any + Send + Sync>;

static GLOBAL: OnceLock<Arc<ExpiringCache>> = OnceLock::new();

/// Thread-safe, type-erased cache where every entry has its own TTL.
///
/// - `get` of an expired key behaves exactly like `get` of a missing key.
/// - `get::<T>` of a key holding some other type is a miss, not an error.
///   Callers are expected to recreate the value.
/// - `set` purges unrelated expired entries at most once per sweep interval;
///   [`spawn_sweeper`](super::spawn_sweeper) can do the same in the background.
///
/// The internal lock is only held for in-memory map operations.
pub struct ExpiringCache {
    state: Mutex<CacheState>,
    default_ttl: Duration,
    sweep_interval: Duration,
}

struct CacheState {
    entries: TtlMap<ErasedValue>,
    last_sweep: Instant,
}

impl fmt::Debug for ExpiringCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiringCache")
            .field("default_ttl", &self.default_ttl)
            .field("sweep_interval", &self.sweep_interval)
            .finish_non_exhaustive()
    }
}

impl Default for ExpiringCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_SWEEP_INTERVAL)
    }
}

impl ExpiringCache {
    pub fn new(default_ttl: Duration, sweep_interval: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: TtlMap::new(),
                last_sweep: Instant::now(),
            }),
            default_ttl,
            sweep_interval,
        }
    }

    pub fn from_config(cfg: &CacheSection) -> Self {
        Self::new(cfg.default_ttl, cfg.sweep_interval)
    }

    /// Process-wide cache, created on first use and never torn down.
    ///
    /// Uses the built-in defaults unless [`ExpiringCache::init_global`] ran
    /// first. It relies on housekeeping during `set`; spawn a sweeper on it
    /// from inside a runtime if keys are written and then abandoned.
    pub fn global() -> &'static Arc<ExpiringCache> {
        GLOBAL.get_or_init(|| Arc::new(ExpiringCache::default()))
    }

    /// Create the process-wide cache from `[cache]`.
    ///
    /// The first initialisation wins. A later call with different settings
    /// keeps the existing instance and logs a warning.
    pub fn init_global(cfg: &CacheSection) -> &'static Arc<ExpiringCache> {
        let cache = GLOBAL.get_or_init(|| Arc::new(ExpiringCache::from_config(cfg)));
        if cache.default_ttl != cfg.default_ttl || cache.sweep_interval != cfg.sweep_interval {
            warn!(
                default_ttl = ?cache.default_ttl,
                sweep_interval = ?cache.sweep_interval,
                "global cache already initialised; ignoring new settings"
            );
        }
        cache
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Insert or replace `key`, visible for `ttl` from now.
    pub fn set<T>(&self, key: impl Into<String>, value: T, ttl: Duration)
    where
        T: Send + Sync + 'static,
    {
        let key = key.into();
        let now = Instant::now();
        let mut state = self.lock_state();

        // Housekeeping runs before the insert so the new entry is never a victim.
        if now.saturating_duration_since(state.last_sweep) >= self.sweep_interval {
            let removed = state.entries.purge_expired(now);
            state.last_sweep = now;
            if removed > 0 {
                debug!(removed, "purged expired cache entries during set");
            }
        }

        trace!(key = %key, ttl_ms = ttl.as_millis() as u64, "cache set");
        state.entries.insert(key, Box::new(value), ttl, now);
    }

    pub fn set_default<T>(&self, key: impl Into<String>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.set(key, value, self.default_ttl);
    }

    /// Live value stored under `key`, if it is a `T`.
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Clone + 'static,
    {
        let now = Instant::now();
        let mut state = self.lock_state();
        state
            .entries
            .get(key, now)
            .and_then(|value| (**value).downcast_ref::<T>())
            .cloned()
    }

    /// Return the live `T` under `key`, or store and return `init()`.
    ///
    /// `init` runs under the cache lock and must be cheap; a stored value of
    /// another type is replaced.
    pub fn get_or_insert_with<T, F>(&self, key: &str, ttl: Duration, init: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let now = Instant::now();
        let mut state = self.lock_state();

        if let Some(existing) = state
            .entries
            .get(key, now)
            .and_then(|value| (**value).downcast_ref::<T>())
        {
            return existing.clone();
        }

        let value = init();
        state
            .entries
            .insert(key, Box::new(value.clone()), ttl, now);
        value
    }

    /// Remove `key`. Returns whether a live entry was removed.
    pub fn remove(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut state = self.lock_state();
        let live = state.entries.get(key, now).is_some();
        state.entries.remove(key);
        live
    }

    /// Remove all expired entries now. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.lock_state();
        state.last_sweep = now;
        state.entries.purge_expired(now)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.lock_state().entries.live_len(Instant::now())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn stored_len(&self) -> usize {
        self.lock_state().entries.stored_len()
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        // Every critical section leaves the map consistent, so a poisoned
        // lock is still safe to use.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Sweep for ExpiringCache {
    fn purge_expired(&self) -> usize {
        ExpiringCache::purge_expired(self)
    }

    fn name(&self) -> &'static str {
        "expiring-cache"
    }
}
