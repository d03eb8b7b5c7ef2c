// src/locks.rs

//! Process-local registry of named exclusive locks.
//!
//! Each key maps to one async mutex. Entries are created lazily, refreshed on
//! every lookup and reclaimed once they have been idle past their TTL, either
//! by a [`spawn_sweeper`](crate::cache::spawn_sweeper) task or by the
//! housekeeping pass `get_or_create` runs once per sweep interval. An
//! entry that is still referenced outside the registry (held, or being
//! waited on) is never reclaimed, so two live locks for the same key cannot
//! coexist.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::cache::{DEFAULT_SWEEP_INTERVAL, Sweep, TtlMap};

type SharedMutex = Arc<AsyncMutex<()>>;

/// Registry of per-key locks. Construct once and share it behind an `Arc`.
pub struct NamedLockRegistry {
    state: Mutex<RegistryState>,
    ttl: Duration,
    sweep_interval: Duration,
}

struct RegistryState {
    entries: TtlMap<SharedMutex>,
    last_sweep: Instant,
}

impl fmt::Debug for NamedLockRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedLockRegistry")
            .field("ttl", &self.ttl)
            .field("sweep_interval", &self.sweep_interval)
            .field("len", &self.len())
            .finish()
    }
}

impl NamedLockRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self::with_sweep_interval(ttl, DEFAULT_SWEEP_INTERVAL)
    }

    /// Registry whose lookups also reclaim idle locks at most once per
    /// `sweep_interval`.
    pub fn with_sweep_interval(ttl: Duration, sweep_interval: Duration) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                entries: TtlMap::new(),
                last_sweep: Instant::now(),
            }),
            ttl,
            sweep_interval,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Look up the lock for `key`, creating it if needed.
    ///
    /// Lookup and creation happen under one registry-wide guard, so concurrent
    /// first callers for a new key always receive the same lock.
    pub fn get_or_create(&self, key: &str) -> NamedLock {
        let now = Instant::now();
        let mut state = self.lock_state();

        if now.saturating_duration_since(state.last_sweep) >= self.sweep_interval {
            let removed = state.entries.purge_expired_where(now, is_referenced);
            state.last_sweep = now;
            if removed > 0 {
                debug!(removed, "reclaimed idle named locks during lookup");
            }
        }

        let entries = &mut state.entries;
        // An expired entry that someone still references must be revived,
        // not replaced.
        let reusable = entries.entry_mut(key).and_then(|entry| {
            if entry.is_expired_at(now) && !is_referenced(entry.value()) {
                return None;
            }
            entry.refresh(self.ttl, now);
            Some(Arc::clone(entry.value()))
        });

        let mutex = match reusable {
            Some(mutex) => mutex,
            None => {
                trace!(key, "creating named lock");
                let mutex: SharedMutex = Arc::new(AsyncMutex::new(()));
                entries.insert(key, Arc::clone(&mutex), self.ttl, now);
                mutex
            }
        };

        NamedLock {
            key: Arc::from(key),
            mutex,
        }
    }

    /// Drop idle locks whose TTL has elapsed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let removed = {
            let mut state = self.lock_state();
            state.last_sweep = now;
            state.entries.purge_expired_where(now, is_referenced)
        };
        if removed > 0 {
            debug!(removed, "reclaimed idle named locks");
        }
        removed
    }

    /// Number of registered locks, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.lock_state().entries.stored_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Sweep for NamedLockRegistry {
    fn purge_expired(&self) -> usize {
        NamedLockRegistry::purge_expired(self)
    }

    fn name(&self) -> &'static str {
        "named-locks"
    }
}

/// The registry holds one reference; any other means a `NamedLock` or guard
/// is alive somewhere.
fn is_referenced(mutex: &SharedMutex) -> bool {
    Arc::strong_count(mutex) > 1
}

/// Handle to one named lock. Cheap to clone.
#[derive(Clone)]
pub struct NamedLock {
    key: Arc<str>,
    mutex: SharedMutex,
}

impl fmt::Debug for NamedLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedLock").field("key", &self.key).finish()
    }
}

impl NamedLock {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Wait until the lock is free and take it.
    pub async fn lock(&self) -> NamedLockGuard {
        let guard = Arc::clone(&self.mutex).lock_owned().await;
        trace!(key = %self.key, "named lock acquired");
        NamedLockGuard {
            key: Arc::clone(&self.key),
            _guard: guard,
        }
    }

    /// Take the lock if it is free right now.
    pub fn try_lock(&self) -> Option<NamedLockGuard> {
        let guard = Arc::clone(&self.mutex).try_lock_owned().ok()?;
        Some(NamedLockGuard {
            key: Arc::clone(&self.key),
            _guard: guard,
        })
    }

    /// Whether both handles refer to the same underlying lock.
    pub fn same_lock(&self, other: &NamedLock) -> bool {
        Arc::ptr_eq(&self.mutex, &other.mutex)
    }
}

/// Exclusive hold on a named lock; released on drop.
pub struct NamedLockGuard {
    key: Arc<str>,
    _guard: OwnedMutexGuard<()>,
}

impl NamedLockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for NamedLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedLockGuard")
            .field("key", &self.key)
            .finish()
    }
}

impl Drop for NamedLockGuard {
    fn drop(&mut self) {
        trace!(key = %self.key, "named lock released");
    }
}
