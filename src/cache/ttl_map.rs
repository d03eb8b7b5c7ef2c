// src/cache/ttl_map.rs

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Far enough in the future to stand in for "never" without overflowing.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// A stored value and the instant it stops being visible.
#[derive(Debug)]
pub struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration, now: Instant) -> Self {
        Self {
            value,
            expires_at: deadline_after(now, ttl),
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// An entry is expired from its deadline onwards, so a zero TTL is never
    /// visible.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    pub fn refresh(&mut self, ttl: Duration, now: Instant) {
        self.expires_at = deadline_after(now, ttl);
    }
}

fn deadline_after(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl)
        .unwrap_or_else(|| now + FAR_FUTURE)
}

/// String-keyed map whose entries carry their own expiry.
///
/// Expired entries are dropped lazily on [`TtlMap::get`] and in bulk by
/// [`TtlMap::purge_expired_where`]. Callers provide the clock so that one
/// `now` is used consistently across a compound operation.
#[derive(Debug)]
pub struct TtlMap<V> {
    entries: HashMap<String, CacheEntry<V>>,
}

impl<V> Default for TtlMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> TtlMap<V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Insert or replace `key`. The previous entry, expired or not, is discarded.
    pub fn insert(&mut self, key: impl Into<String>, value: V, ttl: Duration, now: Instant) {
        self.entries
            .insert(key.into(), CacheEntry::new(value, ttl, now));
    }

    /// Live value for `key`; an expired entry is removed and reported as absent.
    pub fn get(&mut self, key: &str, now: Instant) -> Option<&V> {
        if self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired_at(now))
        {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(CacheEntry::value)
    }

    /// Raw access to an entry regardless of expiry.
    pub fn entry_mut(&mut self, key: &str) -> Option<&mut CacheEntry<V>> {
        self.entries.get_mut(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.remove(key).map(CacheEntry::into_value)
    }

    /// Remove every expired entry for which `pinned` returns false.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired_where<F>(&mut self, now: Instant, pinned: F) -> usize
    where
        F: Fn(&V) -> bool,
    {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !entry.is_expired_at(now) || pinned(&entry.value));
        before - self.entries.len()
    }

    pub fn purge_expired(&mut self, now: Instant) -> usize {
        self.purge_expired_where(now, |_| false)
    }

    /// Number of entries that are still live at `now`.
    pub fn live_len(&self, now: Instant) -> usize {
        self.entries
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .count()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn stored_len(&self) -> usize {
        self.entries.len()
    }
}
