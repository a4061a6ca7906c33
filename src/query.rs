//! Keyed query results with a freshness window.
//!
//! [`QueryCache`] keeps the last value per key: values younger than
//! `stale_time` are served as fresh, older ones are served as stale (the
//! caller refreshes in the background), and anything past `cache_time` is
//! dropped. [`QueryStore`] layers an independent loading/error state per key
//! on top, which is what each catalog card and the detail screen render from.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub stale_time: Duration,
    pub cache_time: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(60 * 60),
            cache_time: Duration::from_secs(60 * 60 * 24),
        }
    }
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    updated_at: Instant,
}

#[derive(Debug, PartialEq)]
pub enum Lookup<'a, V> {
    Fresh(&'a V),
    Stale(&'a V),
    Miss,
}

#[derive(Debug)]
pub struct QueryCache<V> {
    policy: CachePolicy,
    entries: HashMap<String, Entry<V>>,
}

impl<V> QueryCache<V> {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
        }
    }

    pub fn lookup(&self, key: &str, now: Instant) -> Lookup<'_, V> {
        let Some(entry) = self.entries.get(key) else {
            return Lookup::Miss;
        };
        let age = now.saturating_duration_since(entry.updated_at);
        if age >= self.policy.cache_time {
            Lookup::Miss
        } else if age >= self.policy.stale_time {
            Lookup::Stale(&entry.value)
        } else {
            Lookup::Fresh(&entry.value)
        }
    }

    pub fn get(&self, key: &str, now: Instant) -> Option<&V> {
        match self.lookup(key, now) {
            Lookup::Fresh(v) | Lookup::Stale(v) => Some(v),
            Lookup::Miss => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V, now: Instant) {
        self.entries.insert(
            key.into(),
            Entry {
                value,
                updated_at: now,
            },
        );
    }

    /// Drop entries past the cache horizon. Returns how many were removed.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let horizon = self.policy.cache_time;
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.updated_at) < horizon);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

// ---------------------------------------------------------------------------
// Per-key query state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Pending {
    Loading,
    Failed(Arc<String>),
}

/// What a view should render for one key.
#[derive(Debug, PartialEq)]
pub enum QueryState<'a, V> {
    Idle,
    Loading,
    Loaded(&'a V),
    Failed(&'a str),
}

/// Independent `idle -> loading -> loaded | failed` state per key.
///
/// Keys never share state: resolving or failing one key leaves every other
/// key untouched, whatever order the fetches complete in.
#[derive(Debug)]
pub struct QueryStore<V> {
    cache: QueryCache<V>,
    pending: HashMap<String, Pending>,
}

impl<V> QueryStore<V> {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            cache: QueryCache::new(policy),
            pending: HashMap::new(),
        }
    }

    /// Mark `key` as relevant. Returns `true` when the caller must start a
    /// fetch: nothing usable is cached and no fetch is outstanding, or the
    /// cached value went stale and needs a background refresh.
    ///
    /// A failed key stays failed; use [`QueryStore::retry`] to re-trigger.
    pub fn ensure(&mut self, key: &str, now: Instant) -> bool {
        let cached = self.cache.lookup(key, now);
        match (cached, self.pending.get(key)) {
            (Lookup::Fresh(_), _) => false,
            (_, Some(Pending::Loading)) => false,
            (Lookup::Stale(_), _) => {
                self.pending.insert(key.to_string(), Pending::Loading);
                true
            }
            (Lookup::Miss, Some(Pending::Failed(_))) => false,
            (Lookup::Miss, None) => {
                self.pending.insert(key.to_string(), Pending::Loading);
                true
            }
        }
    }

    /// Re-trigger a failed key. Returns `true` when a fetch must start.
    pub fn retry(&mut self, key: &str) -> bool {
        match self.pending.get(key) {
            Some(Pending::Failed(_)) => {
                self.pending.insert(key.to_string(), Pending::Loading);
                true
            }
            _ => false,
        }
    }

    pub fn resolve(&mut self, key: &str, result: Result<V, Arc<String>>, now: Instant) {
        match result {
            Ok(value) => {
                self.pending.remove(key);
                self.cache.insert(key, value, now);
            }
            Err(e) if self.cache.get(key, now).is_some() => {
                // A background refresh failed; keep serving the stale value.
                tracing::warn!(%key, error = %e, "refresh failed, keeping cached value");
                self.pending.remove(key);
            }
            Err(e) => {
                self.pending.insert(key.to_string(), Pending::Failed(e));
            }
        }
    }

    pub fn state(&self, key: &str, now: Instant) -> QueryState<'_, V> {
        if let Some(value) = self.cache.get(key, now) {
            return QueryState::Loaded(value);
        }
        match self.pending.get(key) {
            Some(Pending::Loading) => QueryState::Loading,
            Some(Pending::Failed(e)) => QueryState::Failed(e.as_str()),
            None => QueryState::Idle,
        }
    }

    pub fn get(&self, key: &str, now: Instant) -> Option<&V> {
        self.cache.get(key, now)
    }

    pub fn is_fetching(&self, key: &str) -> bool {
        matches!(self.pending.get(key), Some(Pending::Loading))
    }

    pub fn evict_expired(&mut self, now: Instant) -> usize {
        self.cache.evict_expired(now)
    }
}
