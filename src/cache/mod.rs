//! Route cache: a bounded, time-expiring store of pre-loaded route views.
//!
//! [`RouteCache`] maps a normalised route path (see
//! [`normalize_path`](crate::router::normalize_path)) to an [`Artifact`].
//! Entries expire a fixed TTL after insertion:
//!
//! - [`read`](RouteCache::read) never returns an expired entry and purges it on
//!   the spot.
//! - [`sweep`](RouteCache::sweep) removes every expired entry in one pass; the
//!   runtime calls it on a fixed interval.
//!
//! The cache itself is a plain synchronous structure. Sharing across tasks is
//! the job of [`Prefetcher`](crate::prefetch::Prefetcher), which keeps it
//! behind a mutex that is never held across an `.await`.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::router::normalize_path;

mod entry;

pub use entry::{Artifact, CacheEntry, Origin};

/// Default entry lifetime (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default interval between periodic sweeps (2 minutes).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(2 * 60);

/// Default maximum number of stored routes.
pub const DEFAULT_MAX_ENTRIES: usize = 50;

/// Counters describing cache activity since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub stores: u64,
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub evictions: u64,
}

/// Time-expiring store of route artifacts.
///
/// # Examples
///
/// ```
/// use navcache::{Artifact, RouteCache};
///
/// let mut cache = RouteCache::new();
/// cache.store("/kyc-portal/", Artifact::from("kyc"));
///
/// // Trailing slashes are normalised.
/// assert_eq!(cache.read("/kyc-portal"), Some(Artifact::from("kyc")));
/// assert_eq!(cache.read("/payment"), None);
/// ```
#[derive(Debug)]
pub struct RouteCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
    // 0 means unbounded
    max_entries: usize,
    stats: CacheStats,
}

impl Default for RouteCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteCache {
    /// Creates an empty cache with [`DEFAULT_TTL`] and [`DEFAULT_MAX_ENTRIES`].
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
            stats: CacheStats::default(),
        }
    }

    /// Sets the entry lifetime.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the capacity. `0` disables the bound.
    #[must_use]
    pub fn max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Returns the configured entry lifetime.
    pub fn entry_ttl(&self) -> Duration {
        self.ttl
    }

    /// Inserts or overwrites the entry for `key`, stamped with the current time.
    ///
    /// The entry is visible to the next [`read`](Self::read) immediately.
    pub fn store(&mut self, key: &str, artifact: Artifact) {
        self.insert(key, artifact, Origin::Cached);
    }

    /// Inserts with an explicit [`Origin`]. Last write wins; the timestamp is
    /// reset on overwrite.
    pub fn insert(&mut self, key: &str, artifact: Artifact, origin: Origin) {
        let key = normalize_path(key);
        let now = Instant::now();

        if !self.entries.contains_key(key) {
            self.make_room(now);
        }

        trace!(route = %key, %origin, len = artifact.len(), "storing route artifact");
        self.entries
            .insert(key.to_owned(), CacheEntry::new(artifact, origin, now));
        self.stats.stores += 1;
    }

    /// Returns the artifact for `key` if present and not expired.
    ///
    /// An expired entry is removed as a side effect. A miss is a normal outcome.
    pub fn read(&mut self, key: &str) -> Option<Artifact> {
        let key = normalize_path(key);
        let now = Instant::now();

        let expired = match self.entries.get(key) {
            None => {
                self.stats.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired_at(now, self.ttl),
        };

        if expired {
            self.entries.remove(key);
            self.stats.expirations += 1;
            self.stats.misses += 1;
            debug!(route = %key, "cached route expired on read");
            return None;
        }

        self.stats.hits += 1;
        self.entries.get(key).map(|entry| entry.artifact().clone())
    }

    /// Returns `true` if a live (unexpired) entry exists for `key`.
    ///
    /// Unlike [`read`](Self::read) this neither purges nor counts.
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .get(normalize_path(key))
            .is_some_and(|entry| !entry.is_expired_at(now, self.ttl))
    }

    /// Returns the raw entry for `key`, expired or not.
    pub fn entry(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(normalize_path(key))
    }

    /// Removes the entry for `key`, returning its artifact.
    pub fn remove(&mut self, key: &str) -> Option<Artifact> {
        self.entries
            .remove(normalize_path(key))
            .map(|entry| entry.artifact().clone())
    }

    /// Removes every entry unconditionally.
    pub fn clear(&mut self) {
        let removed = self.entries.len();
        self.entries.clear();
        debug!(removed, "route cache cleared");
    }

    /// Removes every entry older than the TTL and returns how many were dropped.
    pub fn sweep(&mut self) -> usize {
        let now = Instant::now();
        let ttl = self.ttl;
        let before = self.entries.len();

        self.entries.retain(|_, entry| !entry.is_expired_at(now, ttl));

        let removed = before - self.entries.len();
        self.stats.expirations += removed as u64;
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "swept expired routes");
        }
        removed
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates stored route keys in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Snapshot of the activity counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    // Frees one slot for a new key when the cache is at capacity: expired entries
    // go first, then the oldest live entry.
    fn make_room(&mut self, now: Instant) {
        if self.max_entries == 0 || self.entries.len() < self.max_entries {
            return;
        }

        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now, ttl));
        self.stats.expirations += (before - self.entries.len()) as u64;

        if self.entries.len() < self.max_entries {
            return;
        }

        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.created_at())
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            self.entries.remove(&key);
            self.stats.evictions += 1;
            debug!(route = %key, "evicted oldest route to make room");
        }
    }
}
