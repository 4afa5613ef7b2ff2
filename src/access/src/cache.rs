//! Time-bounded grant cache keyed by user id
//!
//! Cached grant sets must never outlive a grant mutation: a stale "allowed"
//! answer is a security defect. Every invalidation bumps an epoch counter,
//! and a resolution that started before the bump is never left in the cache.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::grants::UserGrants;

/// Default cache TTL (30 seconds)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Default maximum number of cached users
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Cache entry with TTL
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    created_at: Instant,
}

impl<T> CacheEntry<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Statistics about cache performance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: usize,
    /// Number of cache misses
    pub misses: usize,
    /// Number of expired entries encountered
    pub expirations: usize,
    /// Number of invalidations (per-user and global)
    pub invalidations: usize,
    /// Total number of entries in cache
    pub entries: usize,
}

impl CacheStats {
    /// Calculates the cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Grant cache shared by the resolver and the grant administration service
pub struct GrantCache {
    entries: Arc<DashMap<String, CacheEntry<UserGrants>>>,
    ttl: Duration,
    max_entries: usize,
    epoch: AtomicU64,
    stats: Arc<DashMap<String, usize>>,
}

impl GrantCache {
    /// Create a cache with default TTL and capacity
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_CACHE_TTL, DEFAULT_MAX_ENTRIES)
    }

    /// Create a cache with custom TTL and capacity
    pub fn with_settings(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
            max_entries,
            epoch: AtomicU64::new(0),
            stats: Arc::new(DashMap::new()),
        }
    }

    /// Current invalidation epoch.
    ///
    /// Read it before resolving grants from the directory and pass it to
    /// [`GrantCache::insert`].
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Get cached grants for a user
    pub fn get(&self, user_id: &str) -> Option<UserGrants> {
        if let Some(entry) = self.entries.get(user_id) {
            if entry.is_expired(self.ttl) {
                drop(entry);
                self.entries.remove(user_id);
                self.increment_stat("expirations");
                self.increment_stat("misses");
                return None;
            }

            self.increment_stat("hits");
            return Some(entry.value.clone());
        }

        self.increment_stat("misses");
        None
    }

    /// Cache grants resolved while `observed_epoch` was current.
    ///
    /// Returns `false` if the entry was not kept, either because the cache
    /// is full or because an invalidation happened since `observed_epoch`.
    pub fn insert(&self, user_id: &str, grants: UserGrants, observed_epoch: u64) -> bool {
        if self.epoch() != observed_epoch {
            return false;
        }

        if self.entries.len() >= self.max_entries {
            self.purge_expired();
            if self.entries.len() >= self.max_entries {
                return false;
            }
        }

        self.entries
            .insert(user_id.to_string(), CacheEntry::new(grants));

        // An invalidation may have slipped in between the check and the insert
        if self.epoch() != observed_epoch {
            self.entries.remove(user_id);
            return false;
        }

        true
    }

    /// Drop the cached grants of one user
    pub fn invalidate(&self, user_id: &str) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.entries.remove(user_id);
        self.increment_stat("invalidations");
        debug!("Invalidated cached grants for user {}", user_id);
    }

    /// Drop every cached entry
    pub fn invalidate_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.entries.clear();
        self.increment_stat("invalidations");
        debug!("Invalidated all cached grants");
    }

    /// Remove expired entries
    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| !entry.is_expired(ttl));
    }

    /// Number of cached users
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.get_stat("hits"),
            misses: self.get_stat("misses"),
            expirations: self.get_stat("expirations"),
            invalidations: self.get_stat("invalidations"),
            entries: self.entries.len(),
        }
    }

    fn increment_stat(&self, key: &str) {
        self.stats
            .entry(key.to_string())
            .and_modify(|count| *count += 1)
            .or_insert(1);
    }

    fn get_stat(&self, key: &str) -> usize {
        self.stats.get(key).map(|v| *v).unwrap_or(0)
    }
}

impl Default for GrantCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grants::GrantSet;

    fn grants(site: &str) -> UserGrants {
        UserGrants {
            staff_id: Some("s-1".into()),
            grants: GrantSet::scoped([site.to_string()], []),
        }
    }

    #[test]
    fn test_hit_and_miss() {
        let cache = GrantCache::new();
        assert!(cache.get("u-1").is_none());

        assert!(cache.insert("u-1", grants("a"), cache.epoch()));
        assert_eq!(cache.get("u-1"), Some(grants("a")));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ttl_expiration() {
        let cache = GrantCache::with_settings(Duration::from_millis(10), 100);
        cache.insert("u-1", grants("a"), cache.epoch());

        std::thread::sleep(Duration::from_millis(25));

        assert!(cache.get("u-1").is_none());
        assert_eq!(cache.stats().expirations, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_insert_after_invalidation_is_rejected() {
        let cache = GrantCache::new();
        let observed = cache.epoch();

        // A grant mutation lands while the resolution is in flight
        cache.invalidate("u-1");

        assert!(!cache.insert("u-1", grants("a"), observed));
        assert!(cache.get("u-1").is_none());
    }

    #[test]
    fn test_invalidate_single_and_all() {
        let cache = GrantCache::new();
        cache.insert("u-1", grants("a"), cache.epoch());
        cache.insert("u-2", grants("b"), cache.epoch());

        cache.invalidate("u-1");
        assert!(cache.get("u-1").is_none());
        assert!(cache.get("u-2").is_some());

        cache.invalidate_all();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().invalidations, 2);
    }

    #[test]
    fn test_capacity_bound() {
        let cache = GrantCache::with_settings(Duration::from_secs(60), 2);
        assert!(cache.insert("u-1", grants("a"), cache.epoch()));
        assert!(cache.insert("u-2", grants("b"), cache.epoch()));
        assert!(!cache.insert("u-3", grants("c"), cache.epoch()));
        assert_eq!(cache.len(), 2);
    }
}
