//! Cohort View Cache
//!
//! Memoizes [`CohortViews`] per (dataset snapshot, filter, resolution,
//! empty-bucket policy). Supports:
//! - LRU eviction once `max_entries` is reached
//! - manual invalidation of every entry computed from a dataset, called when
//!   that dataset is reloaded
//!
//! There is no TTL: a record store is an immutable snapshot, so an entry can
//! only become stale through a reload.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

use crate::aggregation::{CohortFilter, CohortViews, EmptyBucketPolicy};
use crate::types::{DatasetId, DatasetKind, TimeResolution};

// ============================================================================
// Cache Configuration
// ============================================================================

/// Configuration for the view cache
#[derive(Debug, Clone)]
pub struct ViewCacheConfig {
    /// Maximum number of cached view pairs (default: 256)
    pub max_entries: usize,

    /// Enable cache (default: true)
    pub enabled: bool,
}

impl Default for ViewCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 256,
            enabled: true,
        }
    }
}

impl ViewCacheConfig {
    /// Set maximum entries
    pub fn with_max_entries(mut self, entries: usize) -> Self {
        self.max_entries = entries;
        self
    }

    /// Disable caching
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

// ============================================================================
// Cache Key
// ============================================================================

/// Everything that determines the content of a [`CohortViews`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewKey {
    /// Dataset snapshot
    pub dataset: DatasetId,
    /// Cohort filter
    pub filter: CohortFilter,
    /// Time resolution
    pub resolution: TimeResolution,
    /// Empty-bucket policy
    pub policy: EmptyBucketPolicy,
}

impl ViewKey {
    /// Key with the default empty-bucket policy
    pub fn new(dataset: DatasetId, filter: CohortFilter, resolution: TimeResolution) -> Self {
        Self {
            dataset,
            filter,
            resolution,
            policy: EmptyBucketPolicy::Drop,
        }
    }

    /// Set the empty-bucket policy
    pub fn with_policy(mut self, policy: EmptyBucketPolicy) -> Self {
        self.policy = policy;
        self
    }
}

// ============================================================================
// Cache Entry
// ============================================================================

struct CacheEntry {
    views: Arc<CohortViews>,
    last_accessed: Instant,
}

impl CacheEntry {
    fn new(views: Arc<CohortViews>) -> Self {
        Self {
            views,
            last_accessed: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }
}

// ============================================================================
// View Cache
// ============================================================================

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Total cache hits
    pub hits: AtomicU64,

    /// Total cache misses
    pub misses: AtomicU64,

    /// Total evictions
    pub evictions: AtomicU64,

    /// Total entries removed by invalidation
    pub invalidations: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStatsSnapshot {
    /// Total cache hits
    pub hits: u64,
    /// Total cache misses
    pub misses: u64,
    /// Total evictions
    pub evictions: u64,
    /// Total entries removed by invalidation
    pub invalidations: u64,
    /// Entries currently cached
    pub entries: usize,
}

/// LRU memo table for cohort views
pub struct ViewCache {
    config: ViewCacheConfig,
    entries: RwLock<HashMap<ViewKey, CacheEntry>>,
    stats: CacheStats,
}

impl ViewCache {
    /// Create a new view cache
    pub fn new(config: ViewCacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            stats: CacheStats::default(),
        }
    }

    /// Get cached views
    pub fn get(&self, key: &ViewKey) -> Option<Arc<CohortViews>> {
        if !self.config.enabled {
            return None;
        }

        let mut entries = self.entries.write();
        if let Some(entry) = entries.get_mut(key) {
            entry.touch();
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            trace!(dataset = %key.dataset, filter = %key.filter, "View cache hit");
            return Some(Arc::clone(&entry.views));
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        trace!(dataset = %key.dataset, filter = %key.filter, "View cache miss");
        None
    }

    /// Cache views under `key`
    pub fn put(&self, key: ViewKey, views: Arc<CohortViews>) {
        if !self.config.enabled || self.config.max_entries == 0 {
            return;
        }

        let mut entries = self.entries.write();
        if !entries.contains_key(&key) {
            while entries.len() >= self.config.max_entries {
                self.evict_lru(&mut entries);
            }
        }
        entries.insert(key, CacheEntry::new(views));
    }

    /// Return cached views or compute, cache and return them
    ///
    /// `compute` runs without holding the cache lock.
    pub fn get_or_compute<F>(&self, key: ViewKey, compute: F) -> Arc<CohortViews>
    where
        F: FnOnce() -> CohortViews,
    {
        if let Some(views) = self.get(&key) {
            return views;
        }

        let views = Arc::new(compute());
        self.put(key, Arc::clone(&views));
        views
    }

    /// Remove one entry
    pub fn invalidate(&self, key: &ViewKey) {
        if self.entries.write().remove(key).is_some() {
            self.stats.invalidations.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove every entry computed from any generation of `kind`
    ///
    /// Call this when the dataset is reloaded. Returns the number of
    /// entries removed.
    pub fn invalidate_dataset(&self, kind: DatasetKind) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| key.dataset.kind != kind);
        let removed = before - entries.len();

        self.stats
            .invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
        debug!(dataset = %kind, removed, "View cache invalidated");
        removed
    }

    /// Clear all cache entries
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Copy of the current statistics
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            invalidations: self.stats.invalidations.load(Ordering::Relaxed),
            entries: self.entry_count(),
        }
    }

    /// Get hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.stats.hits.load(Ordering::Relaxed);
        let misses = self.stats.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Get number of cached entries
    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }

    /// Evict the least recently used entry
    fn evict_lru(&self, entries: &mut HashMap<ViewKey, CacheEntry>) {
        let lru_key = entries
            .iter()
            .min_by_key(|(_, e)| e.last_accessed)
            .map(|(k, _)| k.clone());

        if let Some(key) = lru_key {
            entries.remove(&key);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new(ViewCacheConfig::default())
    }
}

/// Thread-safe wrapper for shared cache access
pub type SharedViewCache = Arc<ViewCache>;

// ============================================================================
// Tests
// ============================================================================
