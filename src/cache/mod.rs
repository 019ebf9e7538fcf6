//! Caching layer
//!
//! Cohort views are pure functions of (dataset snapshot, filter, resolution),
//! so they can be memoized safely. The cache is explicit: callers own it, and
//! reloading a dataset invalidates the entries computed from it.

pub mod view;

pub use view::{CacheStats, CacheStatsSnapshot, SharedViewCache, ViewCache, ViewCacheConfig, ViewKey};
