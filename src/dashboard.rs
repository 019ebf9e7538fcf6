//! Dashboard service
//!
//! Glue between the loaded datasets, the view cache and the county name
//! reference. One interaction is `prepare(dataset, resolution, filter)`, which
//! returns the timeline and county tables for the cohort, computed at most once
//! per dataset snapshot.
//!
//! Reloading a dataset swaps in a store with the next generation and drops
//! every cached view computed from the previous one.

use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::aggregation::{CohortFilter, CohortViews, EmptyBucketPolicy};
use crate::cache::{SharedViewCache, ViewCache, ViewCacheConfig, ViewKey};
use crate::config::ApplicationConfig;
use crate::counties::CountyNames;
use crate::error::{Error, Result};
use crate::ingestion::{IngestOptions, IngestReport};
use crate::store::RecordStore;
use crate::types::{CountyCode, DatasetId, DatasetKind, ReportRow, TimeResolution};

/// County row with its display name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledCounty {
    /// County code
    pub county: CountyCode,
    /// Display name, `None` when no reference table is loaded
    pub name: Option<String>,
    /// Population count
    pub total: u64,
    /// Cohort count
    pub selected: u64,
    /// Cohort share in percent
    pub percent: f64,
}

/// Cohort size against its dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortSummary {
    /// Dataset snapshot
    pub dataset: DatasetId,
    /// Active filter
    pub filter: CohortFilter,
    /// Σ count over the cohort
    pub cohort_total: u64,
    /// Σ count over the dataset
    pub population_total: u64,
    /// Cohort share in percent
    pub percent: f64,
    /// Rows in the store
    pub rows: usize,
    /// First and last report date
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

/// Loaded datasets plus the shared view cache
pub struct DashboardService {
    stores: RwLock<HashMap<DatasetKind, RecordStore>>,
    cache: SharedViewCache,
    counties: Option<CountyNames>,
    policy: EmptyBucketPolicy,
}

impl DashboardService {
    /// Create a service with no datasets loaded
    pub fn new(cache: SharedViewCache) -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
            cache,
            counties: None,
            policy: EmptyBucketPolicy::Drop,
        }
    }

    /// Create a service from configuration
    ///
    /// Loads the county name reference when one is configured. Datasets are
    /// loaded on demand with [`DashboardService::load_dataset`].
    pub fn from_config(config: &ApplicationConfig) -> Result<Self> {
        let cache = Arc::new(ViewCache::new(ViewCacheConfig::from(&config.cache)));
        let mut service = Self::new(cache).with_policy(config.query.empty_buckets);
        if let Some(path) = &config.data.county_names_path {
            service = service.with_county_names(CountyNames::from_path(path)?);
        }
        Ok(service)
    }

    /// Set the empty-bucket policy
    pub fn with_policy(mut self, policy: EmptyBucketPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attach a county name reference
    pub fn with_county_names(mut self, names: CountyNames) -> Self {
        self.counties = Some(names);
        self
    }

    /// The view cache
    pub fn cache(&self) -> &ViewCache {
        &self.cache
    }

    /// Empty-bucket policy applied to every view
    pub fn policy(&self) -> EmptyBucketPolicy {
        self.policy
    }

    /// Load (or reload) a dataset from an export file
    pub fn load_dataset(
        &self,
        kind: DatasetKind,
        path: impl AsRef<Path>,
        options: &IngestOptions,
    ) -> Result<IngestReport> {
        let (store, report) = RecordStore::load(path, DatasetId { kind, generation: 0 }, options)?;
        self.install(store);
        Ok(report)
    }

    /// Install already-cleaned rows as the next generation of `kind`
    pub fn insert_rows(&self, kind: DatasetKind, rows: Vec<ReportRow>) -> DatasetId {
        self.install(RecordStore::new(DatasetId { kind, generation: 0 }, rows))
    }

    /// Current snapshot of a dataset
    pub fn store(&self, kind: DatasetKind) -> Result<RecordStore> {
        self.stores
            .read()
            .get(&kind)
            .cloned()
            .ok_or(Error::DatasetNotLoaded(kind))
    }

    /// Whether a dataset is loaded
    pub fn is_loaded(&self, kind: DatasetKind) -> bool {
        self.stores.read().contains_key(&kind)
    }

    /// Timeline and county tables for a cohort
    pub fn prepare(
        &self,
        kind: DatasetKind,
        resolution: TimeResolution,
        filter: &CohortFilter,
    ) -> Result<Arc<CohortViews>> {
        let store = self.store(kind)?;
        let key = ViewKey::new(store.id(), filter.clone(), resolution).with_policy(self.policy);
        if let Some(views) = self.cache.get(&key) {
            return Ok(views);
        }

        let views = Arc::new(CohortViews::compute_with_policy(
            &store,
            filter,
            resolution,
            self.policy,
        ));

        self.cache_if_current(key, Arc::clone(&views));

        debug!(
            dataset = %views.dataset,
            filter = %filter,
            cohort_total = views.cohort_total,
            "Cohort views prepared"
        );
        Ok(views)
    }

    /// Cohort size against the whole dataset
    pub fn summary(&self, kind: DatasetKind, filter: &CohortFilter) -> Result<CohortSummary> {
        let store = self.store(kind)?;
        let views = self.prepare(kind, TimeResolution::Daily, filter)?;
        Ok(CohortSummary {
            dataset: views.dataset,
            filter: filter.clone(),
            cohort_total: views.cohort_total,
            population_total: views.population_total,
            percent: views.cohort_percent(),
            rows: store.len(),
            date_range: store.date_range(),
        })
    }

    /// Attach county names to the county table
    ///
    /// With a reference loaded this is an inner join: counties missing from
    /// the reference (including the unknown-county sentinel) are left out.
    /// Without one every county is returned unnamed.
    pub fn labeled_counties(&self, views: &CohortViews) -> Vec<LabeledCounty> {
        views
            .counties
            .iter()
            .filter_map(|row| {
                let name = match &self.counties {
                    Some(names) => Some(names.get(row.bucket)?.to_string()),
                    None => None,
                };
                Some(LabeledCounty {
                    county: row.bucket,
                    name,
                    total: row.total,
                    selected: row.selected,
                    percent: row.percent,
                })
            })
            .collect()
    }

    /// Cache `views` unless its dataset has been reloaded since
    ///
    /// Returns whether the entry was stored. The store read lock is held
    /// across the check and the put, which orders it against `install`.
    fn cache_if_current(&self, key: ViewKey, views: Arc<CohortViews>) -> bool {
        let stores = self.stores.read();
        let current = stores.get(&key.dataset.kind).map(RecordStore::id);
        if current != Some(key.dataset) {
            debug!(dataset = %key.dataset, "Dataset reloaded during computation, view not cached");
            return false;
        }
        self.cache.put(key, views);
        true
    }

    /// Swap in `store` as the next generation of its dataset
    ///
    /// Generation assignment, the swap and cache invalidation all happen
    /// under the store write lock.
    fn install(&self, store: RecordStore) -> DatasetId {
        let kind = store.kind();
        let rows = store.len();

        let mut stores = self.stores.write();
        let generation = stores
            .get(&kind)
            .map_or(1, |current| current.id().generation + 1);
        let store = store.with_generation(generation);
        let id = store.id();
        stores.insert(kind, store);
        let invalidated = self.cache.invalidate_dataset(kind);
        drop(stores);

        info!(dataset = %id, rows, invalidated, "Dataset installed");
        id
    }
}

impl Default for DashboardService {
    fn default() -> Self {
        Self::new(Arc::new(ViewCache::default()))
    }
}
