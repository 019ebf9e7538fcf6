//! Cohort views - the two tables handed to rendering
//!
//! Runs the cohort filter once and feeds the same selection to both
//! aggregators, so the timeline and the county map always describe the same
//! cohort.

use chrono::NaiveDate;
use serde::Serialize;
use std::time::Instant;
use tracing::debug;

use super::filter::CohortFilter;
use super::geographic::GeographicAggregator;
use super::join::{table_totals, AggregateRow, BucketAggregator, EmptyBucketPolicy};
use super::temporal::TemporalAggregator;
use crate::store::RecordStore;
use crate::types::{CountyCode, DatasetId, TimeResolution};

/// Timeline and county tables for one cohort
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortViews {
    /// Snapshot the views were computed from
    pub dataset: DatasetId,
    /// Time resolution of `timeline`
    pub resolution: TimeResolution,
    /// Filter defining the cohort
    pub filter: CohortFilter,
    /// Per time bucket, ascending
    pub timeline: Vec<AggregateRow<NaiveDate>>,
    /// Per county, ascending by code
    pub counties: Vec<AggregateRow<CountyCode>>,
    /// Σ count over the cohort
    pub cohort_total: u64,
    /// Σ count over the whole store
    pub population_total: u64,
}

impl CohortViews {
    /// Compute both tables, dropping empty buckets
    pub fn compute(store: &RecordStore, filter: &CohortFilter, resolution: TimeResolution) -> Self {
        Self::compute_with_policy(store, filter, resolution, EmptyBucketPolicy::Drop)
    }

    /// Compute both tables with an explicit empty-bucket policy
    pub fn compute_with_policy(
        store: &RecordStore,
        filter: &CohortFilter,
        resolution: TimeResolution,
        policy: EmptyBucketPolicy,
    ) -> Self {
        let start = Instant::now();
        let selection = filter.apply(store);

        let timeline = TemporalAggregator::new(resolution)
            .with_policy(policy)
            .aggregate_selection(&selection);
        let counties = GeographicAggregator::new()
            .with_policy(policy)
            .aggregate_selection(&selection);

        let views = Self {
            dataset: store.id(),
            resolution,
            filter: filter.clone(),
            timeline,
            counties,
            cohort_total: selection.total_count(),
            population_total: store.total_count(),
        };

        debug!(
            dataset = %views.dataset,
            resolution = %resolution,
            filter = %filter,
            time_buckets = views.timeline.len(),
            county_buckets = views.counties.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Cohort views computed"
        );

        views
    }

    /// Cohort share of the whole store, in percent
    pub fn cohort_percent(&self) -> f64 {
        super::join::percent_of(self.cohort_total, self.population_total)
    }

    /// Σ selected over the timeline
    pub fn timeline_selected(&self) -> u64 {
        table_totals(&self.timeline).0
    }

    /// Σ selected over the county table
    pub fn counties_selected(&self) -> u64 {
        table_totals(&self.counties).0
    }

    /// Whether the cohort is empty
    pub fn is_empty(&self) -> bool {
        self.cohort_total == 0
    }
}
