//! Temporal Aggregator - cohort vs. population per day or week
//!
//! Buckets rows by report date (daily) or by the Monday on or before the
//! report date (weekly), then joins cohort counts onto population counts.
//! The resulting table is sorted by bucket date.
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use covid_pl_stats::aggregation::{BucketAggregator, CohortFilter, TemporalAggregator};
//! use covid_pl_stats::store::RecordStore;
//! use covid_pl_stats::types::{DatasetKind, ReportRow, Sex, TimeResolution};
//!
//! let day1 = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
//! let day2 = NaiveDate::from_ymd_opt(2021, 3, 2).unwrap();
//! let store = RecordStore::from_rows(DatasetKind::Infections, vec![
//!     ReportRow::new(day1, "0101".parse().unwrap(), Sex::Female, 30, 10),
//!     ReportRow::new(day1, "0101".parse().unwrap(), Sex::Male, 30, 5),
//!     ReportRow::new(day2, "0102".parse().unwrap(), Sex::Female, 30, 7),
//! ]);
//!
//! let filter = CohortFilter::new().with_sex([Sex::Female]);
//! let daily = TemporalAggregator::new(TimeResolution::Daily).aggregate(&store, &filter);
//! assert_eq!((daily[0].total, daily[0].selected), (15, 10));
//!
//! let weekly = TemporalAggregator::new(TimeResolution::Weekly).aggregate(&store, &filter);
//! assert_eq!(weekly.len(), 1);
//! assert_eq!((weekly[0].total, weekly[0].selected), (22, 17));
//! ```

use chrono::NaiveDate;

use super::join::{BucketAggregator, EmptyBucketPolicy};
use crate::types::{ReportRow, TimeResolution};

/// Aggregates counts per time bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TemporalAggregator {
    resolution: TimeResolution,
    policy: EmptyBucketPolicy,
}

impl TemporalAggregator {
    /// Create an aggregator at `resolution`, dropping empty buckets
    pub fn new(resolution: TimeResolution) -> Self {
        Self {
            resolution,
            policy: EmptyBucketPolicy::Drop,
        }
    }

    /// Set the empty-bucket policy
    pub fn with_policy(mut self, policy: EmptyBucketPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Time resolution
    pub fn resolution(&self) -> TimeResolution {
        self.resolution
    }
}

impl BucketAggregator for TemporalAggregator {
    type Key = NaiveDate;

    #[inline]
    fn bucket_of(&self, row: &ReportRow) -> NaiveDate {
        self.resolution.bucket(row)
    }

    fn policy(&self) -> EmptyBucketPolicy {
        self.policy
    }
}
