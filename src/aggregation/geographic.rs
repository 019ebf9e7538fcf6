//! Geographic Aggregator - cohort vs. population per county or voivodeship
//!
//! Same algorithm as the temporal aggregator keyed by territorial code.
//! Rows are returned in ascending code order so output is reproducible;
//! consumers join them against a geographic reference by code.

use super::join::{BucketAggregator, EmptyBucketPolicy};
use crate::types::{CountyCode, ReportRow, VoivodeshipCode};

/// Aggregates counts per county (powiat)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeographicAggregator {
    policy: EmptyBucketPolicy,
}

impl GeographicAggregator {
    /// Create an aggregator dropping empty buckets
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the empty-bucket policy
    pub fn with_policy(mut self, policy: EmptyBucketPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl BucketAggregator for GeographicAggregator {
    type Key = CountyCode;

    #[inline]
    fn bucket_of(&self, row: &ReportRow) -> CountyCode {
        row.county
    }

    fn policy(&self) -> EmptyBucketPolicy {
        self.policy
    }
}

/// Aggregates counts per voivodeship (first two digits of the county code)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoivodeshipAggregator {
    policy: EmptyBucketPolicy,
}

impl VoivodeshipAggregator {
    /// Create an aggregator dropping empty buckets
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the empty-bucket policy
    pub fn with_policy(mut self, policy: EmptyBucketPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl BucketAggregator for VoivodeshipAggregator {
    type Key = VoivodeshipCode;

    #[inline]
    fn bucket_of(&self, row: &ReportRow) -> VoivodeshipCode {
        row.county.voivodeship()
    }

    fn policy(&self) -> EmptyBucketPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::CohortFilter;
    use crate::store::RecordStore;
    use crate::types::{AgeBracket, DatasetKind, Sex};
    use chrono::NaiveDate;

    fn create_test_store() -> RecordStore {
        let day = NaiveDate::from_ymd_opt(2021, 10, 12).unwrap();
        let rows = [
            ("1465", Sex::Female, 12, 6),
            ("1465", Sex::Male, 45, 4),
            ("1401", Sex::Female, 70, 3),
            ("0201", Sex::Male, 70, 8),
            ("0000", Sex::Female, 30, 1),
        ]
        .into_iter()
        .map(|(code, sex, age, count)| {
            ReportRow::new(day, code.parse().unwrap(), sex, age, count)
        })
        .collect();
        RecordStore::from_rows(DatasetKind::Infections, rows)
    }

    #[test]
    fn test_counties_sorted_by_code() {
        let store = create_test_store();
        let rows = GeographicAggregator::new().aggregate(&store, &CohortFilter::new());
        let codes: Vec<&str> = rows.iter().map(|r| r.bucket.as_str()).collect();
        assert_eq!(codes, vec!["0000", "0201", "1401", "1465"]);
    }

    #[test]
    fn test_county_percent() {
        let store = create_test_store();
        let filter = CohortFilter::new().with_sex([Sex::Female]);
        let rows = GeographicAggregator::new().aggregate(&store, &filter);
        let warsaw = rows.iter().find(|r| r.bucket.as_str() == "1465").unwrap();
        assert_eq!((warsaw.total, warsaw.selected), (10, 6));
        assert!((warsaw.percent - 60.0).abs() < 1e-9);
        // 0201 has no women and is dropped
        assert!(rows.iter().all(|r| r.bucket.as_str() != "0201"));
    }

    #[test]
    fn test_voivodeship_rollup_matches_counties() {
        let store = create_test_store();
        let filter = CohortFilter::new().with_age_brackets([AgeBracket::classify(70)]);
        let counties = GeographicAggregator::new()
            .with_policy(EmptyBucketPolicy::Keep)
            .aggregate(&store, &filter);
        let voivodeships = VoivodeshipAggregator::new()
            .with_policy(EmptyBucketPolicy::Keep)
            .aggregate(&store, &filter);

        for v in &voivodeships {
            let (selected, total) = counties
                .iter()
                .filter(|c| c.bucket.voivodeship() == v.bucket)
                .fold((0, 0), |(s, t), c| (s + c.selected, t + c.total));
            assert_eq!((v.selected, v.total), (selected, total));
        }
        let mazowieckie = voivodeships
            .iter()
            .find(|v| v.bucket.as_str() == "14")
            .unwrap();
        assert_eq!((mazowieckie.total, mazowieckie.selected), (13, 3));
    }
}
