//! Group-sum, totals/selected join and percent computation
//!
//! Both aggregators share one algorithm and differ only in the bucket key:
//!
//! 1. `total[bucket]` = Σ count over every row of the store
//! 2. `selected[bucket]` = Σ count over the cohort selection
//! 3. left-outer join of totals with selected, missing selected = 0
//! 4. drop buckets with `selected == 0` (per [`EmptyBucketPolicy`])
//! 5. `percent = 100 * selected / total`
//!
//! Grouping goes through a `BTreeMap`, so the output is sorted ascending by
//! bucket key regardless of store order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::filter::{CohortFilter, Selection};
use crate::store::RecordStore;
use crate::types::ReportRow;

/// One bucket of an aggregate table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow<K> {
    /// Time bucket or region code
    pub bucket: K,
    /// Count over all rows in the bucket
    pub total: u64,
    /// Count over the cohort's rows in the bucket
    pub selected: u64,
    /// `100 * selected / total`
    pub percent: f64,
}

/// What to do with buckets where the cohort has no members
///
/// Dropping them (the default) keeps the tables limited to buckets the
/// cohort actually appears in, at the cost of not distinguishing "zero
/// people in this cohort" from "no data for this bucket". `Keep` retains
/// them with `selected == 0` and `percent == 0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyBucketPolicy {
    /// Omit buckets with `selected == 0`
    #[default]
    Drop,
    /// Keep every bucket with a row in the store
    Keep,
}

/// Percentage of `selected` in `total`, 0.0 when `total` is 0
#[inline]
pub fn percent_of(selected: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * selected as f64 / total as f64
    }
}

/// Sum `count` per bucket, saturating at `u64::MAX`
pub fn group_sum<'a, K, I, F>(rows: I, key: F) -> BTreeMap<K, u64>
where
    K: Ord,
    I: IntoIterator<Item = &'a ReportRow>,
    F: Fn(&ReportRow) -> K,
{
    let mut groups = BTreeMap::new();
    for row in rows {
        let sum = groups.entry(key(row)).or_insert(0u64);
        *sum = sum.saturating_add(row.count);
    }
    groups
}

/// Left-join totals with selected counts and derive percentages
///
/// Buckets are emitted in the ascending order of `totals`. The drop rule
/// runs before the division, so retained rows under the default policy
/// always have `total > 0`.
///
/// `selected` is expected to come from a subset of the rows behind `totals`.
/// When it does not, buckets missing from `totals` are ignored and
/// `selected` is capped at `total`.
pub fn join_counts<K: Ord>(
    totals: BTreeMap<K, u64>,
    mut selected: BTreeMap<K, u64>,
    policy: EmptyBucketPolicy,
) -> Vec<AggregateRow<K>> {
    totals
        .into_iter()
        .filter_map(|(bucket, total)| {
            let picked = selected.remove(&bucket).unwrap_or(0).min(total);
            if picked == 0 && policy == EmptyBucketPolicy::Drop {
                return None;
            }
            Some(AggregateRow {
                bucket,
                total,
                selected: picked,
                percent: percent_of(picked, total),
            })
        })
        .collect()
}

/// Sum of `selected` and `total` over a table, saturating at `u64::MAX`
pub fn table_totals<K>(rows: &[AggregateRow<K>]) -> (u64, u64) {
    rows.iter()
        .fold((0u64, 0u64), |(s, t), r| {
            (s.saturating_add(r.selected), t.saturating_add(r.total))
        })
}

/// Aggregator over one bucket key
///
/// Implementors supply the key and the empty-bucket policy; grouping,
/// joining and percentages are shared.
pub trait BucketAggregator {
    /// Bucket key type
    type Key: Ord + Clone;

    /// Bucket of a row
    fn bucket_of(&self, row: &ReportRow) -> Self::Key;

    /// Policy for buckets without cohort members
    fn policy(&self) -> EmptyBucketPolicy {
        EmptyBucketPolicy::Drop
    }

    /// Aggregate an already computed selection against the store it came from
    fn aggregate_selection(&self, selection: &Selection<'_>) -> Vec<AggregateRow<Self::Key>> {
        let totals = group_sum(selection.store().iter(), |row| self.bucket_of(row));
        let selected = group_sum(selection.iter(), |row| self.bucket_of(row));
        join_counts(totals, selected, self.policy())
    }

    /// Filter the store and aggregate
    fn aggregate(
        &self,
        store: &RecordStore,
        filter: &CohortFilter,
    ) -> Vec<AggregateRow<Self::Key>> {
        let selection = filter.apply(store);
        self.aggregate_selection(&selection)
    }
}
