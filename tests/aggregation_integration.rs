//! Integration tests for the cohort aggregation engine
//!
//! These tests run the complete pipeline on small hand-built stores:
//! - cohort filtering (typed and column-name based)
//! - daily and weekly timelines
//! - county and voivodeship tables
//! - conservation and identity properties across both views

use chrono::NaiveDate;

use covid_pl_stats::aggregation::{
    BucketAggregator, CohortFilter, CohortViews, EmptyBucketPolicy, GeographicAggregator,
    TemporalAggregator, VoivodeshipAggregator,
};
use covid_pl_stats::store::RecordStore;
use covid_pl_stats::types::{
    AgeBracket, DatasetKind, ReportRow, Sex, TimeResolution, VaccineProducer,
};
use covid_pl_stats::Error;

// ============================================================================
// Helper Functions
// ============================================================================

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, m, d).unwrap()
}

/// Three rows used by the worked examples
///
/// 2021-03-01 (Monday) and 2021-03-02 fall in the same week.
fn example_store() -> RecordStore {
    RecordStore::from_rows(
        DatasetKind::Infections,
        vec![
            ReportRow::new(date(3, 1), "0101".parse().unwrap(), Sex::Female, 30, 10),
            ReportRow::new(date(3, 1), "0101".parse().unwrap(), Sex::Male, 30, 5),
            ReportRow::new(date(3, 2), "0102".parse().unwrap(), Sex::Female, 30, 7),
        ],
    )
}

/// A store with every filter column varying
fn mixed_store() -> RecordStore {
    let counties = ["0201", "0264", "1465", "1412", "3064", "0000"];
    let producers = [
        VaccineProducer::NoVaccination,
        VaccineProducer::Pfizer,
        VaccineProducer::Moderna,
        VaccineProducer::AstraZeneca,
        VaccineProducer::JohnsonAndJohnson,
    ];
    let doses = ["brak", "jedna dawka", "pełna dawka", "przypominająca"];

    let mut rows = Vec::new();
    for i in 0..240u64 {
        let day = date(9, 1) + chrono::Duration::days((i % 45) as i64);
        let sex = if i % 3 == 0 { Sex::Male } else { Sex::Female };
        let age = ((i * 7) % 101) as u16;
        rows.push(
            ReportRow::new(
                day,
                counties[(i % 6) as usize].parse().unwrap(),
                sex,
                age,
                1 + i % 9,
            )
            .with_producer(producers[(i % 5) as usize].clone())
            .with_last_dose(doses[(i % 4) as usize]),
        );
    }
    RecordStore::from_rows(DatasetKind::Deaths, rows)
}

// ============================================================================
// Worked examples
// ============================================================================

#[test]
fn test_daily_female_cohort() {
    let store = example_store();
    let filter = CohortFilter::new().with_sex([Sex::Female]);
    let rows = TemporalAggregator::new(TimeResolution::Daily).aggregate(&store, &filter);

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].bucket, date(3, 1));
    assert_eq!((rows[0].total, rows[0].selected), (15, 10));
    assert!((rows[0].percent - 66.666_666).abs() < 1e-3);
    assert_eq!(rows[1].bucket, date(3, 2));
    assert_eq!((rows[1].total, rows[1].selected), (7, 7));
    assert_eq!(rows[1].percent, 100.0);
}

#[test]
fn test_value_absent_from_data_yields_empty_tables() {
    let store = example_store();
    let filter = CohortFilter::from_pairs([("sex", ["X"])]).unwrap();

    let views = CohortViews::compute(&store, &filter, TimeResolution::Daily);
    assert!(views.timeline.is_empty());
    assert!(views.counties.is_empty());
    assert!(views.is_empty());
    assert_eq!(views.population_total, 22);
}

#[test]
fn test_weekly_collapses_same_week() {
    let store = example_store();
    let filter = CohortFilter::new().with_sex([Sex::Female]);
    let rows = TemporalAggregator::new(TimeResolution::Weekly).aggregate(&store, &filter);

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].bucket, date(3, 1));
    assert_eq!((rows[0].total, rows[0].selected), (22, 17));
}

// ============================================================================
// Filter semantics
// ============================================================================

#[test]
fn test_unknown_filter_column_is_error() {
    let err = CohortFilter::from_pairs([("wojewodztwo", ["14"])]).unwrap_err();
    assert!(matches!(err, Error::UnknownFilterColumn(ref c) if c == "wojewodztwo"));
}

#[test]
fn test_export_column_names_match_typed_filter() {
    let store = mixed_store();
    let by_name = CohortFilter::from_pairs([
        ("plec", vec!["K"]),
        ("producent", vec!["Pfizer", "Moderna"]),
    ])
    .unwrap();
    let typed = CohortFilter::new()
        .with_sex([Sex::Female])
        .with_producers([VaccineProducer::Pfizer, VaccineProducer::Moderna]);

    assert_eq!(by_name, typed);
    assert_eq!(
        by_name.apply(&store).total_count(),
        typed.apply(&store).total_count()
    );
}

#[test]
fn test_filter_order_is_irrelevant() {
    let store = mixed_store();
    let a = CohortFilter::from_pairs([
        ("sex", vec!["M"]),
        ("last_dose", vec!["pełna dawka"]),
    ])
    .unwrap();
    let b = CohortFilter::from_pairs([
        ("last_dose", vec!["pełna dawka"]),
        ("sex", vec!["M"]),
    ])
    .unwrap();

    let va = CohortViews::compute(&store, &a, TimeResolution::Weekly);
    let vb = CohortViews::compute(&store, &b, TimeResolution::Weekly);
    assert_eq!(va, vb);
}

#[test]
fn test_refine_is_idempotent() {
    let store = mixed_store();
    let filter = CohortFilter::new()
        .with_sex([Sex::Female])
        .with_age_brackets(AgeBracket::selectable().into_iter().take(10));

    let once = filter.apply(&store);
    let twice = once.refine(&filter);
    assert_eq!(once.len(), twice.len());
    assert_eq!(once.total_count(), twice.total_count());
}

// ============================================================================
// Properties across both views
// ============================================================================

#[test]
fn test_conservation_across_views() {
    let store = mixed_store();
    let filter = CohortFilter::new()
        .with_producers([VaccineProducer::NoVaccination, VaccineProducer::Pfizer])
        .with_sex([Sex::Female]);

    for resolution in [TimeResolution::Daily, TimeResolution::Weekly] {
        let views = CohortViews::compute(&store, &filter, resolution);
        let cohort = filter.apply(&store).total_count();
        assert!(cohort > 0);
        assert_eq!(views.timeline_selected(), cohort);
        assert_eq!(views.counties_selected(), cohort);
        assert_eq!(views.cohort_total, cohort);
    }
}

#[test]
fn test_empty_filter_is_identity() {
    let store = mixed_store();
    let views = CohortViews::compute(&store, &CohortFilter::new(), TimeResolution::Daily);

    assert!(views.timeline.iter().all(|r| r.selected == r.total));
    assert!(views.timeline.iter().all(|r| r.percent == 100.0));
    assert!(views.counties.iter().all(|r| r.percent == 100.0));
    assert_eq!(views.cohort_percent(), 100.0);
}

#[test]
fn test_percent_bounds_and_subset() {
    let store = mixed_store();
    let filter = CohortFilter::new().with_last_doses(["jedna dawka", "brak"]);
    let views = CohortViews::compute(&store, &filter, TimeResolution::Daily);

    for row in views.timeline.iter() {
        assert!(row.selected <= row.total);
        assert!(row.percent > 0.0 && row.percent <= 100.0);
    }
    for row in views.counties.iter() {
        assert!(row.selected <= row.total);
        assert!(row.percent > 0.0 && row.percent <= 100.0);
    }
}

#[test]
fn test_keep_policy_retains_zero_buckets() {
    let store = mixed_store();
    let filter = CohortFilter::new().with_producers([VaccineProducer::JohnsonAndJohnson]);

    let dropped = CohortViews::compute(&store, &filter, TimeResolution::Daily);
    let kept = CohortViews::compute_with_policy(
        &store,
        &filter,
        TimeResolution::Daily,
        EmptyBucketPolicy::Keep,
    );

    let all_days = TemporalAggregator::new(TimeResolution::Daily)
        .aggregate(&store, &CohortFilter::new())
        .len();
    assert_eq!(kept.timeline.len(), all_days);
    assert!(dropped.timeline.len() < kept.timeline.len());
    assert!(kept
        .timeline
        .iter()
        .filter(|r| r.selected == 0)
        .all(|r| r.percent == 0.0));
    assert_eq!(dropped.timeline_selected(), kept.timeline_selected());
}

#[test]
fn test_voivodeship_totals_equal_county_sums() {
    let store = mixed_store();
    let filter = CohortFilter::new().with_sex([Sex::Male]);
    let counties = GeographicAggregator::new()
        .with_policy(EmptyBucketPolicy::Keep)
        .aggregate(&store, &filter);
    let voivodeships = VoivodeshipAggregator::new()
        .with_policy(EmptyBucketPolicy::Keep)
        .aggregate(&store, &filter);

    let codes: Vec<&str> = voivodeships.iter().map(|v| v.bucket.as_str()).collect();
    assert_eq!(codes, vec!["00", "02", "14", "30"]);

    for v in &voivodeships {
        let total: u64 = counties
            .iter()
            .filter(|c| c.bucket.voivodeship() == v.bucket)
            .map(|c| c.total)
            .sum();
        assert_eq!(v.total, total);
    }
}
