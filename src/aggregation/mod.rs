//! Cohort Aggregation Engine
//!
//! Compares a user-selected cohort against the full population along time
//! and geography.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   Record Store   │──────────────────────────────┐
//! └────────┬─────────┘                              │ totals
//!          │                                        │
//! ┌────────▼─────────┐                              │
//! │  Cohort Filter   │  sex ∧ age ∧ producer ∧ dose │
//! └────────┬─────────┘                              │
//!          │ selection                              │
//!    ┌─────┴──────────────────┐                     │
//!    │                        │                     │
//! ┌──▼──────────────────┐ ┌───▼─────────────────┐   │
//! │ Temporal Aggregator │ │ Geographic Aggreg.  │◄──┘
//! │  day / week-start   │ │  county / voivod.   │
//! └──┬──────────────────┘ └───┬─────────────────┘
//!    │ (bucket, total, selected, percent)
//!    └─────────┬──────────────┘
//!       ┌──────▼───────┐
//!       │ CohortViews  │
//!       └──────────────┘
//! ```
//!
//! # Key Components
//!
//! - **filter**: [`CohortFilter`] conjunction of membership predicates, [`Selection`]
//! - **join**: shared group-sum, left join, drop rule and percent
//! - **temporal**: daily / weekly buckets
//! - **geographic**: county and voivodeship buckets
//! - **views**: both tables for one cohort

pub mod filter;
pub mod geographic;
pub mod join;
pub mod temporal;
pub mod views;

pub use filter::{CohortFilter, FilterColumn, Selection};
pub use geographic::{GeographicAggregator, VoivodeshipAggregator};
pub use join::{
    group_sum, join_counts, percent_of, table_totals, AggregateRow, BucketAggregator,
    EmptyBucketPolicy,
};
pub use temporal::TemporalAggregator;
pub use views::CohortViews;
