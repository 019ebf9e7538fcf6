//! COVID-19 cohort statistics for Polish post-vaccination reports
//!
//! This library loads the official infection and death exports and compares
//! a user-selected cohort (sex, age bracket, vaccine producer, last dose)
//! against the whole population:
//! - per day or per week (Monday week start)
//! - per county (powiat) and voivodeship
//! - with explicit, per-dataset cache invalidation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod store;
pub mod types;

/// Configuration management with TOML support
pub mod config;

/// CSV ingestion: cleaning, defaults and age-bracket classification
pub mod ingestion;

/// Cohort filter and the temporal / geographic aggregators
pub mod aggregation;

/// Memoization of cohort views keyed by dataset snapshot and filter
pub mod cache;

/// County display names
pub mod counties;

/// Loaded datasets, view cache and county labels behind one interface
pub mod dashboard;

// Re-export main types
pub use aggregation::{AggregateRow, CohortFilter, CohortViews, EmptyBucketPolicy};
pub use config::ApplicationConfig;
pub use dashboard::DashboardService;
pub use error::{Error, Result};
pub use store::RecordStore;
pub use types::{DatasetKind, ReportRow, TimeResolution};
