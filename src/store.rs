//! Immutable in-memory record store
//!
//! A [`RecordStore`] is loaded once per dataset and never mutated. Clones
//! share the same row buffer, so a store can be handed to any number of
//! concurrent readers without locking. Every derived table (selections,
//! aggregates) is a new value.

use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::ingestion::{load_reports, IngestOptions, IngestReport};
use crate::types::{DatasetId, DatasetKind, ReportRow};

/// Read-only table of report rows for one dataset snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct RecordStore {
    id: DatasetId,
    rows: Arc<[ReportRow]>,
}

impl RecordStore {
    /// Wrap already-cleaned rows
    pub fn new(id: DatasetId, rows: Vec<ReportRow>) -> Self {
        Self {
            id,
            rows: rows.into(),
        }
    }

    /// Wrap rows as the first generation of `kind`
    pub fn from_rows(kind: DatasetKind, rows: Vec<ReportRow>) -> Self {
        Self::new(
            DatasetId {
                kind,
                generation: 1,
            },
            rows,
        )
    }

    /// Load and clean an export file
    pub fn load(
        path: impl AsRef<Path>,
        id: DatasetId,
        options: &IngestOptions,
    ) -> Result<(Self, IngestReport)> {
        let ingested = load_reports(path, options)?;
        Ok((Self::new(id, ingested.rows), ingested.report))
    }

    /// Same rows under another generation of the same dataset
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.id.generation = generation;
        self
    }

    /// Snapshot identity
    pub fn id(&self) -> DatasetId {
        self.id
    }

    /// Dataset kind
    pub fn kind(&self) -> DatasetKind {
        self.id.kind
    }

    /// All rows
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Iterate over all rows
    pub fn iter(&self) -> std::slice::Iter<'_, ReportRow> {
        self.rows.iter()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the store has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of `count` over all rows
    pub fn total_count(&self) -> u64 {
        self.rows.iter().map(|r| r.count).sum()
    }

    /// First and last report date
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.rows.iter().map(|r| r.date).min()?;
        let last = self.rows.iter().map(|r| r.date).max()?;
        Some((first, last))
    }
}

impl<'a> IntoIterator for &'a RecordStore {
    type Item = &'a ReportRow;
    type IntoIter = std::slice::Iter<'a, ReportRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
