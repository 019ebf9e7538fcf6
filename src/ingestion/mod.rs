//! Report ingestion and cleaning
//!
//! Turns the official CSV exports into [`ReportRow`]s ready for a
//! [`RecordStore`](crate::store::RecordStore):
//!
//! ```text
//! [CSV export] → [reader: parse + clean] → [age: classify] → [Vec<ReportRow>]
//!                       ↓
//!               [IngestReport: kept / dropped / rejected]
//! ```
//!
//! Cleaning follows the export conventions:
//!
//! - sexes other than `K`/`M` are dropped
//! - missing vaccine producer becomes `brak szczepienia`, missing last dose `brak`
//! - county codes are zero-padded to four digits, missing ones become `0000`
//! - missing ages become 0; the `DB` and `95+` codes map to the `DB` bracket
//! - the Monday of each report date is precomputed for weekly bucketing
//!
//! # Example
//!
//! ```rust
//! use covid_pl_stats::ingestion::{read_reports, IngestOptions};
//!
//! let csv = "data_rap_zakazenia;teryt_pow;plec;wiek;kat_wiek;producent;dawka_ost;liczba_zaraportowanych_zakazonych\n\
//!            2021-11-04;1261;K;37;;Pfizer;pełna dawka;3\n";
//! let ingested = read_reports(csv.as_bytes(), &IngestOptions::default()).unwrap();
//! assert_eq!(ingested.rows.len(), 1);
//! assert_eq!(ingested.report.rows_kept, 1);
//! ```

pub mod age;
pub mod reader;

pub use age::{AgeBracket, AgeBracketTable, AGE_SENTINELS};
pub use reader::read_reports;

use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::error::Result;
use crate::types::ReportRow;

/// Ingestion options
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Field delimiter (`;` in the official exports)
    pub delimiter: u8,

    /// Fail the whole load on the first malformed record instead of skipping it
    pub strict: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            delimiter: b';',
            strict: false,
        }
    }
}

impl IngestOptions {
    /// Fail on malformed records
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

/// Counters describing one load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Data records in the file
    pub records_read: u64,
    /// Rows handed to the record store
    pub rows_kept: u64,
    /// Records dropped because sex was not `K`/`M`
    pub dropped_sex: u64,
    /// Malformed records skipped in lenient mode
    pub rejected: u64,
}

/// Output of a load
#[derive(Debug, Clone)]
pub struct Ingested {
    /// Cleaned rows in file order
    pub rows: Vec<ReportRow>,
    /// Load counters
    pub report: IngestReport,
}

/// Read and clean an export file
pub fn load_reports(path: impl AsRef<Path>, options: &IngestOptions) -> Result<Ingested> {
    let path = path.as_ref();
    let start = Instant::now();
    info!(path = %path.display(), strict = options.strict, "Loading report export");

    let file = File::open(path)?;
    let ingested = read_reports(BufReader::new(file), options)?;

    let first = ingested.rows.iter().map(|r| r.date).min();
    let last = ingested.rows.iter().map(|r| r.date).max();
    info!(
        path = %path.display(),
        rows = ingested.report.rows_kept,
        dropped_sex = ingested.report.dropped_sex,
        rejected = ingested.report.rejected,
        first_date = ?first,
        last_date = ?last,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Report export loaded"
    );

    Ok(ingested)
}
