//! CSV reader for the `dane.gov.pl` infection and death exports
//!
//! The exports are semicolon-delimited with a header row. Both files share
//! the same layout except for the names of the date and count columns:
//!
//! | infections                          | deaths                         |
//! |-------------------------------------|--------------------------------|
//! | `data_rap_zakazenia`                | `data_rap_zgonu`               |
//! | `liczba_zaraportowanych_zakazonych` | `liczba_zaraportowanych_zgonow`|
//!
//! The shared columns are `teryt_pow`, `plec`, `wiek`, `kat_wiek`,
//! `producent` and `dawka_ost`. `kat_wiek` is ignored; the bracket is
//! recomputed from `wiek`. Columns not listed here are ignored.

use chrono::NaiveDate;
use serde::Deserialize;
use std::io::Read;
use tracing::{debug, warn};

use super::age::{AgeBracket, AgeBracketTable, AGE_SENTINELS};
use super::{IngestOptions, IngestReport, Ingested};
use crate::error::{IngestionError, Result};
use crate::types::{CountyCode, ReportRow, Sex, VaccineProducer, NO_DOSE};

/// Header names accepted for the report date
const DATE_COLUMNS: [&str; 3] = ["data_rap_zakazenia", "data_rap_zgonu", "data"];

/// Header names accepted for the reported count
const COUNT_COLUMNS: [&str; 3] = [
    "liczba_zaraportowanych_zakazonych",
    "liczba_zaraportowanych_zgonow",
    "liczba",
];

/// Rejections logged at `warn` before switching to `debug`
const MAX_LOGGED_REJECTIONS: u64 = 10;

/// One export record as written in the file
#[derive(Debug, Deserialize)]
struct RawReport {
    #[serde(alias = "data_rap_zakazenia", alias = "data_rap_zgonu")]
    data: String,
    #[serde(default)]
    teryt_pow: String,
    #[serde(default)]
    plec: String,
    #[serde(default)]
    wiek: String,
    #[serde(default)]
    producent: String,
    #[serde(default)]
    dawka_ost: String,
    #[serde(
        alias = "liczba_zaraportowanych_zakazonych",
        alias = "liczba_zaraportowanych_zgonow"
    )]
    liczba: String,
}

/// Parsed age column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawAge {
    Years(u16),
    Unavailable,
}

/// Read report rows from CSV data
pub fn read_reports<R: Read>(source: R, options: &IngestOptions) -> Result<Ingested> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(source);

    let headers = reader.headers()?.clone();
    require_column(&headers, &DATE_COLUMNS)?;
    require_column(&headers, &COUNT_COLUMNS)?;
    require_column(&headers, &["plec"])?;

    let mut report = IngestReport::default();
    let mut rows = Vec::new();
    let mut sentinel_ages = Vec::new();

    for record in reader.byte_records() {
        let record = record?;
        report.records_read += 1;
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(report.records_read + 1);

        let cleaned = decode_record(&record, &headers, line).and_then(|raw| {
            // Sexes other than K/M never reach the record store
            match Sex::from_label(&raw.plec) {
                Some(sex) => clean_record(&raw, sex, line).map(Some),
                None => Ok(None),
            }
        });

        match cleaned {
            Ok(Some((row, age))) => {
                sentinel_ages.push(age == RawAge::Unavailable);
                rows.push(row);
            },
            Ok(None) => report.dropped_sex += 1,
            Err(e) => {
                if options.strict {
                    return Err(e.into());
                }
                report.rejected += 1;
                if report.rejected <= MAX_LOGGED_REJECTIONS {
                    warn!(error = %e, "Rejecting malformed report record");
                } else {
                    debug!(error = %e, "Rejecting malformed report record");
                }
            },
        }
    }

    // Classify once over the observed age range
    let table = AgeBracketTable::for_ages(rows.iter().map(|r| r.age));
    for (row, sentinel) in rows.iter_mut().zip(sentinel_ages) {
        row.age_bracket = if sentinel {
            AgeBracket::UNAVAILABLE
        } else {
            table.lookup(row.age)
        };
    }

    report.rows_kept = rows.len() as u64;
    Ok(Ingested { rows, report })
}

/// Fail unless the header has one of the `accepted` column names
pub(crate) fn require_column(headers: &csv::StringRecord, accepted: &[&str]) -> Result<()> {
    let found = headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim())
        .any(|h| accepted.contains(&h));
    if found {
        Ok(())
    } else {
        Err(IngestionError::MissingColumn(accepted.join(" | ")).into())
    }
}

/// Check the field count and decode one raw record
fn decode_record(
    record: &csv::ByteRecord,
    headers: &csv::StringRecord,
    line: u64,
) -> std::result::Result<RawReport, IngestionError> {
    if record.len() != headers.len() {
        return Err(IngestionError::MalformedRecord {
            line,
            reason: format!("expected {} fields, found {}", headers.len(), record.len()),
        });
    }
    let record = csv::StringRecord::from_byte_record(record.clone()).map_err(|e| {
        IngestionError::MalformedRecord {
            line,
            reason: e.utf8_error().to_string(),
        }
    })?;
    record
        .deserialize(Some(headers))
        .map_err(|e| IngestionError::MalformedRecord {
            line,
            reason: e.to_string(),
        })
}

fn clean_record(
    raw: &RawReport,
    sex: Sex,
    line: u64,
) -> std::result::Result<(ReportRow, RawAge), IngestionError> {
    let date = parse_date(&raw.data).ok_or_else(|| IngestionError::InvalidDate {
        line,
        value: raw.data.clone(),
    })?;
    let count = parse_count(&raw.liczba).ok_or_else(|| IngestionError::InvalidCount {
        line,
        value: raw.liczba.clone(),
    })?;
    let county = CountyCode::parse(&raw.teryt_pow).ok_or_else(|| IngestionError::InvalidCounty {
        line,
        value: raw.teryt_pow.clone(),
    })?;
    let age = parse_age(&raw.wiek).ok_or_else(|| IngestionError::InvalidAge {
        line,
        value: raw.wiek.clone(),
    })?;

    let years = match age {
        RawAge::Years(y) => y,
        RawAge::Unavailable => 0,
    };

    let dose = raw.dawka_ost.trim();
    let row = ReportRow::new(date, county, sex, years, count)
        .with_producer(VaccineProducer::from_label(&raw.producent))
        .with_last_dose(if dose.is_empty() { NO_DOSE } else { dose });

    Ok((row, age))
}

/// Parse `YYYY-MM-DD`, tolerating a trailing time component
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day = raw.split([' ', 'T']).next().unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Parse a non-negative integer count, accepting integral floats
fn parse_count(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u64>() {
        return Some(n);
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => Some(f as u64),
        _ => None,
    }
}

/// Parse the age column; empty means 0, sentinels mean unavailable
fn parse_age(raw: &str) -> Option<RawAge> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(RawAge::Years(0));
    }
    if AGE_SENTINELS.contains(&raw) {
        return Some(RawAge::Unavailable);
    }
    if let Ok(n) = raw.parse::<u16>() {
        return Some(RawAge::Years(n));
    }
    match raw.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && (0.0..=f64::from(u16::MAX)).contains(&f) => {
            Some(RawAge::Years(f as u16))
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const HEADER: &str = "data_rap_zakazenia;teryt_pow;plec;wiek;kat_wiek;producent;dawka_ost;liczba_zaraportowanych_zakazonych\n";

    fn ingest(body: &str) -> Ingested {
        let data = format!("{}{}", HEADER, body);
        read_reports(data.as_bytes(), &IngestOptions::default()).unwrap()
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(
            parse_date("2021-11-04"),
            NaiveDate::from_ymd_opt(2021, 11, 4)
        );
        assert_eq!(
            parse_date("2021-11-04 00:00:00"),
            NaiveDate::from_ymd_opt(2021, 11, 4)
        );
        assert_eq!(parse_date("04.11.2021"), None);
        assert_eq!(parse_count("7"), Some(7));
        assert_eq!(parse_count("7.0"), Some(7));
        assert_eq!(parse_count("-1"), None);
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_age(""), Some(RawAge::Years(0)));
        assert_eq!(parse_age("95+"), Some(RawAge::Unavailable));
        assert_eq!(parse_age("42.0"), Some(RawAge::Years(42)));
        assert_eq!(parse_age("old"), None);
    }

    #[test]
    fn test_cleaning_defaults() {
        let ingested = ingest("2021-03-03;201;K;;;;;4\n");
        assert_eq!(ingested.rows.len(), 1);
        let row = &ingested.rows[0];
        assert_eq!(row.county.as_str(), "0201");
        assert_eq!(row.age, 0);
        assert_eq!(row.age_bracket.label(), "0 - 4");
        assert_eq!(row.vaccine_producer, VaccineProducer::NoVaccination);
        assert_eq!(row.last_dose, NO_DOSE);
        assert_eq!(row.week_start, NaiveDate::from_ymd_opt(2021, 3, 1).unwrap());
        assert_eq!(row.count, 4);
    }

    #[test]
    fn test_unknown_sex_is_dropped() {
        let ingested = ingest("2021-03-03;201;K;30;;;;4\n2021-03-03;201;nieznana;30;;;;9\n");
        assert_eq!(ingested.rows.len(), 1);
        assert_eq!(ingested.report.dropped_sex, 1);
        assert_eq!(ingested.report.records_read, 2);
    }

    #[test]
    fn test_age_sentinel_maps_to_unavailable() {
        let ingested = ingest("2021-03-03;201;M;DB;;;;1\n2021-03-03;201;M;95+;;;;1\n");
        assert!(ingested
            .rows
            .iter()
            .all(|r| r.age_bracket == AgeBracket::UNAVAILABLE));
    }

    #[test]
    fn test_missing_county_is_sentinel() {
        let ingested = ingest("2021-03-03;;M;50;;Moderna;pełna dawka;2\n");
        let row = &ingested.rows[0];
        assert!(row.county.is_unknown());
        assert_eq!(row.vaccine_producer, VaccineProducer::Moderna);
        assert_eq!(row.last_dose, "pełna dawka");
    }

    #[test]
    fn test_lenient_mode_rejects_and_continues() {
        let ingested = ingest("not-a-date;201;K;30;;;;4\n2021-03-03;201;K;30;;;;4\n");
        assert_eq!(ingested.rows.len(), 1);
        assert_eq!(ingested.report.rejected, 1);
    }

    #[test]
    fn test_ragged_record_is_rejected_in_lenient_mode() {
        let ingested = ingest("2021-03-03;201;K;30;;;;4\n2021-03-04;201;K\n2021-03-05;201;M;30;;;;2\n");
        assert_eq!(ingested.rows.len(), 2);
        assert_eq!(ingested.report.rejected, 1);
        assert_eq!(ingested.report.records_read, 3);
    }

    #[test]
    fn test_non_utf8_record_is_rejected_in_lenient_mode() {
        let mut data = format!("{}2021-03-03;201;K;30;;Pfizer;;4\n", HEADER).into_bytes();
        data.extend_from_slice(b"2021-03-04;201;K;30;;Pf\xffzer;;1\n");
        data.extend_from_slice(b"2021-03-05;201;M;30;;Moderna;;2\n");

        let ingested = read_reports(data.as_slice(), &IngestOptions::default()).unwrap();
        assert_eq!(ingested.rows.len(), 2);
        assert_eq!(ingested.report.rejected, 1);
        assert_eq!(ingested.rows[1].vaccine_producer, VaccineProducer::Moderna);
    }

    #[test]
    fn test_malformed_record_fails_strict_mode() {
        let data = format!("{}2021-03-04;201;K\n", HEADER);
        let err = read_reports(data.as_bytes(), &IngestOptions::default().strict()).unwrap_err();
        assert!(matches!(
            err,
            Error::Ingestion(IngestionError::MalformedRecord { line: 2, .. })
        ));
    }

    #[test]
    fn test_strict_mode_fails() {
        let data = format!("{}2021-03-03;201;K;30;;;;many\n", HEADER);
        let options = IngestOptions {
            strict: true,
            ..IngestOptions::default()
        };
        let err = read_reports(data.as_bytes(), &options).unwrap_err();
        assert!(err.to_string().contains("invalid count"));
    }

    #[test]
    fn test_missing_count_column() {
        let data = "data_rap_zgonu;teryt_pow;plec\n2021-03-03;201;K\n";
        let err = read_reports(data.as_bytes(), &IngestOptions::default()).unwrap_err();
        assert!(err.to_string().contains("missing column"));
    }

    #[test]
    fn test_deaths_header_aliases() {
        let data = "data_rap_zgonu;teryt_pow;plec;wiek;kat_wiek;producent;dawka_ost;liczba_zaraportowanych_zgonow;numer_zgonu\n\
                    2021-03-03;1465;M;88;85 i więcej;Pfizer;jedna dawka;1;17\n";
        let ingested = read_reports(data.as_bytes(), &IngestOptions::default()).unwrap();
        assert_eq!(ingested.rows.len(), 1);
        assert_eq!(ingested.rows[0].age_bracket, AgeBracket::OPEN_ENDED);
        assert_eq!(ingested.rows[0].county.voivodeship().as_str(), "14");
    }
}
