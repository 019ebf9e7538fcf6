//! Core data types shared by ingestion, aggregation and the dashboard
//!
//! # Key Types
//!
//! - **`ReportRow`**: one reported count for a date/county/sex/age/producer combination
//! - **`Sex`**: the two sexes present in the exports (`K`, `M`)
//! - **`CountyCode`**: zero-padded 4-digit TERYT county code, `"0000"` when unknown
//! - **`VoivodeshipCode`**: first two digits of a county code
//! - **`VaccineProducer`**: vaccine producer of the last dose, or "no vaccination"
//! - **`DatasetKind`**: which export a record store was loaded from
//! - **`TimeResolution`**: daily or weekly (Monday-start) time buckets
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use covid_pl_stats::types::{CountyCode, ReportRow, Sex, TimeResolution, VaccineProducer};
//!
//! let date = NaiveDate::from_ymd_opt(2021, 11, 4).unwrap();
//! let row = ReportRow::new(date, CountyCode::parse("1261").unwrap(), Sex::Female, 37, 3)
//!     .with_producer(VaccineProducer::Pfizer);
//!
//! assert_eq!(row.week_start, NaiveDate::from_ymd_opt(2021, 11, 1).unwrap());
//! assert_eq!(TimeResolution::Weekly.bucket(&row), row.week_start);
//! assert_eq!(row.age_bracket.label(), "35 - 39");
//! ```

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub use crate::ingestion::age::AgeBracket;

// ============================================================================
// Sex
// ============================================================================

/// Sex as reported in the exports
///
/// Rows with any other value are dropped during ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Sex {
    /// Female (`K`, kobieta)
    #[serde(rename = "K")]
    Female,
    /// Male (`M`, mężczyzna)
    #[serde(rename = "M")]
    Male,
}

impl Sex {
    /// Both known values, in label order
    pub const ALL: [Sex; 2] = [Sex::Female, Sex::Male];

    /// Export label
    pub fn label(&self) -> &'static str {
        match self {
            Sex::Female => "K",
            Sex::Male => "M",
        }
    }

    /// Parse an export label, `None` for anything other than `K`/`M`
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim() {
            "K" => Some(Sex::Female),
            "M" => Some(Sex::Male),
            _ => None,
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| format!("unknown sex '{}', expected K or M", s))
    }
}

// ============================================================================
// Territorial codes
// ============================================================================

/// Zero-padded 4-digit TERYT county (powiat) code
///
/// Always exactly four ASCII digits. Missing codes are represented by the
/// sentinel [`CountyCode::UNKNOWN`] (`"0000"`).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CountyCode([u8; 4]);

impl CountyCode {
    /// Sentinel for a missing or unknown county
    pub const UNKNOWN: CountyCode = CountyCode(*b"0000");

    /// Build from the numeric code, `None` above 9999
    pub fn from_number(code: u16) -> Option<Self> {
        if code > 9999 {
            return None;
        }
        let mut digits = [b'0'; 4];
        let mut rest = code;
        for slot in digits.iter_mut().rev() {
            *slot = b'0' + (rest % 10) as u8;
            rest /= 10;
        }
        Some(Self(digits))
    }

    /// Parse a raw export value
    ///
    /// Accepts integers with or without zero padding and integral floats
    /// (`"1261.0"`, as written by spreadsheet tools). An empty value yields
    /// [`CountyCode::UNKNOWN`].
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Some(Self::UNKNOWN);
        }
        if let Ok(n) = raw.parse::<u16>() {
            return Self::from_number(n);
        }
        match raw.parse::<f64>() {
            Ok(f) if f.fract() == 0.0 && (0.0..=9999.0).contains(&f) => {
                Self::from_number(f as u16)
            },
            _ => None,
        }
    }

    /// The four-digit code
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("0000")
    }

    /// Whether this is the unknown-county sentinel
    pub fn is_unknown(&self) -> bool {
        *self == Self::UNKNOWN
    }

    /// Voivodeship the county belongs to
    pub fn voivodeship(&self) -> VoivodeshipCode {
        VoivodeshipCode([self.0[0], self.0[1]])
    }
}

impl fmt::Debug for CountyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CountyCode({})", self.as_str())
    }
}

impl fmt::Display for CountyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CountyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 || !bytes.iter().all(u8::is_ascii_digit) {
            return Err(format!("county code must be 4 digits, got '{}'", s));
        }
        Ok(Self([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl Serialize for CountyCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Two-digit TERYT voivodeship (województwo) code
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoivodeshipCode([u8; 2]);

impl VoivodeshipCode {
    /// The two-digit code
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("00")
    }
}

impl fmt::Debug for VoivodeshipCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VoivodeshipCode({})", self.as_str())
    }
}

impl fmt::Display for VoivodeshipCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for VoivodeshipCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ============================================================================
// Vaccine producer
// ============================================================================

/// Producer of the last vaccine dose
///
/// Absent values default to [`VaccineProducer::NoVaccination`]. Labels not
/// known here are kept verbatim in [`VaccineProducer::Other`] so filters on
/// them still work.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VaccineProducer {
    /// `brak szczepienia`
    NoVaccination,
    /// `Astra Zeneca`
    AstraZeneca,
    /// `Johnson&Johnson`
    JohnsonAndJohnson,
    /// `Moderna`
    Moderna,
    /// `Pfizer`
    Pfizer,
    /// `brak danych` (vaccination status unknown)
    Unknown,
    /// Any other label found in the export
    Other(String),
}

impl VaccineProducer {
    /// Producers offered by the dashboard selector
    pub const KNOWN: [VaccineProducer; 6] = [
        VaccineProducer::NoVaccination,
        VaccineProducer::AstraZeneca,
        VaccineProducer::JohnsonAndJohnson,
        VaccineProducer::Moderna,
        VaccineProducer::Pfizer,
        VaccineProducer::Unknown,
    ];

    /// Export label
    pub fn label(&self) -> &str {
        match self {
            VaccineProducer::NoVaccination => "brak szczepienia",
            VaccineProducer::AstraZeneca => "Astra Zeneca",
            VaccineProducer::JohnsonAndJohnson => "Johnson&Johnson",
            VaccineProducer::Moderna => "Moderna",
            VaccineProducer::Pfizer => "Pfizer",
            VaccineProducer::Unknown => "brak danych",
            VaccineProducer::Other(label) => label,
        }
    }

    /// Map a raw export value; empty means not vaccinated
    pub fn from_label(raw: &str) -> Self {
        match raw.trim() {
            "" | "brak szczepienia" => VaccineProducer::NoVaccination,
            "Astra Zeneca" => VaccineProducer::AstraZeneca,
            "Johnson&Johnson" => VaccineProducer::JohnsonAndJohnson,
            "Moderna" => VaccineProducer::Moderna,
            "Pfizer" => VaccineProducer::Pfizer,
            "brak danych" => VaccineProducer::Unknown,
            other => VaccineProducer::Other(other.to_string()),
        }
    }
}

impl Default for VaccineProducer {
    fn default() -> Self {
        VaccineProducer::NoVaccination
    }
}

impl fmt::Display for VaccineProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for VaccineProducer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Last-dose label used when the export leaves the column empty
pub const NO_DOSE: &str = "brak";

// ============================================================================
// Datasets and resolution
// ============================================================================

/// Which export a record store holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// Reported infections (`zakażenia`)
    Infections,
    /// Reported deaths (`zgony`)
    Deaths,
}

impl DatasetKind {
    /// Both datasets
    pub const ALL: [DatasetKind; 2] = [DatasetKind::Infections, DatasetKind::Deaths];

    /// Display label used in dashboard titles
    pub fn label(&self) -> &'static str {
        match self {
            DatasetKind::Infections => "Zakażenia",
            DatasetKind::Deaths => "Zgony",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetKind::Infections => f.write_str("infections"),
            DatasetKind::Deaths => f.write_str("deaths"),
        }
    }
}

impl FromStr for DatasetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "infections" | "zakazenia" | "zakażenia" => Ok(DatasetKind::Infections),
            "deaths" | "zgony" => Ok(DatasetKind::Deaths),
            other => Err(format!(
                "unknown dataset '{}', expected infections or deaths",
                other
            )),
        }
    }
}

/// Identity of a loaded record store: its kind and load generation
///
/// Every reload bumps the generation, so cached views computed from an older
/// snapshot can never be served for a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DatasetId {
    /// Dataset kind
    pub kind: DatasetKind,
    /// Load generation, starting at 1
    pub generation: u64,
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.generation)
    }
}

/// Time bucketing resolution for the temporal aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeResolution {
    /// One bucket per report date
    #[default]
    Daily,
    /// One bucket per ISO week, keyed by its Monday
    Weekly,
}

impl TimeResolution {
    /// Bucket key of a row at this resolution
    pub fn bucket(&self, row: &ReportRow) -> NaiveDate {
        match self {
            TimeResolution::Daily => row.date,
            TimeResolution::Weekly => row.week_start,
        }
    }
}

impl fmt::Display for TimeResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeResolution::Daily => f.write_str("daily"),
            TimeResolution::Weekly => f.write_str("weekly"),
        }
    }
}

impl FromStr for TimeResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "dzienne" => Ok(TimeResolution::Daily),
            "weekly" | "tygodniowe" => Ok(TimeResolution::Weekly),
            other => Err(format!(
                "unknown resolution '{}', expected daily or weekly",
                other
            )),
        }
    }
}

/// Monday on or before `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

// ============================================================================
// Report row
// ============================================================================

/// One row of a record store
///
/// A row already aggregates `count` people sharing the same date, county,
/// sex, age and vaccination status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    /// Report date
    pub date: NaiveDate,
    /// Monday of the report date's week
    pub week_start: NaiveDate,
    /// County of residence
    pub county: CountyCode,
    /// Sex
    pub sex: Sex,
    /// Age in years, 0 when the export leaves it empty
    pub age: u16,
    /// Age bracket derived from `age` at ingestion
    pub age_bracket: AgeBracket,
    /// Producer of the last dose
    pub vaccine_producer: VaccineProducer,
    /// Last dose label (`brak` when not vaccinated)
    pub last_dose: String,
    /// Number of people reported
    pub count: u64,
}

impl ReportRow {
    /// Create a row for an unvaccinated cohort, deriving week start and age bracket
    pub fn new(date: NaiveDate, county: CountyCode, sex: Sex, age: u16, count: u64) -> Self {
        Self {
            date,
            week_start: week_start(date),
            county,
            sex,
            age,
            age_bracket: AgeBracket::classify(age),
            vaccine_producer: VaccineProducer::NoVaccination,
            last_dose: NO_DOSE.to_string(),
            count,
        }
    }

    /// Set the vaccine producer
    pub fn with_producer(mut self, producer: VaccineProducer) -> Self {
        self.vaccine_producer = producer;
        self
    }

    /// Set the last dose label
    pub fn with_last_dose(mut self, dose: impl Into<String>) -> Self {
        self.last_dose = dose.into();
        self
    }

    /// Override the age bracket (used for the "data unavailable" sentinel)
    pub fn with_age_bracket(mut self, bracket: AgeBracket) -> Self {
        self.age_bracket = bracket;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_county_code_padding() {
        assert_eq!(CountyCode::parse("201").unwrap().as_str(), "0201");
        assert_eq!(CountyCode::parse("1261").unwrap().as_str(), "1261");
        assert_eq!(CountyCode::parse("1261.0").unwrap().as_str(), "1261");
        assert_eq!(CountyCode::parse(" 0602 ").unwrap().as_str(), "0602");
    }

    #[test]
    fn test_county_code_missing_is_sentinel() {
        let code = CountyCode::parse("").unwrap();
        assert!(code.is_unknown());
        assert_eq!(code.to_string(), "0000");
    }

    #[test]
    fn test_county_code_rejects_garbage() {
        assert!(CountyCode::parse("abc").is_none());
        assert!(CountyCode::parse("12345").is_none());
        assert!(CountyCode::parse("12.5").is_none());
        assert!("123".parse::<CountyCode>().is_err());
    }

    #[test]
    fn test_voivodeship_prefix() {
        let code: CountyCode = "1465".parse().unwrap();
        assert_eq!(code.voivodeship().as_str(), "14");
    }

    #[test]
    fn test_sex_labels() {
        assert_eq!(Sex::from_label("K"), Some(Sex::Female));
        assert_eq!(Sex::from_label("M"), Some(Sex::Male));
        assert_eq!(Sex::from_label("nieznana"), None);
        assert!("X".parse::<Sex>().is_err());
    }

    #[test]
    fn test_producer_defaults_and_other() {
        assert_eq!(VaccineProducer::from_label(""), VaccineProducer::NoVaccination);
        assert_eq!(VaccineProducer::from_label("Pfizer"), VaccineProducer::Pfizer);
        assert_eq!(
            VaccineProducer::from_label("Novavax"),
            VaccineProducer::Other("Novavax".to_string())
        );
        assert_eq!(VaccineProducer::from_label("Novavax").label(), "Novavax");
    }

    #[test]
    fn test_week_start_is_monday_on_or_before() {
        // 2021-03-01 is a Monday
        assert_eq!(week_start(date(2021, 3, 1)), date(2021, 3, 1));
        assert_eq!(week_start(date(2021, 3, 3)), date(2021, 3, 1));
        assert_eq!(week_start(date(2021, 3, 7)), date(2021, 3, 1));
        assert_eq!(week_start(date(2021, 3, 8)), date(2021, 3, 8));
        // Across a year boundary
        assert_eq!(week_start(date(2022, 1, 1)), date(2021, 12, 27));
    }

    #[test]
    fn test_resolution_and_dataset_parsing() {
        assert_eq!("weekly".parse::<TimeResolution>(), Ok(TimeResolution::Weekly));
        assert_eq!("dzienne".parse::<TimeResolution>(), Ok(TimeResolution::Daily));
        assert_eq!("zgony".parse::<DatasetKind>(), Ok(DatasetKind::Deaths));
        assert!("monthly".parse::<TimeResolution>().is_err());
    }
}
