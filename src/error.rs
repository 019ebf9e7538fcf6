//! Error types for the statistics engine

use thiserror::Error;

use crate::types::DatasetKind;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// A cohort filter referenced a column the record store does not have
    #[error("Unknown filter column: {0}")]
    UnknownFilterColumn(String),

    /// Ingestion error
    #[error("Ingestion error: {0}")]
    Ingestion(#[from] IngestionError),

    /// Dataset was requested before it was loaded
    #[error("Dataset not loaded: {0}")]
    DatasetNotLoaded(DatasetKind),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Ingestion errors
///
/// Raised while turning raw export records into report rows. `line` is the
/// 1-based record position reported by the CSV reader.
#[derive(Error, Debug)]
pub enum IngestionError {
    /// Report date could not be parsed
    #[error("line {line}: invalid report date '{value}'")]
    InvalidDate {
        /// Record line
        line: u64,
        /// Raw value
        value: String,
    },

    /// Reported count is missing or not a non-negative integer
    #[error("line {line}: invalid count '{value}'")]
    InvalidCount {
        /// Record line
        line: u64,
        /// Raw value
        value: String,
    },

    /// County code is not numeric or does not fit four digits
    #[error("line {line}: invalid county code '{value}'")]
    InvalidCounty {
        /// Record line
        line: u64,
        /// Raw value
        value: String,
    },

    /// Age is neither a number nor a known sentinel
    #[error("line {line}: invalid age '{value}'")]
    InvalidAge {
        /// Record line
        line: u64,
        /// Raw value
        value: String,
    },

    /// Record has the wrong number of fields or is not valid UTF-8
    #[error("line {line}: malformed record ({reason})")]
    MalformedRecord {
        /// Record line
        line: u64,
        /// What is wrong with the record
        reason: String,
    },

    /// Required column is absent from the header
    #[error("missing column: {0}")]
    MissingColumn(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Configuration(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
