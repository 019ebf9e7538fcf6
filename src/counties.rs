//! County name reference
//!
//! Display names for TERYT county codes, read from the attribute table of the
//! administrative boundaries layer (`JPT_KOD_JE;JPT_NAZWA_`). Only used to
//! label the county table; aggregation works on codes alone.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{info, warn};

use crate::error::Result;
use crate::ingestion::reader::require_column;
use crate::types::CountyCode;

const CODE_COLUMNS: [&str; 2] = ["JPT_KOD_JE", "teryt_pow"];
const NAME_COLUMNS: [&str; 2] = ["JPT_NAZWA_", "nazwa"];

#[derive(Debug, Deserialize)]
struct CountyRecord {
    #[serde(rename = "JPT_KOD_JE", alias = "teryt_pow")]
    code: String,
    #[serde(rename = "JPT_NAZWA_", alias = "nazwa")]
    name: String,
}

/// Code → display name lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountyNames {
    names: BTreeMap<CountyCode, String>,
}

impl CountyNames {
    /// Build from (code, name) pairs
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (CountyCode, S)>,
        S: Into<String>,
    {
        Self {
            names: pairs.into_iter().map(|(c, n)| (c, n.into())).collect(),
        }
    }

    /// Read a `;`-delimited reference table
    ///
    /// A header without the code or name column is an error. Records that
    /// cannot be decoded, or whose code is not a county code, are skipped
    /// with a warning.
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);

        let headers = reader.headers()?.clone();
        require_column(&headers, &CODE_COLUMNS)?;
        require_column(&headers, &NAME_COLUMNS)?;

        let mut names = BTreeMap::new();
        let mut skipped = 0u64;
        for record in reader.deserialize::<CountyRecord>() {
            let record = match record {
                Ok(record) => record,
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed county reference record");
                    skipped += 1;
                    continue;
                },
            };
            match CountyCode::parse(&record.code) {
                Some(code) if !code.is_unknown() => {
                    names.insert(code, record.name);
                },
                _ => {
                    warn!(code = %record.code, "Skipping county reference record");
                    skipped += 1;
                },
            }
        }

        if skipped > 0 {
            info!(kept = names.len(), skipped, "County reference records skipped");
        }
        Ok(Self { names })
    }

    /// Read a reference table from disk
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let names = Self::from_reader(BufReader::new(File::open(path)?))?;
        info!(path = %path.display(), counties = names.len(), "County names loaded");
        Ok(names)
    }

    /// Display name of a county
    pub fn get(&self, code: CountyCode) -> Option<&str> {
        self.names.get(&code).map(String::as_str)
    }

    /// Number of known counties
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate (code, name) in code order
    pub fn iter(&self) -> impl Iterator<Item = (CountyCode, &str)> + '_ {
        self.names.iter().map(|(c, n)| (*c, n.as_str()))
    }
}
