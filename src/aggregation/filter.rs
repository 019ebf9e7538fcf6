//! Cohort Filter - membership predicates over report columns
//!
//! A [`CohortFilter`] is a conjunction of per-column membership tests. Each
//! column is either unconstrained (`None`) or restricted to a set of
//! accepted values. A row is selected when every constrained column's value
//! is in its set; the order in which columns are tested does not matter.
//!
//! An unconstrained filter is the identity. A constrained column whose set
//! is empty (or holds only values absent from the data) selects nothing,
//! which is a valid outcome rather than an error. Unknown column names are
//! rejected when building a filter from name/value pairs.
//!
//! # Example
//!
//! ```rust
//! use covid_pl_stats::aggregation::CohortFilter;
//! use covid_pl_stats::types::Sex;
//!
//! let by_name = CohortFilter::from_pairs([
//!     ("plec", vec!["K"]),
//!     ("kat_wiek", vec!["60 - 64", "65 - 69"]),
//! ])
//! .unwrap();
//! assert!(by_name.sex.as_ref().unwrap().contains(&Sex::Female));
//!
//! assert!(CohortFilter::from_pairs([("hospital", vec!["x"])]).is_err());
//! ```

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::RecordStore;
use crate::types::{AgeBracket, ReportRow, Sex, VaccineProducer};

// ============================================================================
// Filter columns
// ============================================================================

/// Columns a cohort filter can constrain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterColumn {
    /// `sex` / `plec`
    Sex,
    /// `age_bracket` / `kat_wiek`
    AgeBracket,
    /// `vaccine_producer` / `producent`
    VaccineProducer,
    /// `last_dose` / `dawka_ost`
    LastDose,
}

impl FilterColumn {
    /// Canonical column name
    pub fn name(&self) -> &'static str {
        match self {
            FilterColumn::Sex => "sex",
            FilterColumn::AgeBracket => "age_bracket",
            FilterColumn::VaccineProducer => "vaccine_producer",
            FilterColumn::LastDose => "last_dose",
        }
    }
}

impl fmt::Display for FilterColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterColumn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "sex" | "plec" => Ok(FilterColumn::Sex),
            "age_bracket" | "kat_wiek" => Ok(FilterColumn::AgeBracket),
            "vaccine_producer" | "producent" => Ok(FilterColumn::VaccineProducer),
            "last_dose" | "dawka_ost" => Ok(FilterColumn::LastDose),
            other => Err(Error::UnknownFilterColumn(other.to_string())),
        }
    }
}

// ============================================================================
// Cohort filter
// ============================================================================

/// Conjunction of membership predicates selecting a cohort
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct CohortFilter {
    /// Accepted sexes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sex: Option<BTreeSet<Sex>>,

    /// Accepted age brackets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_bracket: Option<BTreeSet<AgeBracket>>,

    /// Accepted vaccine producers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vaccine_producer: Option<BTreeSet<VaccineProducer>>,

    /// Accepted last-dose labels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_dose: Option<BTreeSet<String>>,
}

/// Narrow `slot` to `values`; constraining a column twice intersects the sets
fn constrain<T: Ord>(slot: &mut Option<BTreeSet<T>>, values: BTreeSet<T>) {
    match slot {
        Some(existing) => existing.retain(|v| values.contains(v)),
        None => *slot = Some(values),
    }
}

impl CohortFilter {
    /// Unconstrained filter selecting every row
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to the given sexes
    pub fn with_sex(mut self, values: impl IntoIterator<Item = Sex>) -> Self {
        constrain(&mut self.sex, values.into_iter().collect());
        self
    }

    /// Restrict to the given age brackets
    pub fn with_age_brackets(mut self, values: impl IntoIterator<Item = AgeBracket>) -> Self {
        constrain(&mut self.age_bracket, values.into_iter().collect());
        self
    }

    /// Restrict to the given vaccine producers
    pub fn with_producers(mut self, values: impl IntoIterator<Item = VaccineProducer>) -> Self {
        constrain(&mut self.vaccine_producer, values.into_iter().collect());
        self
    }

    /// Restrict to the given last-dose labels
    pub fn with_last_doses<S: Into<String>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        constrain(
            &mut self.last_dose,
            values.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Build a filter from column-name/value-list pairs
    ///
    /// Column names may be given in English (`sex`) or as the export header
    /// (`plec`). Values that do not name anything in that column are kept
    /// as "matches nothing", so `{sex: ["X"]}` selects no rows.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownFilterColumn`] when a column name is not filterable.
    pub fn from_pairs<I, C, V, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (C, V)>,
        C: AsRef<str>,
        V: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::new();
        for (column, values) in pairs {
            let column: FilterColumn = column.as_ref().parse()?;
            let values = values.into_iter();
            filter = match column {
                FilterColumn::Sex => {
                    filter.with_sex(values.filter_map(|v| Sex::from_label(v.as_ref())))
                },
                FilterColumn::AgeBracket => filter
                    .with_age_brackets(values.filter_map(|v| AgeBracket::from_label(v.as_ref()))),
                FilterColumn::VaccineProducer => filter
                    .with_producers(values.map(|v| VaccineProducer::from_label(v.as_ref()))),
                FilterColumn::LastDose => {
                    filter.with_last_doses(values.map(|v| v.as_ref().trim().to_string()))
                },
            };
        }
        Ok(filter)
    }

    /// Whether no column is constrained
    pub fn is_unconstrained(&self) -> bool {
        self.active_columns().is_empty()
    }

    /// Constrained columns
    pub fn active_columns(&self) -> Vec<FilterColumn> {
        let mut columns = Vec::new();
        if self.sex.is_some() {
            columns.push(FilterColumn::Sex);
        }
        if self.age_bracket.is_some() {
            columns.push(FilterColumn::AgeBracket);
        }
        if self.vaccine_producer.is_some() {
            columns.push(FilterColumn::VaccineProducer);
        }
        if self.last_dose.is_some() {
            columns.push(FilterColumn::LastDose);
        }
        columns
    }

    /// Whether `row` satisfies every constrained column
    #[inline]
    pub fn matches(&self, row: &ReportRow) -> bool {
        fn accepts<T: Ord>(slot: &Option<BTreeSet<T>>, value: &T) -> bool {
            slot.as_ref().map_or(true, |set| set.contains(value))
        }

        accepts(&self.sex, &row.sex)
            && accepts(&self.age_bracket, &row.age_bracket)
            && accepts(&self.vaccine_producer, &row.vaccine_producer)
            && accepts(&self.last_dose, &row.last_dose)
    }

    /// Select the matching rows of a store
    pub fn apply<'a>(&self, store: &'a RecordStore) -> Selection<'a> {
        let rows: Vec<&ReportRow> = if self.is_unconstrained() {
            store.iter().collect()
        } else {
            store.iter().filter(|row| self.matches(row)).collect()
        };

        debug!(
            dataset = %store.id(),
            filter = %self,
            matched = rows.len(),
            of = store.len(),
            "Cohort filter applied"
        );

        Selection { store, rows }
    }
}

impl fmt::Display for CohortFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_set<T: fmt::Display>(
            f: &mut fmt::Formatter<'_>,
            first: &mut bool,
            name: &str,
            set: &Option<BTreeSet<T>>,
        ) -> fmt::Result {
            if let Some(set) = set {
                if !*first {
                    f.write_str(" ")?;
                }
                *first = false;
                let values: Vec<String> = set.iter().map(ToString::to_string).collect();
                write!(f, "{}=[{}]", name, values.join(", "))?;
            }
            Ok(())
        }

        if self.is_unconstrained() {
            return f.write_str("(all)");
        }
        let mut first = true;
        write_set(f, &mut first, "sex", &self.sex)?;
        write_set(f, &mut first, "age_bracket", &self.age_bracket)?;
        write_set(f, &mut first, "vaccine_producer", &self.vaccine_producer)?;
        write_set(f, &mut first, "last_dose", &self.last_dose)
    }
}

// ============================================================================
// Selection
// ============================================================================

/// Rows of a record store selected by a cohort filter
///
/// Borrows from the store; never copies row data. The selection keeps a
/// reference to its store, so totals are always taken over the rows it
/// was selected from.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection<'a> {
    store: &'a RecordStore,
    rows: Vec<&'a ReportRow>,
}

impl<'a> Selection<'a> {
    /// Store the rows were selected from
    pub fn store(&self) -> &'a RecordStore {
        self.store
    }

    /// Selected rows in store order
    pub fn rows(&self) -> &[&'a ReportRow] {
        &self.rows
    }

    /// Iterate over selected rows
    pub fn iter(&self) -> impl Iterator<Item = &'a ReportRow> + '_ {
        self.rows.iter().copied()
    }

    /// Number of selected rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether nothing was selected
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of `count` over selected rows
    pub fn total_count(&self) -> u64 {
        self.rows.iter().map(|r| r.count).sum()
    }

    /// Apply another filter to this subset
    pub fn refine(&self, filter: &CohortFilter) -> Selection<'a> {
        Selection {
            store: self.store,
            rows: self
                .rows
                .iter()
                .copied()
                .filter(|row| filter.matches(row))
                .collect(),
        }
    }
}
