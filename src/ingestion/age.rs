//! Age bracket classification
//!
//! Ages are grouped into 17 contiguous five-year brackets covering 0-84, a
//! terminal open bracket `85 i więcej`, and a `DB` ("brak danych", data
//! unavailable) bracket for sentinel age codes.
//!
//! Classification happens once per row during ingestion. [`AgeBracketTable`]
//! precomputes the mapping over the observed age range so the per-row cost
//! is a single index.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Raw age codes the exports use instead of a number
pub const AGE_SENTINELS: [&str; 2] = ["DB", "95+"];

const LABELS: [&str; 19] = [
    "0 - 4",
    "5 - 9",
    "10 - 14",
    "15 - 19",
    "20 - 24",
    "25 - 29",
    "30 - 34",
    "35 - 39",
    "40 - 44",
    "45 - 49",
    "50 - 54",
    "55 - 59",
    "60 - 64",
    "65 - 69",
    "70 - 74",
    "75 - 79",
    "80 - 84",
    "85 i więcej",
    "DB",
];

/// Lower bound of the open-ended bracket
const OPEN_ENDED_FROM: u16 = 85;

/// Age bracket of a report row
///
/// Ordered by age; [`AgeBracket::UNAVAILABLE`] sorts last.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgeBracket(u8);

impl AgeBracket {
    /// `85 i więcej`
    pub const OPEN_ENDED: AgeBracket = AgeBracket(17);

    /// `DB`, data unavailable
    pub const UNAVAILABLE: AgeBracket = AgeBracket(18);

    /// The 18 age brackets offered by the dashboard selector, youngest first
    pub fn selectable() -> impl Iterator<Item = AgeBracket> {
        (0..=Self::OPEN_ENDED.0).map(AgeBracket)
    }

    /// Bracket of an age in years
    ///
    /// First match wins over ascending bracket boundaries; everything from
    /// 85 upwards lands in the open-ended bracket.
    pub fn classify(age: u16) -> Self {
        if age >= OPEN_ENDED_FROM {
            Self::OPEN_ENDED
        } else {
            AgeBracket((age / 5) as u8)
        }
    }

    /// Display label, e.g. `"35 - 39"`
    pub fn label(&self) -> &'static str {
        LABELS[self.0 as usize]
    }

    /// Parse a bracket label; `None` when the label is not one of ours
    pub fn from_label(s: &str) -> Option<Self> {
        let s = s.trim();
        LABELS
            .iter()
            .position(|label| *label == s)
            .map(|i| AgeBracket(i as u8))
    }

    /// Inclusive age range, `None` for [`AgeBracket::UNAVAILABLE`]
    pub fn bounds(&self) -> Option<(u16, Option<u16>)> {
        match *self {
            Self::UNAVAILABLE => None,
            Self::OPEN_ENDED => Some((OPEN_ENDED_FROM, None)),
            AgeBracket(i) => {
                let lower = u16::from(i) * 5;
                Some((lower, Some(lower + 4)))
            },
        }
    }
}

impl fmt::Debug for AgeBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgeBracket({})", self.label())
    }
}

impl fmt::Display for AgeBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AgeBracket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| format!("unknown age bracket '{}'", s))
    }
}

impl Serialize for AgeBracket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Precomputed age → bracket lookup
#[derive(Debug, Clone)]
pub struct AgeBracketTable {
    brackets: Vec<AgeBracket>,
}

impl AgeBracketTable {
    /// Build a table covering `0..=max_age`
    pub fn new(max_age: u16) -> Self {
        Self {
            brackets: (0..=max_age).map(AgeBracket::classify).collect(),
        }
    }

    /// Build a table covering the largest age in `ages`
    pub fn for_ages(ages: impl IntoIterator<Item = u16>) -> Self {
        Self::new(ages.into_iter().max().unwrap_or(0))
    }

    /// Bracket of `age`, computed directly when outside the table
    #[inline]
    pub fn lookup(&self, age: u16) -> AgeBracket {
        self.brackets
            .get(age as usize)
            .copied()
            .unwrap_or_else(|| AgeBracket::classify(age))
    }

    /// Largest age covered by the table
    pub fn max_age(&self) -> u16 {
        self.brackets.len().saturating_sub(1) as u16
    }
}

impl Default for AgeBracketTable {
    fn default() -> Self {
        Self::new(120)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bracket_boundaries() {
        assert_eq!(AgeBracket::classify(0).label(), "0 - 4");
        assert_eq!(AgeBracket::classify(4).label(), "0 - 4");
        assert_eq!(AgeBracket::classify(5).label(), "5 - 9");
        assert_eq!(AgeBracket::classify(84).label(), "80 - 84");
        assert_eq!(AgeBracket::classify(85), AgeBracket::OPEN_ENDED);
        assert_eq!(AgeBracket::classify(117), AgeBracket::OPEN_ENDED);
    }

    #[test]
    fn test_selectable_brackets() {
        let all: Vec<_> = AgeBracket::selectable().collect();
        assert_eq!(all.len(), 18);
        assert_eq!(all[0].label(), "0 - 4");
        assert_eq!(all[17].label(), "85 i więcej");
        assert!(!all.contains(&AgeBracket::UNAVAILABLE));
    }

    #[test]
    fn test_label_round_trip() {
        for bracket in AgeBracket::selectable() {
            assert_eq!(AgeBracket::from_label(bracket.label()), Some(bracket));
        }
        assert_eq!(AgeBracket::from_label("DB"), Some(AgeBracket::UNAVAILABLE));
        assert_eq!(AgeBracket::from_label("90 - 94"), None);
    }

    #[test]
    fn test_bounds() {
        assert_eq!(AgeBracket::classify(42).bounds(), Some((40, Some(44))));
        assert_eq!(AgeBracket::OPEN_ENDED.bounds(), Some((85, None)));
        assert_eq!(AgeBracket::UNAVAILABLE.bounds(), None);
    }

    #[test]
    fn test_table_includes_max_age() {
        let table = AgeBracketTable::for_ages([3, 17, 86]);
        assert_eq!(table.max_age(), 86);
        assert_eq!(table.lookup(86), AgeBracket::OPEN_ENDED);
        assert_eq!(table.lookup(17).label(), "15 - 19");
    }

    #[test]
    fn test_table_falls_back_outside_range() {
        let table = AgeBracketTable::new(10);
        assert_eq!(table.lookup(64).label(), "60 - 64");
    }

    #[test]
    fn test_table_matches_classifier() {
        let table = AgeBracketTable::default();
        for age in 0..=130 {
            assert_eq!(table.lookup(age), AgeBracket::classify(age));
        }
    }
}
