//! Periods a normal can be aggregated over: one month, one season, or the year.

use crate::{ClimateError, ClimateResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Meteorological seasons (northern-hemisphere naming).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Djf,
    Mam,
    Jja,
    Son,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Djf, Season::Mam, Season::Jja, Season::Son];

    /// Calendar months (1-based) making up the season.
    pub fn months(&self) -> [u32; 3] {
        match self {
            Season::Djf => [12, 1, 2],
            Season::Mam => [3, 4, 5],
            Season::Jja => [6, 7, 8],
            Season::Son => [9, 10, 11],
        }
    }
}

/// A period over which a normal is computed.
///
/// Serialized as its path segment (`07`, `12_01_02`, `year`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Period {
    /// Full year (month 0).
    Annual,
    /// Single calendar month, 1..=12.
    Month(u32),
    Season(Season),
}

impl Period {
    /// Build a period from a month index where 0 means the full year.
    pub fn from_month(month: u32) -> ClimateResult<Self> {
        match month {
            0 => Ok(Period::Annual),
            1..=12 => Ok(Period::Month(month)),
            _ => Err(ClimateError::OutOfBounds(format!(
                "month {} is outside 0..=12",
                month
            ))),
        }
    }

    /// Every period tiles are generated for: 12 months, 4 seasons and the year.
    pub fn all() -> Vec<Period> {
        let mut periods: Vec<Period> = (1..=12).map(Period::Month).collect();
        periods.extend(Season::ALL.iter().copied().map(Period::Season));
        periods.push(Period::Annual);
        periods
    }

    /// Calendar months covered by this period.
    pub fn months(&self) -> Vec<u32> {
        match self {
            Period::Annual => (1..=12).collect(),
            Period::Month(m) => vec![*m],
            Period::Season(s) => s.months().to_vec(),
        }
    }

    /// Path segment used in tile directories, e.g. `07`, `12_01_02` or `year`.
    pub fn path_segment(&self) -> String {
        match self {
            Period::Annual => "year".to_string(),
            Period::Month(m) => format!("{:02}", m),
            Period::Season(s) => {
                let [a, b, c] = s.months();
                format!("{:02}_{:02}_{:02}", a, b, c)
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path_segment())
    }
}

impl FromStr for Period {
    type Err = ClimateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "year" | "annual" | "0" | "00" => Ok(Period::Annual),
            "12_01_02" | "djf" => Ok(Period::Season(Season::Djf)),
            "03_04_05" | "mam" => Ok(Period::Season(Season::Mam)),
            "06_07_08" | "jja" => Ok(Period::Season(Season::Jja)),
            "09_10_11" | "son" => Ok(Period::Season(Season::Son)),
            other => {
                let month: u32 = other
                    .parse()
                    .map_err(|_| ClimateError::Format(format!("invalid period '{}'", other)))?;
                Period::from_month(month)
            }
        }
    }
}

impl TryFrom<String> for Period {
    type Error = ClimateError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.path_segment()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segments() {
        assert_eq!(Period::Month(7).path_segment(), "07");
        assert_eq!(Period::Annual.path_segment(), "year");
        assert_eq!(Period::Season(Season::Djf).path_segment(), "12_01_02");
    }

    #[test]
    fn test_parse_round_trip() {
        for period in Period::all() {
            assert_eq!(period.path_segment().parse::<Period>().unwrap(), period);
        }
    }

    #[test]
    fn test_serde_uses_path_segment() {
        let json = serde_json::to_string(&vec![Period::Month(3), Period::Annual]).unwrap();
        assert_eq!(json, r#"["03","year"]"#);
        let parsed: Vec<Period> = serde_json::from_str(r#"["djf","7"]"#).unwrap();
        assert_eq!(parsed, vec![Period::Season(Season::Djf), Period::Month(7)]);
    }

    #[test]
    fn test_all_periods_unique() {
        let all = Period::all();
        assert_eq!(all.len(), 17);
        let unique: std::collections::HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), all.len());
    }

    #[test]
    fn test_month_out_of_range() {
        assert!(matches!(Period::from_month(13), Err(ClimateError::OutOfBounds(_))));
        assert!("13".parse::<Period>().is_err());
    }
}
