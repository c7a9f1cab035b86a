//! CF-convention time axes and model calendars.
//!
//! Climate model output frequently uses calendars other than the Gregorian
//! one. Offsets along a `time` axis are decoded into `(year, month)` pairs
//! according to the calendar the file declares:
//!
//! - `standard`/`gregorian`/`proleptic_gregorian`: real calendar dates.
//! - `noleap`/`365_day`: every year has 365 days, February has 28.
//! - `all_leap`/`366_day`: every year has 366 days, February has 29.
//! - `360_day`: twelve months of exactly 30 days. The month of a day is
//!   `floor(day_of_year / 30) + 1`, so climatologies from 360-day models stay
//!   self-consistent instead of being smeared across Gregorian month lengths.

use crate::{ClimateError, ClimateResult};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const NOLEAP_MONTH_DAYS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
const ALL_LEAP_MONTH_DAYS: [u32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Calendar {
    Gregorian,
    NoLeap,
    AllLeap,
    ThreeSixtyDay,
}

impl FromStr for Calendar {
    type Err = ClimateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "standard" | "gregorian" | "proleptic_gregorian" => Ok(Calendar::Gregorian),
            "noleap" | "365_day" => Ok(Calendar::NoLeap),
            "all_leap" | "366_day" => Ok(Calendar::AllLeap),
            "360_day" => Ok(Calendar::ThreeSixtyDay),
            other => Err(ClimateError::Format(format!("unsupported calendar '{}'", other))),
        }
    }
}

impl Calendar {
    /// Convert a day count (possibly negative) from `epoch` into `(year, month)`.
    fn year_month(&self, epoch: &CfEpoch, days: f64) -> ClimateResult<(i32, u32)> {
        match self {
            Calendar::Gregorian => {
                let start = NaiveDate::from_ymd_opt(epoch.year, epoch.month, epoch.day)
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .ok_or_else(|| {
                        ClimateError::Format(format!("epoch {} is not a valid date", epoch))
                    })?;
                let overflow =
                    || ClimateError::Format(format!("time offset {} days overflows", days));
                let millis = ((days + epoch.seconds / 86_400.0) * 86_400_000.0).round();
                // Casting saturates, so range-check before converting
                if !(millis > i64::MIN as f64 && millis < i64::MAX as f64) {
                    return Err(overflow());
                }
                let offset = Duration::try_milliseconds(millis as i64).ok_or_else(overflow)?;
                let date = start.checked_add_signed(offset).ok_or_else(overflow)?;
                Ok((date.year(), date.month()))
            }
            Calendar::NoLeap => fixed_length_year_month(epoch, days, &NOLEAP_MONTH_DAYS),
            Calendar::AllLeap => fixed_length_year_month(epoch, days, &ALL_LEAP_MONTH_DAYS),
            Calendar::ThreeSixtyDay => fixed_length_year_month(epoch, days, &[30; 12]),
        }
    }
}

/// Decode for calendars in which every year has the same month lengths.
fn fixed_length_year_month(
    epoch: &CfEpoch,
    days: f64,
    month_days: &[u32; 12],
) -> ClimateResult<(i32, u32)> {
    let year_len: u32 = month_days.iter().sum();
    let epoch_month = epoch.month as usize - 1;
    if epoch.day > month_days[epoch_month] {
        return Err(ClimateError::Format(format!(
            "epoch {} does not exist in this calendar",
            epoch
        )));
    }

    let epoch_day_of_year: u32 = month_days[..epoch_month].iter().sum::<u32>() + epoch.day - 1;
    let total = (epoch_day_of_year as f64 + epoch.seconds / 86_400.0 + days).floor() as i64;

    let year = epoch.year as i64 + total.div_euclid(year_len as i64);
    let mut day_of_year = total.rem_euclid(year_len as i64) as u32;

    let mut month = 1;
    for len in month_days {
        if day_of_year < *len {
            break;
        }
        day_of_year -= len;
        month += 1;
    }

    let year = i32::try_from(year)
        .map_err(|_| ClimateError::Format(format!("time offset {} days overflows", days)))?;
    Ok((year, month))
}

/// Reference instant of a CF time axis, kept as raw fields because model
/// calendars allow dates (Feb 30) that no real calendar has.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CfEpoch {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// Seconds after midnight.
    pub seconds: f64,
}

impl fmt::Display for CfEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Unit of offsets along a CF time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn per_day(&self) -> f64 {
        match self {
            TimeUnit::Seconds => 86_400.0,
            TimeUnit::Minutes => 1_440.0,
            TimeUnit::Hours => 24.0,
            TimeUnit::Days => 1.0,
        }
    }
}

/// Decoder for a CF `units = "<unit> since <epoch>"` time axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CfTime {
    pub unit: TimeUnit,
    pub epoch: CfEpoch,
    pub calendar: Calendar,
}

impl CfTime {
    /// Parse `units` (e.g. `days since 1850-01-01`, `hours since 1900-1-1 00:00:0.0`)
    /// and a `calendar` attribute.
    pub fn parse(units: &str, calendar: &str) -> ClimateResult<Self> {
        let calendar: Calendar = calendar.parse()?;
        let lower = units.trim().to_ascii_lowercase();
        let (unit, epoch) = lower
            .split_once(" since ")
            .ok_or_else(|| ClimateError::Format(format!("time units '{}' lack 'since'", units)))?;

        let unit = match unit.trim() {
            "seconds" | "second" | "s" => TimeUnit::Seconds,
            "minutes" | "minute" => TimeUnit::Minutes,
            "hours" | "hour" | "h" => TimeUnit::Hours,
            "days" | "day" | "d" => TimeUnit::Days,
            other => {
                return Err(ClimateError::Format(format!("unsupported time unit '{}'", other)))
            }
        };

        Ok(Self {
            unit,
            epoch: parse_epoch(epoch.trim())?,
            calendar,
        })
    }

    /// Calendar year and month (1-based) of an offset along the axis.
    pub fn year_month(&self, offset: f64) -> ClimateResult<(i32, u32)> {
        if !offset.is_finite() {
            return Err(ClimateError::Format(format!("non-finite time offset {}", offset)));
        }
        self.calendar.year_month(&self.epoch, offset / self.unit.per_day())
    }
}

/// Parse the epoch part of CF time units. Accepts non-padded fields,
/// `T` separators, fractional seconds and a trailing `Z`/UTC marker.
fn parse_epoch(text: &str) -> ClimateResult<CfEpoch> {
    let invalid = || ClimateError::Format(format!("invalid time epoch '{}'", text));
    let trimmed = text.trim_end_matches(" utc").trim_end_matches('z');
    let mut parts = trimmed.splitn(2, |c: char| c == ' ' || c == 't');
    let date_part = parts.next().ok_or_else(invalid)?;
    let time_part = parts.next().map(str::trim).unwrap_or("");

    let mut ymd = date_part.split('-');
    let year: i32 = ymd.next().and_then(|v| v.parse().ok()).ok_or_else(invalid)?;
    let month: u32 = ymd.next().map_or(Some(1), |v| v.parse().ok()).ok_or_else(invalid)?;
    let day: u32 = ymd.next().map_or(Some(1), |v| v.parse().ok()).ok_or_else(invalid)?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(invalid());
    }

    let mut seconds = 0.0;
    if !time_part.is_empty() {
        let mut hms = time_part.split(':');
        let h: f64 = hms.next().and_then(|v| v.parse().ok()).ok_or_else(invalid)?;
        let m: f64 = hms.next().map_or(Some(0.0), |v| v.parse().ok()).ok_or_else(invalid)?;
        let s: f64 = hms.next().map_or(Some(0.0), |v| v.parse().ok()).ok_or_else(invalid)?;
        seconds = h * 3600.0 + m * 60.0 + s;
    }

    Ok(CfEpoch {
        year,
        month,
        day,
        seconds,
    })
}

/// Temporal layout of the layers in a grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TimeAxis {
    /// A single time-invariant layer (e.g. elevation, or one month's file).
    Static,
    /// Twelve climatological monthly layers, January first.
    MonthlyNormals,
    /// Dated time steps decoded with `time`.
    Dated { time: CfTime, offsets: Vec<f64> },
}

impl TimeAxis {
    /// Number of layers this axis describes, if fixed.
    pub fn expected_layers(&self) -> usize {
        match self {
            TimeAxis::Static => 1,
            TimeAxis::MonthlyNormals => 12,
            TimeAxis::Dated { offsets, .. } => offsets.len(),
        }
    }

    /// Decoded `(year, month)` of each time step.
    pub fn year_months(&self) -> ClimateResult<Vec<(i32, u32)>> {
        match self {
            TimeAxis::Dated { time, offsets } => {
                offsets.iter().map(|&o| time.year_month(o)).collect()
            }
            _ => Err(ClimateError::Format(
                "time axis carries no dates".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        let t = CfTime::parse("days since 1850-01-01", "noleap").unwrap();
        assert_eq!(t.unit, TimeUnit::Days);
        assert_eq!(t.calendar, Calendar::NoLeap);
        assert_eq!((t.epoch.year, t.epoch.month, t.epoch.day), (1850, 1, 1));

        let t = CfTime::parse("hours since 1900-1-1 00:00:0.0", "standard").unwrap();
        assert_eq!(t.unit, TimeUnit::Hours);
        assert_eq!((t.epoch.year, t.epoch.month, t.epoch.day), (1900, 1, 1));

        assert!(CfTime::parse("days after 1850-01-01", "standard").is_err());
        assert!(CfTime::parse("days since 1850-01-01", "julian_moon").is_err());
    }

    #[test]
    fn test_gregorian_decoding() {
        let t = CfTime::parse("days since 2000-01-01", "gregorian").unwrap();
        assert_eq!(t.year_month(0.0).unwrap(), (2000, 1));
        // 2000 is a leap year: day 59 is Feb 29, day 60 is Mar 1
        assert_eq!(t.year_month(59.0).unwrap(), (2000, 2));
        assert_eq!(t.year_month(60.0).unwrap(), (2000, 3));
        assert_eq!(t.year_month(-1.0).unwrap(), (1999, 12));

        let t = CfTime::parse("hours since 2000-01-01 00:00:00", "standard").unwrap();
        assert_eq!(t.year_month(24.0 * 31.0).unwrap(), (2000, 2));
    }

    #[test]
    fn test_noleap_decoding() {
        let t = CfTime::parse("days since 2000-01-01", "365_day").unwrap();
        // No Feb 29: day 59 is already March
        assert_eq!(t.year_month(59.0).unwrap(), (2000, 3));
        assert_eq!(t.year_month(365.0).unwrap(), (2001, 1));
        assert_eq!(t.year_month(365.0 * 10.0 + 364.0).unwrap(), (2010, 12));
    }

    #[test]
    fn test_all_leap_decoding() {
        let t = CfTime::parse("days since 2001-01-01", "all_leap").unwrap();
        assert_eq!(t.year_month(59.0).unwrap(), (2001, 2));
        assert_eq!(t.year_month(365.0).unwrap(), (2001, 12));
        assert_eq!(t.year_month(366.0).unwrap(), (2002, 1));
    }

    #[test]
    fn test_360_day_months_are_thirty_days() {
        let t = CfTime::parse("days since 1970-01-01", "360_day").unwrap();
        assert_eq!(t.year_month(0.0).unwrap(), (1970, 1));
        assert_eq!(t.year_month(29.9).unwrap(), (1970, 1));
        assert_eq!(t.year_month(30.0).unwrap(), (1970, 2));
        // February has 30 days, so day 59 is its last day
        assert_eq!(t.year_month(59.0).unwrap(), (1970, 2));
        assert_eq!(t.year_month(60.0).unwrap(), (1970, 3));
        assert_eq!(t.year_month(359.0).unwrap(), (1970, 12));
        assert_eq!(t.year_month(360.0).unwrap(), (1971, 1));
        // Mid-month stamps of month 12 of year 30
        assert_eq!(t.year_month(360.0 * 30.0 + 345.0).unwrap(), (2000, 12));
    }

    #[test]
    fn test_360_day_epoch_on_day_thirty() {
        let t = CfTime::parse("days since 2000-02-30", "360_day").unwrap();
        assert_eq!(t.year_month(0.0).unwrap(), (2000, 2));
        assert_eq!(t.year_month(1.0).unwrap(), (2000, 3));
    }

    #[test]
    fn test_huge_offsets_are_format_errors() {
        let t = CfTime::parse("days since 2000-01-01", "standard").unwrap();
        for offset in [1e300, -1e300, 1.0e17, -1.0e17, 1.0e11] {
            assert!(matches!(t.year_month(offset), Err(ClimateError::Format(_))));
        }
        assert!(t.year_month(f64::NAN).is_err());

        let t = CfTime::parse("seconds since 1970-01-01", "gregorian").unwrap();
        assert!(matches!(t.year_month(-9.3e18), Err(ClimateError::Format(_))));
    }

    #[test]
    fn test_time_axis_layers() {
        assert_eq!(TimeAxis::Static.expected_layers(), 1);
        assert_eq!(TimeAxis::MonthlyNormals.expected_layers(), 12);
        assert!(TimeAxis::MonthlyNormals.year_months().is_err());
    }
}
