//! Duration Parsing
//!
//! Converts human-readable duration strings such as `"90"`, `"1.5h"` or
//! `"2 days"` into whole milliseconds.

use std::fmt;
use std::str::FromStr;

// == Unit Constants ==
const SECOND: f64 = 1000.0;
const MINUTE: f64 = SECOND * 60.0;
const HOUR: f64 = MINUTE * 60.0;
const DAY: f64 = HOUR * 24.0;
const WEEK: f64 = DAY * 7.0;
const YEAR: f64 = DAY * 365.25;

/// Longest input accepted by [`parse_duration`].
pub const MAX_DURATION_LENGTH: usize = 100;

/// Error type for parsing duration strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationParseError(String);

impl fmt::Display for DurationParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid duration: {:?}", self.0)
    }
}

impl std::error::Error for DurationParseError {}

// == Duration Unit ==
/// Unit suffix recognised by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    Years,
    Weeks,
    Days,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
}

impl DurationUnit {
    /// Number of milliseconds in one unit.
    pub fn millis(&self) -> f64 {
        match self {
            DurationUnit::Years => YEAR,
            DurationUnit::Weeks => WEEK,
            DurationUnit::Days => DAY,
            DurationUnit::Hours => HOUR,
            DurationUnit::Minutes => MINUTE,
            DurationUnit::Seconds => SECOND,
            DurationUnit::Milliseconds => 1.0,
        }
    }
}

impl FromStr for DurationUnit {
    type Err = DurationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "years" | "year" | "yrs" | "yr" | "y" => Ok(DurationUnit::Years),
            "weeks" | "week" | "w" => Ok(DurationUnit::Weeks),
            "days" | "day" | "d" => Ok(DurationUnit::Days),
            "hours" | "hour" | "hrs" | "hr" | "h" => Ok(DurationUnit::Hours),
            "minutes" | "minute" | "mins" | "min" | "m" => Ok(DurationUnit::Minutes),
            "seconds" | "second" | "secs" | "sec" | "s" => Ok(DurationUnit::Seconds),
            "" | "milliseconds" | "millisecond" | "msecs" | "msec" | "ms" => {
                Ok(DurationUnit::Milliseconds)
            }
            _ => Err(DurationParseError(s.to_string())),
        }
    }
}

// == Parse Duration ==
/// Parses a duration string into milliseconds.
///
/// The grammar is an optional sign, a decimal number, any number of spaces
/// and an optional case-insensitive unit. A missing unit means milliseconds.
/// The result is rounded to the nearest millisecond and may be negative.
pub fn parse_duration(input: &str) -> Result<i64, DurationParseError> {
    let invalid = || DurationParseError(input.to_string());

    if input.is_empty() || input.len() > MAX_DURATION_LENGTH {
        return Err(invalid());
    }

    let split = input
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && *c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    let (number, rest) = input.split_at(split);

    if number.is_empty() || number == "-" || number.ends_with('.') {
        return Err(invalid());
    }
    let value: f64 = number.parse().map_err(|_| invalid())?;

    let unit: DurationUnit = rest
        .trim_start_matches(' ')
        .parse()
        .map_err(|_| invalid())?;

    Ok((value * unit.millis()).round() as i64)
}
