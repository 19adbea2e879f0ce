//! Timestamp formats and display zones
//!
//! DateTime values are canonically `i64` nanoseconds since the Unix epoch.
//! A [`TimeFormat`] selects how that number is presented to (or accepted
//! from) a caller:
//!
//! | Format | Integer form | String form |
//! |--------|--------------|-------------|
//! | `ns` | identity | decimal nanoseconds |
//! | `us` | ÷ 1,000 | decimal microseconds |
//! | `ms` | ÷ 1,000,000 | decimal milliseconds |
//! | `s` | ÷ 1,000,000,000 | decimal Unix seconds |
//! | pattern | nanoseconds | `strftime` pattern in the display zone |
//!
//! Division truncates toward zero.

use chrono::format::{Item, StrftimeItems};
use chrono::{
    DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::str::FromStr;

use crate::error::{CodecError, Result};

/// Default pattern for rendering timestamps as strings.
pub const DEFAULT_TIME_PATTERN: &str = "%Y-%m-%d %H:%M:%S";

/// How timestamps are scaled or formatted at the caller boundary.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeFormat {
    /// Nanoseconds (canonical)
    #[default]
    Nanos,
    /// Microseconds
    Micros,
    /// Milliseconds
    Millis,
    /// Seconds
    Seconds,
    /// `strftime`-style pattern rendered in the display zone
    Pattern(String),
}

impl TimeFormat {
    /// Nanoseconds per unit for the integer modes, `None` for patterns.
    pub fn divisor(&self) -> Option<i64> {
        match self {
            TimeFormat::Nanos => Some(1),
            TimeFormat::Micros => Some(1_000),
            TimeFormat::Millis => Some(1_000_000),
            TimeFormat::Seconds => Some(1_000_000_000),
            TimeFormat::Pattern(_) => None,
        }
    }

    /// Convert canonical nanoseconds into this unit. Patterns yield
    /// nanoseconds unchanged.
    pub fn from_nanos(&self, nanos: i64) -> i64 {
        match self.divisor() {
            Some(d) => nanos / d,
            None => nanos,
        }
    }

    /// Scale a value in this unit up to nanoseconds.
    pub fn to_nanos(&self, value: i64) -> Result<i64> {
        let d = self
            .divisor()
            .ok_or_else(|| CodecError::mismatch("integer", format!("datetime({})", self)))?;
        value
            .checked_mul(d)
            .ok_or_else(|| CodecError::invalid("datetime", format!("{} {} overflows", value, self)))
    }
}

impl FromStr for TimeFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ns" => Ok(TimeFormat::Nanos),
            "us" => Ok(TimeFormat::Micros),
            "ms" => Ok(TimeFormat::Millis),
            "s" => Ok(TimeFormat::Seconds),
            "" => Err("empty time format".to_string()),
            pattern if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) => {
                Err(format!("invalid time pattern '{}'", pattern))
            }
            pattern => Ok(TimeFormat::Pattern(pattern.to_string())),
        }
    }
}

impl TryFrom<String> for TimeFormat {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TimeFormat> for String {
    fn from(f: TimeFormat) -> Self {
        f.to_string()
    }
}

impl fmt::Display for TimeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeFormat::Nanos => f.write_str("ns"),
            TimeFormat::Micros => f.write_str("us"),
            TimeFormat::Millis => f.write_str("ms"),
            TimeFormat::Seconds => f.write_str("s"),
            TimeFormat::Pattern(p) => f.write_str(p),
        }
    }
}

/// Timezone used to render and parse pattern-formatted timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DisplayZone {
    /// UTC
    #[default]
    Utc,
    /// The host's local zone
    Local,
    /// A fixed offset such as `+09:00`
    Fixed(FixedOffset),
}

impl DisplayZone {
    /// Render canonical nanoseconds with a pattern in this zone.
    ///
    /// A pattern chrono cannot render is an `InvalidValue` error.
    pub fn format(&self, nanos: i64, pattern: &str) -> Result<String> {
        let utc = Utc.timestamp_nanos(nanos);
        let mut out = String::new();
        let written = match self {
            DisplayZone::Utc => write!(out, "{}", utc.format(pattern)),
            DisplayZone::Local => write!(out, "{}", utc.with_timezone(&Local).format(pattern)),
            DisplayZone::Fixed(offset) => write!(out, "{}", utc.with_timezone(offset).format(pattern)),
        };
        written.map_err(|_| CodecError::invalid("datetime", format!("invalid time pattern '{}'", pattern)))?;
        Ok(out)
    }

    /// Parse a string with a pattern, interpreting zone-less input in this
    /// zone. Returns canonical nanoseconds.
    pub fn parse(&self, input: &str, pattern: &str) -> Result<i64> {
        if let Ok(dt) = DateTime::parse_from_str(input, pattern) {
            return to_nanos(&dt.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(input, pattern)
            .or_else(|_| {
                NaiveDate::parse_from_str(input, pattern)
                    .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
            })
            .map_err(|e| {
                CodecError::invalid("datetime", format!("'{}' does not match '{}': {}", input, pattern, e))
            })?;
        let utc = match self {
            DisplayZone::Utc => Some(Utc.from_utc_datetime(&naive)),
            DisplayZone::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            DisplayZone::Fixed(offset) => offset
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc)),
        };
        let utc = utc.ok_or_else(|| {
            CodecError::invalid("datetime", format!("'{}' does not exist in zone {}", input, self))
        })?;
        to_nanos(&utc)
    }
}

/// Canonical nanoseconds of a UTC timestamp.
pub fn to_nanos(dt: &DateTime<Utc>) -> Result<i64> {
    dt.timestamp_nanos_opt()
        .ok_or_else(|| CodecError::invalid("datetime", format!("{} is out of range", dt)))
}

/// UTC timestamp of canonical nanoseconds.
pub fn from_nanos(nanos: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(nanos)
}

fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None if rest.len() == 4 => (rest.get(..2)?.parse().ok()?, rest.get(2..)?.parse().ok()?),
        None => (rest.parse().ok()?, 0),
    };
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

impl FromStr for DisplayZone {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "UTC" | "utc" | "Z" => Ok(DisplayZone::Utc),
            "Local" | "local" => Ok(DisplayZone::Local),
            other => parse_offset(other)
                .map(DisplayZone::Fixed)
                .ok_or_else(|| format!("invalid zone '{}': expected UTC, Local or +HH:MM", other)),
        }
    }
}

impl TryFrom<String> for DisplayZone {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DisplayZone> for String {
    fn from(z: DisplayZone) -> Self {
        z.to_string()
    }
}

impl fmt::Display for DisplayZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayZone::Utc => f.write_str("UTC"),
            DisplayZone::Local => f.write_str("Local"),
            DisplayZone::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}
