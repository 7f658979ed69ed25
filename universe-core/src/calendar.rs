//! Universe calendar: the shared temporal context of a run.
//!
//! Every inclusion algorithm reindexes its result onto the same ordered
//! timestamp sequence generated from `(start, last, frequency)`. Frequency
//! codes follow the familiar offset aliases (`D`, `B`, `W-FRI`, `4H`, `15min`).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Result, UniverseError};

/// Step size between consecutive calendar timestamps.
///
/// Serialized as its frequency code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Frequency {
    /// Every `n` calendar days.
    Day(u32),
    /// Every weekday (Monday to Friday), no holiday calendar.
    BusinessDay,
    /// Once a week, anchored on the given weekday.
    Week(Weekday),
    Hour(u32),
    Minute(u32),
    Second(u32),
}

impl Frequency {
    /// Move `ts` forward onto the first timestamp this frequency can produce.
    pub fn roll_forward(&self, ts: NaiveDateTime) -> NaiveDateTime {
        match self {
            Frequency::BusinessDay => {
                let mut ts = ts;
                while is_weekend(ts.weekday()) {
                    ts += Duration::days(1);
                }
                ts
            }
            Frequency::Week(anchor) => {
                let mut ts = ts;
                while ts.weekday() != *anchor {
                    ts += Duration::days(1);
                }
                ts
            }
            _ => ts,
        }
    }

    /// Shift an on-calendar timestamp by `periods` steps (negative moves back).
    ///
    /// `None` when the result falls outside the representable datetime range.
    pub fn offset(&self, ts: NaiveDateTime, periods: i64) -> Option<NaiveDateTime> {
        let scaled = |n: &u32| i64::from(*n).checked_mul(periods);
        let delta = match self {
            Frequency::Day(n) => TimeDelta::try_days(scaled(n)?)?,
            Frequency::Week(_) => TimeDelta::try_weeks(periods)?,
            Frequency::Hour(n) => TimeDelta::try_hours(scaled(n)?)?,
            Frequency::Minute(n) => TimeDelta::try_minutes(scaled(n)?)?,
            Frequency::Second(n) => TimeDelta::try_seconds(scaled(n)?)?,
            Frequency::BusinessDay => return business_day_offset(ts, periods),
        };
        ts.checked_add_signed(delta)
    }
}

/// Whole weeks move a weekday onto the same weekday five sessions away; the
/// remainder is walked day by day.
fn business_day_offset(ts: NaiveDateTime, periods: i64) -> Option<NaiveDateTime> {
    let direction = if periods < 0 { -1 } else { 1 };
    let mut remaining = periods.unsigned_abs();
    let mut ts = ts;
    if !is_weekend(ts.weekday()) && remaining >= 5 {
        let weeks = i64::try_from(remaining / 5).ok()? * direction;
        ts = ts.checked_add_signed(TimeDelta::try_weeks(weeks)?)?;
        remaining %= 5;
    }
    let step = TimeDelta::days(direction);
    for _ in 0..remaining {
        ts = ts.checked_add_signed(step)?;
        while is_weekend(ts.weekday()) {
            ts = ts.checked_add_signed(step)?;
        }
    }
    Some(ts)
}

fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

fn parse_weekday(code: &str) -> Option<Weekday> {
    match code {
        "MON" => Some(Weekday::Mon),
        "TUE" => Some(Weekday::Tue),
        "WED" => Some(Weekday::Wed),
        "THU" => Some(Weekday::Thu),
        "FRI" => Some(Weekday::Fri),
        "SAT" => Some(Weekday::Sat),
        "SUN" => Some(Weekday::Sun),
        _ => None,
    }
}

impl FromStr for Frequency {
    type Err = UniverseError;

    fn from_str(code: &str) -> Result<Self> {
        let invalid = || UniverseError::InvalidFrequency {
            code: code.to_string(),
        };
        let trimmed = code.trim();
        let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
        let (count, unit) = trimmed.split_at(digits);
        let multiple: u32 = if count.is_empty() {
            1
        } else {
            count.parse().map_err(|_| invalid())?
        };
        if multiple == 0 {
            return Err(invalid());
        }

        let frequency = match unit {
            "D" => Frequency::Day(multiple),
            "H" | "h" => Frequency::Hour(multiple),
            "T" | "min" => Frequency::Minute(multiple),
            "S" | "s" => Frequency::Second(multiple),
            "B" if multiple == 1 => Frequency::BusinessDay,
            "W" if multiple == 1 => Frequency::Week(Weekday::Sun),
            other if multiple == 1 && other.starts_with("W-") => {
                Frequency::Week(parse_weekday(&other[2..]).ok_or_else(invalid)?)
            }
            _ => return Err(invalid()),
        };
        Ok(frequency)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Day(n) => write!(f, "{n}D"),
            Frequency::BusinessDay => write!(f, "B"),
            Frequency::Week(day) => write!(f, "W-{}", day.to_string().to_uppercase()),
            Frequency::Hour(n) => write!(f, "{n}H"),
            Frequency::Minute(n) => write!(f, "{n}min"),
            Frequency::Second(n) => write!(f, "{n}S"),
        }
    }
}

impl TryFrom<String> for Frequency {
    type Error = UniverseError;

    fn try_from(code: String) -> Result<Self> {
        code.parse()
    }
}

impl From<Frequency> for String {
    fn from(frequency: Frequency) -> Self {
        frequency.to_string()
    }
}

/// The `(start, last, frequency)` context injected into every pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    start: NaiveDateTime,
    last: NaiveDateTime,
    frequency: Frequency,
}

impl Calendar {
    pub fn new(start: NaiveDateTime, last: NaiveDateTime, frequency: Frequency) -> Self {
        Self {
            start,
            last,
            frequency,
        }
    }

    /// Build a calendar from configuration strings.
    pub fn parse(start: &str, last: &str, frequency: &str) -> Result<Self> {
        Ok(Self::new(
            parse_datetime(start)?,
            parse_datetime(last)?,
            frequency.parse()?,
        ))
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn last(&self) -> NaiveDateTime {
        self.last
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// All timestamps in `[start, last]`, ascending.
    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        let mut out = Vec::new();
        let mut ts = self.frequency.roll_forward(self.start);
        while ts <= self.last {
            out.push(ts);
            match self.frequency.offset(ts, 1) {
                Some(next) => ts = next,
                None => break,
            }
        }
        out
    }

    /// Shift a calendar timestamp by `periods` steps of the calendar frequency.
    ///
    /// `None` when the shift leaves the representable datetime range.
    pub fn shift(&self, ts: NaiveDateTime, periods: i64) -> Option<NaiveDateTime> {
        self.frequency.offset(ts, periods)
    }
}

/// True for the textual spellings of an absent datetime.
pub fn is_null_marker(text: &str) -> bool {
    matches!(text.trim(), "" | "null" | "None" | "NaT")
}

/// Parse a datetime from the formats accepted in configuration and data files.
pub fn parse_datetime(text: &str) -> Result<NaiveDateTime> {
    let text = text.trim();
    const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.naive_utc());
    }
    Err(UniverseError::InvalidDatetime {
        value: text.to_string(),
    })
}
