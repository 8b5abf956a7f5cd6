//! Time-of-day arithmetic for period slots.

use chrono::{Duration, NaiveTime, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

use super::error::SlotError;

// Accepts "08:00", "8:00", "08.00" and database-style "08:00:00"
static TIME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})[:.](\d{2})(?::(\d{2}))?$").unwrap());

/// Rejected time-of-day input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid time of day: {input:?}")]
pub struct ParseTimeError {
    pub input: String,
}

/// A time of day with minute precision, formatted as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(NaiveTime);

impl ClockTime {
    /// Builds a time from hours and minutes, or `None` if either is out of range.
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(ClockTime)
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }

    /// Adds `minutes` to this time.
    ///
    /// Periods never cross midnight, so wrapping around the day is reported
    /// as an error instead of silently producing an early-morning time.
    pub fn add_minutes(self, minutes: i64) -> Result<ClockTime, SlotError> {
        let (time, wrapped_secs) = self
            .0
            .overflowing_add_signed(Duration::minutes(minutes));
        if wrapped_secs != 0 {
            return Err(SlotError::CrossesMidnight {
                start: self,
                minutes,
            });
        }
        Ok(ClockTime(time))
    }

    /// Minutes from `self` until `end`; negative when `end` is earlier.
    pub fn minutes_until(self, end: ClockTime) -> i64 {
        duration_minutes(self, end)
    }
}

/// Minutes between two times of day. Negative if `end < start`; callers
/// must treat that as an error rather than clamp it.
pub fn duration_minutes(start: ClockTime, end: ClockTime) -> i64 {
    (end.0 - start.0).num_minutes()
}

impl FromStr for ClockTime {
    type Err = ParseTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTimeError {
            input: s.to_string(),
        };
        let caps = TIME_REGEX.captures(s.trim()).ok_or_else(err)?;

        let hour: u32 = caps[1].parse().map_err(|_| err())?;
        let minute: u32 = caps[2].parse().map_err(|_| err())?;
        // Seconds are accepted for compatibility but must be zero
        if let Some(secs) = caps.get(3) {
            if secs.as_str() != "00" {
                return Err(err());
            }
        }

        ClockTime::from_hm(hour, minute).ok_or_else(err)
    }
}

impl TryFrom<String> for ClockTime {
    type Error = ParseTimeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0.hour(), self.0.minute())
    }
}
