//! Working hours, time windows and date ranges.
//!
//! All times of day are minute-of-day offsets (`0..=1440`); clock strings use
//! the `HH:MM` format the config file and CLI accept.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Parse an `HH:MM` clock string into a minute-of-day. `24:00` is accepted as end of day.
pub fn parse_clock(value: &str) -> Result<u32, ValidationError> {
    let invalid = || ValidationError::InvalidClockTime(value.to_string());
    let (hours, minutes) = value.trim().split_once(':').ok_or_else(invalid)?;
    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
    if minutes >= 60 {
        return Err(invalid());
    }
    let total = hours * 60 + minutes;
    if total > MINUTES_PER_DAY {
        return Err(invalid());
    }
    Ok(total)
}

/// Format a minute-of-day as `HH:MM`.
pub fn format_clock(minute: u32) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

mod clock {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(minute: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_clock(*minute))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_clock(&raw).map_err(serde::de::Error::custom)
    }
}

/// A half-open `[start, end)` range of minutes within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: u32,
    pub end: u32,
}

impl TimeWindow {
    pub fn new(start: u32, end: u32) -> Result<Self, ValidationError> {
        if end <= start || end > MINUTES_PER_DAY {
            return Err(ValidationError::InvalidTimeRange {
                start: format_clock(start),
                end: format_clock(end),
            });
        }
        Ok(Self { start, end })
    }

    pub fn duration_minutes(&self) -> u32 {
        self.end - self.start
    }

    /// Whether `[start, end)` lies entirely inside this window.
    pub fn contains(&self, start: u32, end: u32) -> bool {
        start >= self.start && end <= self.end && start < end
    }
}

/// Daily working hours plus the weekdays they apply to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    #[serde(with = "clock")]
    pub start: u32,
    #[serde(with = "clock")]
    pub end: u32,
    pub work_days: Vec<Weekday>,
}

impl WorkingHours {
    pub fn new(start: u32, end: u32, work_days: Vec<Weekday>) -> Result<Self, ValidationError> {
        TimeWindow::new(start, end)?;
        Ok(Self {
            start,
            end,
            work_days,
        })
    }

    /// Build from `HH:MM` strings.
    pub fn parse(start: &str, end: &str, work_days: Vec<Weekday>) -> Result<Self, ValidationError> {
        Self::new(parse_clock(start)?, parse_clock(end)?, work_days)
    }

    /// Same hours on every day of the week.
    pub fn every_day(start: u32, end: u32) -> Result<Self, ValidationError> {
        Self::new(
            start,
            end,
            vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
                Weekday::Sun,
            ],
        )
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        TimeWindow::new(self.start, self.end).map(|_| ())
    }

    pub fn is_work_day(&self, date: NaiveDate) -> bool {
        self.work_days.contains(&date.weekday())
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start,
            end: self.end,
        }
    }

    /// The working window for `date`, or `None` on a day off.
    pub fn window_for(&self, date: NaiveDate) -> Option<TimeWindow> {
        self.is_work_day(date).then(|| self.window())
    }
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start: 9 * 60,
            end: 17 * 60,
            work_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
        }
    }
}

/// Inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvalidTimeRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// `days` consecutive dates starting at `start` (at least one).
    pub fn spanning(start: NaiveDate, days: u32) -> Self {
        let extra = i64::from(days.max(1) - 1);
        Self {
            start,
            end: start + Duration::days(extra),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn len_days(&self) -> u32 {
        ((self.end - self.start).num_days() + 1) as u32
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}
