//! Calendar-date normalization in a fixed reference timezone.
//!
//! Every comparison in the reporting pipeline is date-only. Stored timestamps
//! that carry an offset are converted into the reference zone with real
//! timezone-database rules (so EST and EDT are both handled); naive timestamps
//! are already local wall-clock values and keep their calendar date.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

const NAIVE_DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

// Offsets written without a colon, as Postgres text exports do ("+00", "+0000").
const OFFSET_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceZone(Tz);

impl ReferenceZone {
    pub fn new(tz: Tz) -> Self {
        ReferenceZone(tz)
    }

    pub fn tz(&self) -> Tz {
        self.0
    }

    /// Calendar date of a stored timestamp in this zone, or `None` if the
    /// value cannot be parsed.
    pub fn to_calendar_date(&self, raw: &str) -> Option<NaiveDate> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&self.0).date_naive());
        }
        for pattern in OFFSET_DATETIME_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(s, pattern) {
                return Some(dt.with_timezone(&self.0).date_naive());
            }
        }
        for pattern in NAIVE_DATETIME_FORMATS {
            if let Ok(ndt) = NaiveDateTime::parse_from_str(s, pattern) {
                return Some(ndt.date());
            }
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
    }
}

impl Default for ReferenceZone {
    fn default() -> Self {
        ReferenceZone(chrono_tz::America::New_York)
    }
}

impl FromStr for ReferenceZone {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<Tz>()
            .map(ReferenceZone)
            .map_err(|e| ConfigError::InvalidTimezone {
                name: s.to_string(),
                reason: e.to_string(),
            })
    }
}

impl fmt::Display for ReferenceZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.name())
    }
}

/// Inclusive calendar-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateWindow {
    /// Reversed bounds are swapped rather than producing an empty window.
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        if from <= to {
            DateWindow { from, to }
        } else {
            DateWindow { from: to, to: from }
        }
    }

    pub fn single_day(day: NaiveDate) -> Self {
        DateWindow { from: day, to: day }
    }

    /// `n` days ending on `end` (inclusive). `n == 0` is treated as one day.
    pub fn last_n_days(end: NaiveDate, n: u32) -> Self {
        let back = u64::from(n.max(1) - 1);
        let from = end.checked_sub_days(Days::new(back)).unwrap_or(end);
        DateWindow { from, to: end }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.from <= day && day <= self.to
    }

    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    pub fn iter_days(&self) -> impl Iterator<Item = NaiveDate> {
        let to = self.to;
        std::iter::successors(Some(self.from), move |d| d.succ_opt().filter(|n| *n <= to))
    }

    /// Window of equal length ending the day before this one starts.
    pub fn preceding(&self) -> Self {
        let len = self.days() as u64;
        let to = self.from.pred_opt().unwrap_or(self.from);
        let from = self.from.checked_sub_days(Days::new(len)).unwrap_or(to);
        DateWindow { from, to }
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.from.format("%Y-%m-%d"), self.to.format("%Y-%m-%d"))
    }
}
