//! Timestamp value object for immutable points in time.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from a DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the inner DateTime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Checks if this timestamp is before another.
    pub fn is_before(&self, other: &Timestamp) -> bool {
        self.0 < other.0
    }

    /// Checks if this timestamp is after another.
    pub fn is_after(&self, other: &Timestamp) -> bool {
        self.0 > other.0
    }

    /// Adds `days`, or `None` when the result leaves the representable range.
    ///
    /// Negative values subtract days.
    pub fn checked_add_days(&self, days: i64) -> Option<Self> {
        Duration::try_days(days)
            .and_then(|d| self.0.checked_add_signed(d))
            .map(Self)
    }

    /// Adds `days`, clamping at the representable range.
    pub fn add_days(&self, days: i64) -> Self {
        self.checked_add_days(days)
            .unwrap_or_else(|| Self::saturated(days < 0))
    }

    pub fn add_hours(&self, hours: i64) -> Self {
        Duration::try_hours(hours)
            .and_then(|d| self.0.checked_add_signed(d))
            .map(Self)
            .unwrap_or_else(|| Self::saturated(hours < 0))
    }

    fn saturated(backwards: bool) -> Self {
        if backwards {
            Self(DateTime::<Utc>::MIN_UTC)
        } else {
            Self(DateTime::<Utc>::MAX_UTC)
        }
    }

    /// Midnight (00:00:00 UTC) of this timestamp's calendar day.
    pub fn start_of_day(&self) -> Self {
        Self(self.0.date_naive().and_time(NaiveTime::MIN).and_utc())
    }

    /// Number of calendar days from this timestamp's date to `later`'s date.
    ///
    /// Times of day are ignored, so 23:59 today and 00:01 tomorrow are one
    /// day apart. Negative when `later` falls on an earlier date.
    pub fn whole_days_until(&self, later: &Timestamp) -> i64 {
        (later.0.date_naive() - self.0.date_naive()).num_days()
    }

    /// Formats the date part as `DD.MM.YYYY`.
    pub fn format_date(&self) -> String {
        self.0.format("%d.%m.%Y").to_string()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}
