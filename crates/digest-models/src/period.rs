//! Reporting windows.
//!
//! A `Period` is what the user asked for; a `DateWindow` is the concrete
//! half-open interval `[start, end)` it resolves to in the local offset.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest day count accepted for a rolling window.
pub const MAX_DAYS: u32 = 30;

/// Errors produced while resolving a period.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    /// Day count outside `1..=MAX_DAYS`.
    #[error("days must be between 1 and {MAX_DAYS}, got {0}")]
    InvalidDays(u32),

    /// Explicit range with `start >= end`.
    #[error("range start must be before end")]
    EmptyRange,

    /// Unrecognized period keyword.
    #[error("unknown period: {0}")]
    UnknownPeriod(String),

    /// Local midnight could not be represented.
    #[error("cannot resolve local midnight")]
    Midnight,
}

/// Requested reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Period {
    /// From local midnight until now. Never stable, so cached results age out.
    Today,
    /// The previous local calendar day.
    Yesterday,
    /// The last `n` whole local days, ending at today's midnight.
    Days { days: u32 },
    /// An explicit range.
    Range {
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    },
}

impl Period {
    /// Parses the `period` keyword used by the HTTP and chat surfaces.
    pub fn from_keyword(keyword: &str) -> Result<Self, PeriodError> {
        match keyword.trim() {
            "today" => Ok(Period::Today),
            "yesterday" => Ok(Period::Yesterday),
            other => Err(PeriodError::UnknownPeriod(other.to_string())),
        }
    }

    /// Builds a rolling window of `days` whole days.
    pub fn days(days: u32) -> Result<Self, PeriodError> {
        if days == 0 || days > MAX_DAYS {
            return Err(PeriodError::InvalidDays(days));
        }
        Ok(Period::Days { days })
    }

    /// Whether the period is still growing. Only `Today` is.
    pub fn is_live(&self) -> bool {
        matches!(self, Period::Today)
    }

    /// Resolves the period against `now` in the given local offset.
    pub fn window(&self, now: DateTime<Utc>, offset: FixedOffset) -> Result<DateWindow, PeriodError> {
        let local_now = now.with_timezone(&offset);
        let midnight = offset
            .from_local_datetime(&local_now.date_naive().and_time(NaiveTime::MIN))
            .single()
            .ok_or(PeriodError::Midnight)?;

        let (start, end) = match *self {
            Period::Today => (midnight, local_now),
            Period::Yesterday => (midnight - Duration::days(1), midnight),
            Period::Days { days } => {
                if days == 0 || days > MAX_DAYS {
                    return Err(PeriodError::InvalidDays(days));
                }
                (midnight - Duration::days(i64::from(days)), midnight)
            }
            Period::Range { start, end } => {
                if start >= end {
                    return Err(PeriodError::EmptyRange);
                }
                (start.with_timezone(&offset), end.with_timezone(&offset))
            }
        };

        Ok(DateWindow {
            period: *self,
            start,
            end,
        })
    }

    /// Short human label.
    pub fn label(&self) -> String {
        match self {
            Period::Today => "today".to_string(),
            Period::Yesterday => "yesterday".to_string(),
            Period::Days { days } => format!("last {} days", days),
            Period::Range { start, end } => format!(
                "{} - {}",
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            ),
        }
    }
}

/// A resolved half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    /// Period the window was resolved from.
    pub period: Period,
    /// Inclusive start.
    pub start: DateTime<FixedOffset>,
    /// Exclusive end.
    pub end: DateTime<FixedOffset>,
}

impl DateWindow {
    /// Whether `ts` falls within the window.
    pub fn contains(&self, ts: &DateTime<FixedOffset>) -> bool {
        *ts >= self.start && *ts < self.end
    }

    /// Whether the window covers more than one calendar day.
    pub fn spans_multiple_days(&self) -> bool {
        self.end - self.start > Duration::days(1)
    }
}
