//! Time source and reference timezone.
//!
//! Instants travel as `DateTime<Utc>`. [`ReferenceZone`] is the only place that
//! converts them to local wall time, for date bucketing and report rendering.

use std::sync::Mutex;

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, SubsecRound, Utc};

use crate::error::{Result, TrackerError};

/// Date key format used for session buckets (`DD.MM.YYYY`).
pub const DATE_KEY_FORMAT: &str = "%d.%m.%Y";
const TIME_OF_DAY_FORMAT: &str = "%H:%M:%S";

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Fixed-offset timezone used for all date bucketing and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceZone {
    offset: FixedOffset,
}

impl ReferenceZone {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Parses `+HH:MM`, `-HH:MM`, `+HH`, or `Z`.
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
            return Ok(Self::utc());
        }

        let invalid = || TrackerError::InvalidUtcOffset(value.to_string());
        let (sign, rest) = match trimmed.as_bytes().first() {
            Some(b'+') => (1, &trimmed[1..]),
            Some(b'-') => (-1, &trimmed[1..]),
            _ => return Err(invalid()),
        };
        let (hours, minutes) = match rest.split_once(':') {
            Some((h, m)) => (h, m),
            None => (rest, "0"),
        };
        let hours: i32 = hours.parse().map_err(|_| invalid())?;
        let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
        if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
            return Err(invalid());
        }

        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(Self::new)
            .ok_or_else(invalid)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    /// Calendar date bucket for an instant, e.g. `19.10.2026`.
    pub fn date_key(&self, instant: DateTime<Utc>) -> String {
        self.local(instant).format(DATE_KEY_FORMAT).to_string()
    }

    pub fn time_of_day(&self, instant: DateTime<Utc>) -> String {
        self.local(instant).format(TIME_OF_DAY_FORMAT).to_string()
    }
}

impl Default for ReferenceZone {
    fn default() -> Self {
        Self::utc()
    }
}

pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, DATE_KEY_FORMAT).ok()
}
