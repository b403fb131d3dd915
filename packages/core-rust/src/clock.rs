//! Wall-clock abstraction for timestamped credentials.
//!
//! WS-Security digest headers embed a `Created` timestamp, so the header builder
//! reads time through [`ClockSource`] rather than calling `SystemTime` directly.
//! Tests pin the clock with [`FixedClock`].

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::DateTime;

/// Format used for `wsu:Created`: UTC, second precision, literal `Z`.
pub const CREATED_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Abstraction over the system clock for dependency injection.
///
/// The default implementation ([`SystemClock`]) delegates to `std::time::SystemTime`.
pub trait ClockSource: Send + Sync {
    /// Returns the current time as milliseconds since Unix epoch.
    fn now(&self) -> u64;
}

/// Default clock source that reads the real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    #[allow(clippy::cast_possible_truncation)]
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    millis: u64,
}

impl FixedClock {
    #[must_use]
    pub fn at_millis(millis: u64) -> Self {
        Self { millis }
    }

    #[must_use]
    pub fn at_secs(secs: u64) -> Self {
        Self {
            millis: secs.saturating_mul(1000),
        }
    }
}

impl ClockSource for FixedClock {
    fn now(&self) -> u64 {
        self.millis
    }
}

/// Seconds since Unix epoch read from `clock`, shifted by `offset_secs`.
#[must_use]
pub fn adjusted_secs(clock: &dyn ClockSource, offset_secs: i64) -> i64 {
    let secs = i64::try_from(clock.now() / 1000).unwrap_or(i64::MAX);
    secs.saturating_add(offset_secs)
}

/// Formats Unix seconds as `YYYY-MM-DDTHH:MM:SSZ`.
///
/// Values outside chrono's representable range collapse to the Unix epoch.
#[must_use]
pub fn format_created(unix_secs: i64) -> String {
    DateTime::from_timestamp(unix_secs, 0)
        .unwrap_or_default()
        .format(CREATED_FORMAT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_returns_nonzero() {
        let clock = SystemClock;
        assert!(clock.now() > 0);
    }

    #[test]
    fn fixed_clock_is_frozen() {
        let clock = FixedClock::at_secs(1_700_000_000);
        assert_eq!(clock.now(), 1_700_000_000_000);
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn adjusted_secs_applies_negative_offset() {
        let clock = FixedClock::at_millis(1_700_000_000_999);
        assert_eq!(adjusted_secs(&clock, -80), 1_699_999_920);
    }

    #[test]
    fn adjusted_secs_applies_positive_offset() {
        let clock = FixedClock::at_secs(1_000);
        assert_eq!(adjusted_secs(&clock, 25), 1_025);
    }

    #[test]
    fn format_created_second_precision() {
        assert_eq!(format_created(1_700_000_000), "2023-11-14T22:13:20Z");
    }

    #[test]
    fn format_created_epoch() {
        assert_eq!(format_created(0), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn format_created_out_of_range_falls_back_to_epoch() {
        assert_eq!(format_created(i64::MAX), "1970-01-01T00:00:00Z");
    }
}
