//! Time/Day authority (C1).
//!
//! Every filter of "today's games" uses the ET day window
//! `[start_of_day_ET, start_of_day_ET + 24h)`, end-exclusive. No naive
//! timestamp crosses a function boundary here; everything is `DateTime<Utc>`
//! in and `DateTime<Tz>` at the ET boundary.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use chrono_tz::America::New_York;
use chrono_tz::Tz;
use std::time::Instant;

pub const ET: Tz = New_York;

/// Snapshot taken at process start so a clock failure can fall back to a
/// monotonic read plus this last-known wall-clock offset.
#[derive(Debug, Clone, Copy)]
pub struct ClockAnchor {
    wall_clock_at_start: DateTime<Utc>,
    monotonic_at_start: Instant,
}

impl ClockAnchor {
    pub fn new() -> Self {
        Self {
            wall_clock_at_start: Utc::now(),
            monotonic_at_start: Instant::now(),
        }
    }

    /// Best-effort "now". Returns `(timestamp, degraded)` — `degraded` is
    /// true only in the fallback branch, which activates when the wall
    /// clock cannot be read (modeled here via `force_fallback` for tests;
    /// in production this always takes the live `Utc::now()` path).
    pub fn now(&self, force_fallback: bool) -> (DateTime<Utc>, bool) {
        if force_fallback {
            let elapsed = self.monotonic_at_start.elapsed();
            (
                self.wall_clock_at_start + ChronoDuration::from_std(elapsed).unwrap_or_default(),
                true,
            )
        } else {
            (Utc::now(), false)
        }
    }
}

impl Default for ClockAnchor {
    fn default() -> Self {
        Self::new()
    }
}

/// Today's date in ET, as a plain calendar date.
pub fn today_et() -> NaiveDate {
    Utc::now().with_timezone(&ET).date_naive()
}

/// `[start_of_day_ET, start_of_day_ET + 24h)` for the given ET calendar
/// date, expressed in UTC so callers can compare against UTC-stored
/// timestamps without re-deriving the zone conversion themselves.
pub fn day_bounds_et(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start_naive = date.and_hms_opt(0, 0, 0).expect("valid midnight");
    let start_et = ET
        .from_local_datetime(&start_naive)
        .single()
        .unwrap_or_else(|| ET.from_utc_datetime(&start_naive));
    let start_utc = start_et.with_timezone(&Utc);
    let end_utc = start_utc + ChronoDuration::days(1);
    (start_utc, end_utc)
}

/// True iff `ts` falls within `[D 00:00 ET, D+1 00:00 ET)`, end-exclusive.
pub fn is_within_day(ts: DateTime<Utc>, date: NaiveDate) -> bool {
    let (start, end) = day_bounds_et(date);
    ts >= start && ts < end
}

/// Render a UTC timestamp as an ET display string for output payloads.
pub fn to_et_display(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&ET).format("%Y-%m-%d %H:%M:%S %Z").to_string()
}

/// Parse a `YYYY-MM-DD` ET calendar date, the shape accepted by the
/// `best-bets` request when the caller wants an explicit day rather than
/// "now in ET".
pub fn parse_et_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn day_bounds_are_24h_end_exclusive() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let (start, end) = day_bounds_et(date);
        assert_eq!((end - start).num_hours(), 24);
    }

    #[test]
    fn scenario_et_filter_boundary() {
        // Game at 2026-03-15 23:30 ET is inside the day; 2026-03-16 00:15 ET is not.
        let date = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let inside = ET
            .with_ymd_and_hms(2026, 3, 15, 23, 30, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc);
        let outside = ET
            .with_ymd_and_hms(2026, 3, 16, 0, 15, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc);
        assert!(is_within_day(inside, date));
        assert!(!is_within_day(outside, date));
    }

    #[test]
    fn clock_anchor_fallback_is_flagged_degraded() {
        let anchor = ClockAnchor::new();
        let (_, degraded_live) = anchor.now(false);
        let (_, degraded_fallback) = anchor.now(true);
        assert!(!degraded_live);
        assert!(degraded_fallback);
    }
}
