//! Session calendar helpers
//!
//! Minute-bucket rounding, the bar clock that fires the entry trigger, the
//! reporting clock, and weekly expiry resolution.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};

/// Round `dt` down to a multiple of `interval_minutes` past the hour, dropping seconds.
pub fn round_down(dt: NaiveDateTime, interval_minutes: u32) -> NaiveDateTime {
    let interval = interval_minutes.max(1);
    let elapsed = dt.minute() % interval;
    let time = NaiveTime::from_hms_opt(dt.hour(), dt.minute() - elapsed, 0).unwrap_or(dt.time());
    dt.date().and_time(time)
}

/// Nearest weekly expiry on or after `date`.
///
/// Exchange holidays are not modelled.
pub fn nearest_weekly_expiry(date: NaiveDate, expiry_weekday: Weekday) -> NaiveDate {
    let today = date.weekday().num_days_from_monday() as i64;
    let target = expiry_weekday.num_days_from_monday() as i64;
    let ahead = (target - today).rem_euclid(7);
    date + Duration::days(ahead)
}

/// Detects completed resampled bars from a stream of timestamps.
///
/// A bar completes when the first timestamp of the next bucket arrives.
#[derive(Debug, Clone)]
pub struct BarClock {
    interval_minutes: u32,
    current: Option<NaiveDateTime>,
}

impl BarClock {
    pub fn new(interval_minutes: u32) -> Self {
        Self {
            interval_minutes: interval_minutes.max(1),
            current: None,
        }
    }

    /// Returns true when `now` starts a new bucket after a previous one
    pub fn observe(&mut self, now: NaiveDateTime) -> bool {
        let bucket = round_down(now, self.interval_minutes);
        match self.current {
            None => {
                self.current = Some(bucket);
                false
            }
            Some(current) if bucket > current => {
                self.current = Some(bucket);
                true
            }
            _ => false,
        }
    }
}

/// Periodic reporting clock aligned to wall-clock multiples of the interval.
///
/// The next report is due at the rounded-down time of the last one plus the
/// interval, so a report sent at 10:07 makes the next one due at 10:15.
#[derive(Debug, Clone)]
pub struct InfoClock {
    interval_minutes: u32,
    last_sent: Option<NaiveDateTime>,
}

impl InfoClock {
    pub fn new(interval_minutes: u32) -> Self {
        Self {
            interval_minutes: interval_minutes.max(1),
            last_sent: None,
        }
    }

    /// Start counting from `now` without reporting
    pub fn reset(&mut self, now: NaiveDateTime) {
        self.last_sent = Some(now);
    }

    /// Returns true (and records `now`) when a report is due
    pub fn due(&mut self, now: NaiveDateTime) -> bool {
        let last = *self.last_sent.get_or_insert(now);
        let next = round_down(last, self.interval_minutes)
            + Duration::minutes(i64::from(self.interval_minutes));
        if now >= next {
            self.last_sent = Some(now);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 10, 16)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_round_down() {
        assert_eq!(round_down(dt(10, 7, 42), 15), dt(10, 0, 0));
        assert_eq!(round_down(dt(10, 15, 0), 15), dt(10, 15, 0));
        assert_eq!(round_down(dt(10, 59, 59), 1), dt(10, 59, 0));
    }

    #[test]
    fn test_nearest_weekly_expiry() {
        // 2023-10-16 is a Monday
        let monday = NaiveDate::from_ymd_opt(2023, 10, 16).unwrap();
        let thursday = NaiveDate::from_ymd_opt(2023, 10, 19).unwrap();
        assert_eq!(nearest_weekly_expiry(monday, Weekday::Thu), thursday);
        assert_eq!(nearest_weekly_expiry(thursday, Weekday::Thu), thursday);

        let friday = NaiveDate::from_ymd_opt(2023, 10, 20).unwrap();
        assert_eq!(
            nearest_weekly_expiry(friday, Weekday::Thu),
            NaiveDate::from_ymd_opt(2023, 10, 26).unwrap()
        );
    }

    #[test]
    fn test_bar_clock_fires_on_next_bucket() {
        let mut clock = BarClock::new(1);
        assert!(!clock.observe(dt(9, 16, 0)));
        assert!(!clock.observe(dt(9, 16, 30)));
        assert!(clock.observe(dt(9, 17, 5)));
        assert!(!clock.observe(dt(9, 17, 50)));
        assert!(clock.observe(dt(9, 20, 0)));
    }

    #[test]
    fn test_info_clock_aligns_to_interval() {
        let mut clock = InfoClock::new(15);
        clock.reset(dt(10, 7, 0));
        assert!(!clock.due(dt(10, 14, 59)));
        assert!(clock.due(dt(10, 15, 0)));
        assert!(!clock.due(dt(10, 29, 0)));
        assert!(clock.due(dt(10, 30, 10)));
    }

    #[test]
    fn test_info_clock_starts_on_first_call() {
        let mut clock = InfoClock::new(15);
        assert!(!clock.due(dt(9, 20, 0)));
        assert!(clock.due(dt(9, 30, 0)));
    }
}
