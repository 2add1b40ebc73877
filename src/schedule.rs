//! Stop-loss schedule
//!
//! Time-of-day table mapping the moment a short leg is filled to the
//! stop-loss percentage placed on it. The table is configuration, validated
//! once at construction and immutable afterwards.

use chrono::NaiveTime;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Schedule validation errors
#[derive(Debug, Error, PartialEq)]
pub enum ScheduleError {
    #[error("schedule times must be strictly increasing: {previous} is followed by {next}")]
    NotIncreasing { previous: NaiveTime, next: NaiveTime },

    #[error("stop-loss percentage at {time} must be >= 0, got {pct}")]
    NegativePercentage { time: NaiveTime, pct: f64 },

    #[error("default stop-loss percentage must be >= 0, got {0}")]
    NegativeDefault(f64),
}

/// One row of the schedule as written in configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    #[serde(with = "crate::config::hhmm")]
    pub time: NaiveTime,
    pub pct: f64,
}

impl ScheduleEntry {
    pub fn new(hour: u32, minute: u32, pct: f64) -> Self {
        Self {
            time: NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN),
            pct,
        }
    }
}

/// Validated stop-loss lookup table
#[derive(Debug, Clone)]
pub struct StopLossSchedule {
    table: BTreeMap<NaiveTime, f64>,
    default_pct: f64,
}

impl StopLossSchedule {
    /// Build from rows given in ascending time order
    pub fn new(entries: &[ScheduleEntry], default_pct: f64) -> Result<Self, ScheduleError> {
        if default_pct.is_nan() || default_pct < 0.0 {
            return Err(ScheduleError::NegativeDefault(default_pct));
        }

        if let Some((previous, next)) = entries
            .iter()
            .tuple_windows()
            .find(|(a, b)| a.time >= b.time)
        {
            return Err(ScheduleError::NotIncreasing {
                previous: previous.time,
                next: next.time,
            });
        }

        if let Some(bad) = entries.iter().find(|e| e.pct.is_nan() || e.pct < 0.0) {
            return Err(ScheduleError::NegativePercentage {
                time: bad.time,
                pct: bad.pct,
            });
        }

        Ok(Self {
            table: entries.iter().map(|e| (e.time, e.pct)).collect(),
            default_pct,
        })
    }

    /// Percentage of the latest row strictly before `time`, or the default.
    pub fn stop_loss_pct(&self, time: NaiveTime) -> f64 {
        self.table
            .range(..time)
            .next_back()
            .map(|(_, pct)| *pct)
            .unwrap_or(self.default_pct)
    }

    pub fn default_pct(&self) -> f64 {
        self.default_pct
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Rows in ascending time order
    pub fn entries(&self) -> impl Iterator<Item = ScheduleEntry> + '_ {
        self.table
            .iter()
            .map(|(time, pct)| ScheduleEntry { time: *time, pct: *pct })
    }
}

/// Default intraday table: 40% through the morning, widening to 100% after 14:00.
pub fn default_schedule_entries() -> Vec<ScheduleEntry> {
    vec![
        ScheduleEntry::new(9, 15, 40.0),
        ScheduleEntry::new(9, 30, 40.0),
        ScheduleEntry::new(9, 45, 40.0),
        ScheduleEntry::new(10, 0, 40.0),
        ScheduleEntry::new(10, 15, 40.0),
        ScheduleEntry::new(10, 30, 45.0),
        ScheduleEntry::new(10, 45, 50.0),
        ScheduleEntry::new(11, 0, 50.0),
        ScheduleEntry::new(11, 15, 50.0),
        ScheduleEntry::new(11, 30, 50.0),
        ScheduleEntry::new(11, 45, 50.0),
        ScheduleEntry::new(12, 0, 50.0),
        ScheduleEntry::new(12, 15, 50.0),
        ScheduleEntry::new(12, 30, 50.0),
        ScheduleEntry::new(12, 45, 50.0),
        ScheduleEntry::new(13, 0, 60.0),
        ScheduleEntry::new(13, 15, 70.0),
        ScheduleEntry::new(13, 30, 80.0),
        ScheduleEntry::new(13, 45, 90.0),
        ScheduleEntry::new(14, 0, 100.0),
        ScheduleEntry::new(14, 15, 100.0),
        ScheduleEntry::new(14, 30, 100.0),
        ScheduleEntry::new(14, 45, 100.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn default_schedule() -> StopLossSchedule {
        StopLossSchedule::new(&default_schedule_entries(), 20.0).unwrap()
    }

    #[test]
    fn test_default_before_first_row() {
        let schedule = default_schedule();
        assert_eq!(schedule.stop_loss_pct(t(9, 0)), 20.0);
    }

    #[test]
    fn test_exact_key_does_not_qualify() {
        let schedule = default_schedule();
        assert_eq!(schedule.stop_loss_pct(t(9, 15)), 20.0);
        assert_eq!(schedule.stop_loss_pct(t(10, 30)), 40.0);
        assert_eq!(schedule.stop_loss_pct(t(10, 45)), 45.0);
    }

    #[test]
    fn test_latest_row_before_time() {
        let schedule = default_schedule();
        assert_eq!(schedule.stop_loss_pct(t(9, 20)), 40.0);
        assert_eq!(schedule.stop_loss_pct(t(10, 31)), 45.0);
        assert_eq!(schedule.stop_loss_pct(t(13, 20)), 70.0);
        assert_eq!(schedule.stop_loss_pct(t(15, 0)), 100.0);
    }

    #[test]
    fn test_lookup_matches_linear_scan() {
        let schedule = default_schedule();
        let entries = default_schedule_entries();

        for minutes in (9 * 60)..(16 * 60) {
            let time = t(minutes / 60, minutes % 60);
            let expected = entries
                .iter()
                .filter(|e| e.time < time)
                .last()
                .map(|e| e.pct)
                .unwrap_or(20.0);
            assert_eq!(schedule.stop_loss_pct(time), expected, "at {}", time);
        }
    }

    #[test]
    fn test_empty_schedule_uses_default() {
        let schedule = StopLossSchedule::new(&[], 25.0).unwrap();
        assert!(schedule.is_empty());
        assert_eq!(schedule.stop_loss_pct(t(12, 0)), 25.0);
    }

    #[test]
    fn test_rejects_unordered_rows() {
        let rows = [ScheduleEntry::new(10, 0, 40.0), ScheduleEntry::new(9, 30, 40.0)];
        assert_eq!(
            StopLossSchedule::new(&rows, 20.0).unwrap_err(),
            ScheduleError::NotIncreasing {
                previous: t(10, 0),
                next: t(9, 30)
            }
        );
    }

    #[test]
    fn test_rejects_duplicate_rows() {
        let rows = [ScheduleEntry::new(10, 0, 40.0), ScheduleEntry::new(10, 0, 50.0)];
        assert!(StopLossSchedule::new(&rows, 20.0).is_err());
    }

    #[test]
    fn test_rejects_negative_values() {
        let rows = [ScheduleEntry::new(10, 0, -5.0)];
        assert!(matches!(
            StopLossSchedule::new(&rows, 20.0),
            Err(ScheduleError::NegativePercentage { .. })
        ));
        assert_eq!(
            StopLossSchedule::new(&[], -1.0).unwrap_err(),
            ScheduleError::NegativeDefault(-1.0)
        );
    }
}
