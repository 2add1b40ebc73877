//! Configuration management
//!
//! Loads the strategy's JSON configuration file. Every section except
//! `underlying` has defaults, so a minimal file only names the underlying.

use anyhow::{Context, Result};
use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::oms::UnderlyingDetails;
use crate::schedule::{default_schedule_entries, ScheduleEntry, ScheduleError, StopLossSchedule};

/// Configuration validation errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("lots must be >= 1")]
    ZeroLots,

    #[error("tick size must be positive, got {0}")]
    NonPositiveTick(f64),

    #[error("{name} must be >= 0, got {value}")]
    NegativePercentage { name: &'static str, value: f64 },

    #[error("max_entries must be >= 1")]
    ZeroMaxEntries,

    #[error("session times must satisfy market_start < exit_time < market_end")]
    SessionOrder,

    #[error("{0} interval must be >= 1 minute")]
    ZeroInterval(&'static str),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub underlying: UnderlyingConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub orders: OrderConfig,
    #[serde(default)]
    pub stop_loss: StopLossConfig,
    /// Underlying metadata served by the paper venue
    #[serde(default = "default_instruments")]
    pub instruments: Vec<UnderlyingDetails>,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        // Allow the position size to be overridden per deployment
        if let Ok(lots) = std::env::var("STRADDLE_LOTS") {
            config.underlying.lots = lots
                .parse()
                .with_context(|| format!("Invalid STRADDLE_LOTS value '{}'", lots))?;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Check every value the engine relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.underlying.lots == 0 {
            return Err(ConfigError::ZeroLots);
        }
        if self.orders.tick_size.is_nan() || self.orders.tick_size <= 0.0 {
            return Err(ConfigError::NonPositiveTick(self.orders.tick_size));
        }
        for (name, value) in [
            ("market_protection_pct", self.orders.market_protection_pct),
            ("stop_limit_buffer_pct", self.orders.stop_limit_buffer_pct),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(ConfigError::NegativePercentage { name, value });
            }
        }
        if self.orders.max_entries == 0 {
            return Err(ConfigError::ZeroMaxEntries);
        }

        let s = &self.session;
        if !(s.market_start < s.exit_time && s.exit_time < s.market_end) {
            return Err(ConfigError::SessionOrder);
        }
        if s.info_interval_minutes == 0 {
            return Err(ConfigError::ZeroInterval("info"));
        }
        if s.entry_interval_minutes == 0 {
            return Err(ConfigError::ZeroInterval("entry"));
        }

        self.stop_loss_schedule()?;
        Ok(())
    }

    /// Build the validated stop-loss schedule
    pub fn stop_loss_schedule(&self) -> Result<StopLossSchedule, ScheduleError> {
        StopLossSchedule::new(&self.stop_loss.schedule, self.stop_loss.default_pct)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            underlying: UnderlyingConfig::default(),
            session: SessionConfig::default(),
            orders: OrderConfig::default(),
            stop_loss: StopLossConfig::default(),
            instruments: default_instruments(),
        }
    }
}

/// Underlying to trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnderlyingConfig {
    pub name: String,
    #[serde(default = "default_lots")]
    pub lots: u32,
}

fn default_lots() -> u32 {
    1
}

impl Default for UnderlyingConfig {
    fn default() -> Self {
        UnderlyingConfig {
            name: "NIFTY".to_string(),
            lots: 1,
        }
    }
}

/// Market session times (exchange local time)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    #[serde(with = "hhmm")]
    pub market_start: NaiveTime,
    #[serde(with = "hhmm")]
    pub market_end: NaiveTime,
    /// Deadline after which open legs are squared off
    #[serde(with = "hhmm")]
    pub exit_time: NaiveTime,
    pub info_interval_minutes: u32,
    pub entry_interval_minutes: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            market_start: hm(9, 15),
            market_end: hm(15, 30),
            exit_time: hm(15, 24),
            info_interval_minutes: 15,
            entry_interval_minutes: 1,
        }
    }
}

/// What to do with a group whose entry could not place all four legs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialEntryPolicy {
    /// Keep whatever legs were placed
    #[default]
    Keep,
    /// Exit every placed leg as soon as its entry fills
    Unwind,
}

/// Order placement parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderConfig {
    pub market_protection_pct: f64,
    pub stop_limit_buffer_pct: f64,
    pub tick_size: f64,
    pub max_entries: usize,
    /// Hedge strikes sit this many strike increments away from ATM
    pub hedge_strikes_away: i64,
    pub partial_entry_policy: PartialEntryPolicy,
}

impl Default for OrderConfig {
    fn default() -> Self {
        OrderConfig {
            market_protection_pct: 15.0,
            stop_limit_buffer_pct: 15.0,
            tick_size: 0.05,
            max_entries: 3,
            hedge_strikes_away: 8,
            partial_entry_policy: PartialEntryPolicy::Keep,
        }
    }
}

/// Stop-loss table for short legs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StopLossConfig {
    pub default_pct: f64,
    pub schedule: Vec<ScheduleEntry>,
}

impl Default for StopLossConfig {
    fn default() -> Self {
        StopLossConfig {
            default_pct: 20.0,
            schedule: default_schedule_entries(),
        }
    }
}

fn default_instruments() -> Vec<UnderlyingDetails> {
    vec![
        UnderlyingDetails {
            name: "NIFTY".to_string(),
            index: "NIFTY 50".to_string(),
            strike_difference: 50,
            lot_size: 50,
            expiry_weekday: Weekday::Thu,
        },
        UnderlyingDetails {
            name: "BANKNIFTY".to_string(),
            index: "NIFTY BANK".to_string(),
            strike_difference: 100,
            lot_size: 15,
            expiry_weekday: Weekday::Wed,
        },
        UnderlyingDetails {
            name: "FINNIFTY".to_string(),
            index: "NIFTY FIN SERVICE".to_string(),
            strike_difference: 50,
            lot_size: 40,
            expiry_weekday: Weekday::Tue,
        },
    ]
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// Serde for "HH:MM" (or "HH:MM:SS") times
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M:%S"))
            .map_err(|e| serde::de::Error::custom(format!("invalid time '{}': {}", s, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"underlying": {"name": "BANKNIFTY"}}"#).unwrap();
        assert_eq!(config.underlying.lots, 1);
        assert_eq!(config.orders.max_entries, 3);
        assert_eq!(config.orders.hedge_strikes_away, 8);
        assert_eq!(config.session.exit_time, hm(15, 24));
        assert_eq!(config.stop_loss.schedule.len(), 23);
        assert_eq!(config.instruments.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_sections() {
        let json = r#"{
            "underlying": {"name": "NIFTY", "lots": 2},
            "session": {"market_start": "09:15", "market_end": "15:30", "exit_time": "15:10:00",
                        "info_interval_minutes": 5, "entry_interval_minutes": 3},
            "orders": {"tick_size": 0.1, "partial_entry_policy": "unwind"},
            "stop_loss": {"default_pct": 25, "schedule": [{"time": "09:30", "pct": 30}]}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.underlying.lots, 2);
        assert_eq!(config.session.exit_time, hm(15, 10));
        assert_eq!(config.session.entry_interval_minutes, 3);
        assert_eq!(config.orders.partial_entry_policy, PartialEntryPolicy::Unwind);
        assert_eq!(config.orders.market_protection_pct, 15.0);

        let schedule = config.stop_loss_schedule().unwrap();
        assert_eq!(schedule.stop_loss_pct(hm(9, 31)), 30.0);
        assert_eq!(schedule.stop_loss_pct(hm(9, 30)), 25.0);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.orders.tick_size = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveTick(0.0)));

        let mut config = Config::default();
        config.session.exit_time = hm(15, 45);
        assert_eq!(config.validate(), Err(ConfigError::SessionOrder));

        let mut config = Config::default();
        config.orders.stop_limit_buffer_pct = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NegativePercentage { name: "stop_limit_buffer_pct", .. })
        ));

        let mut config = Config::default();
        config.stop_loss.schedule = vec![ScheduleEntry::new(10, 0, 40.0), ScheduleEntry::new(9, 0, 40.0)];
        assert!(matches!(config.validate(), Err(ConfigError::Schedule(_))));
    }

    #[test]
    fn test_time_serde_round_trip_format() {
        let json = serde_json::to_string(&SessionConfig::default()).unwrap();
        assert!(json.contains(r#""exit_time":"15:24""#));
    }
}
