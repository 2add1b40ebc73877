//! Hedged Straddle Engine
//!
//! Order-state engine for a hedged short straddle on index options: four
//! correlated legs per entry, stop-losses from a time-of-day table, stop
//! synchronization between the paired shorts, and a strategy phase that only
//! moves once every in-flight order operation has settled.
//!
//! The engine talks to the outside world through the [`oms::Broker`] and
//! [`oms::MarketFeed`] traits; [`oms::PaperVenue`] implements both in memory.

pub mod calendar;
pub mod config;
pub mod data;
pub mod driver;
pub mod oms;
pub mod pricing;
pub mod reporting;
pub mod schedule;
pub mod strategy;
pub mod types;

pub use config::Config;
pub use types::*;
