//! Broker and feed capabilities consumed by the strategy
//!
//! The strategy never matches orders itself. It submits through [`Broker`],
//! reads prices and the session clock through [`MarketFeed`], and reacts to
//! [`BrokerEvent`]s delivered later, in any order.

use chrono::{NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::oms::types::{Leg, LegId};
use crate::{Money, OptionType, Side, Symbol};

/// Broker-side failures
#[derive(Debug, Error, PartialEq)]
pub enum BrokerError {
    #[error("unknown leg {0}")]
    UnknownLeg(LegId),

    #[error("unknown underlying '{0}'")]
    UnknownUnderlying(String),

    #[error("leg {0} is not open")]
    LegNotOpen(LegId),

    #[error("leg {0} already has a working exit order")]
    ExitAlreadyActive(LegId),

    #[error("leg {0} has no working exit order")]
    NoActiveExit(LegId),

    #[error("order rejected: {0}")]
    Rejected(String),
}

pub type BrokerResult<T> = Result<T, BrokerError>;

/// Underlying metadata used to build option chains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnderlyingDetails {
    /// Underlying name as used in option symbols (e.g. "NIFTY")
    pub name: String,
    /// Index instrument whose last price sets the ATM strike (e.g. "NIFTY 50")
    pub index: String,
    pub strike_difference: i64,
    pub lot_size: u32,
    /// Weekday of the weekly expiry
    pub expiry_weekday: Weekday,
}

/// Asynchronous order callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BrokerEvent {
    EntryConfirmed(LegId),
    EntryCanceled(LegId),
    ExitConfirmed(LegId),
    ExitCanceled(LegId),
}

impl BrokerEvent {
    pub fn leg(&self) -> LegId {
        match *self {
            BrokerEvent::EntryConfirmed(leg)
            | BrokerEvent::EntryCanceled(leg)
            | BrokerEvent::ExitConfirmed(leg)
            | BrokerEvent::ExitCanceled(leg) => leg,
        }
    }

    /// Entry fill, entry cancel and exit fill happen at most once per leg
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BrokerEvent::ExitCanceled(_))
    }
}

/// Order submission and leg queries
pub trait Broker {
    fn underlying_details(&self, underlying: &str) -> BrokerResult<UnderlyingDetails>;

    fn option_symbol(
        &self,
        underlying: &str,
        expiry: NaiveDate,
        strike: i64,
        option_type: OptionType,
    ) -> BrokerResult<Symbol>;

    /// Submit a limit entry; the leg opens when `EntryConfirmed` arrives
    fn enter_limit(
        &mut self,
        symbol: &Symbol,
        side: Side,
        limit_price: Money,
        quantity: u32,
    ) -> BrokerResult<LegId>;

    fn exit_stop_limit(&mut self, leg: LegId, trigger: Money, limit: Money) -> BrokerResult<()>;

    fn exit_limit(&mut self, leg: LegId, price: Money) -> BrokerResult<()>;

    /// Request cancellation of the working exit; confirmed by `ExitCanceled`
    fn cancel_exit(&mut self, leg: LegId) -> BrokerResult<()>;

    fn leg(&self, leg: LegId) -> Option<&Leg>;

    fn legs(&self) -> Vec<&Leg>;

    fn active_legs(&self) -> Vec<&Leg> {
        self.legs().into_iter().filter(|leg| leg.is_active()).collect()
    }

    fn closed_legs(&self) -> Vec<&Leg> {
        self.legs().into_iter().filter(|leg| leg.is_closed()).collect()
    }
}

/// Session clock and last traded prices
pub trait MarketFeed {
    fn current_datetime(&self) -> NaiveDateTime;

    fn last_price(&self, symbol: &Symbol) -> Option<Money>;
}

/// Everything the strategy talks to
pub trait Venue: Broker + MarketFeed {}

impl<T: Broker + MarketFeed> Venue for T {}
