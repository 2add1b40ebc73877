//! Core OMS types
//!
//! A leg is one option position: the entry order that opens it and the exit
//! order (limit or stop-limit) that closes it. Legs are owned by the broker;
//! the strategy only keeps their `LegId`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{Money, Side, Symbol};

/// Broker-assigned leg identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LegId(pub u64);

impl std::fmt::Display for LegId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Order state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    /// Accepted and working
    Open,

    /// Cancel requested, not yet confirmed by the broker
    PendingCancel,

    /// Completely filled
    Filled,

    /// Cancel confirmed
    Cancelled,

    /// Rejected by the broker
    Rejected,
}

impl OrderState {
    /// Working at the broker (including while a cancel is in flight)
    pub fn is_active(&self) -> bool {
        matches!(self, OrderState::Open | OrderState::PendingCancel)
    }

    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            OrderState::Filled | OrderState::Cancelled | OrderState::Rejected
        )
    }
}

/// Exit order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitKind {
    /// Limit exit (market-protected exits are limits)
    Limit { price: Money },

    /// Stop-limit: becomes a limit at `limit` once `trigger` trades
    StopLimit {
        trigger: Money,
        limit: Money,
        triggered: bool,
    },
}

/// Exit order attached to a leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitOrder {
    pub kind: ExitKind,
    pub state: OrderState,
}

/// One option position within a multi-leg group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leg {
    pub id: LegId,
    pub symbol: Symbol,
    /// Side of the entry order
    pub side: Side,
    pub quantity: u32,
    pub entry_limit: Money,
    pub entry_state: OrderState,
    pub entry_price: Option<Money>,
    pub exit: Option<ExitOrder>,
    pub exit_price: Option<Money>,
    pub opened_at: Option<NaiveDateTime>,
    pub closed_at: Option<NaiveDateTime>,
}

impl Leg {
    pub fn new(id: LegId, symbol: Symbol, side: Side, quantity: u32, entry_limit: Money) -> Self {
        Self {
            id,
            symbol,
            side,
            quantity,
            entry_limit,
            entry_state: OrderState::Open,
            entry_price: None,
            exit: None,
            exit_price: None,
            opened_at: None,
            closed_at: None,
        }
    }

    pub fn entry_filled(&self) -> bool {
        self.entry_state == OrderState::Filled
    }

    pub fn exit_active(&self) -> bool {
        self.exit.is_some_and(|exit| exit.state.is_active())
    }

    pub fn exit_filled(&self) -> bool {
        self.exit.is_some_and(|exit| exit.state == OrderState::Filled)
    }

    /// Entry filled and not yet exited
    pub fn is_active(&self) -> bool {
        self.entry_filled() && !self.exit_filled()
    }

    pub fn is_closed(&self) -> bool {
        self.entry_filled() && self.exit_filled()
    }

    /// Side of the order that closes this leg
    pub fn exit_side(&self) -> Side {
        self.side.opposite()
    }

    /// Realized PnL once both orders have filled
    pub fn realized_pnl(&self) -> Option<Money> {
        let entry = self.entry_price?;
        let exit = self.exit_price?;
        Some(signed_pnl(self.side, entry, exit, self.quantity))
    }

    /// Mark-to-market PnL of an open leg
    pub fn unrealized_pnl(&self, mark: Money) -> Option<Money> {
        if !self.is_active() {
            return None;
        }
        let entry = self.entry_price?;
        Some(signed_pnl(self.side, entry, mark, self.quantity))
    }
}

fn signed_pnl(side: Side, entry: Money, exit: Money, quantity: u32) -> Money {
    let qty = Money::from_i64(i64::from(quantity));
    match side {
        Side::Buy => (exit - entry) * qty,
        Side::Sell => (entry - exit) * qty,
    }
}
