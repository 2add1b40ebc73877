//! Session state
//!
//! Everything the strategy mutates during a trading day lives in
//! [`SessionContext`], so a session boundary is a single `reset()`.

use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt;

use crate::oms::{BrokerEvent, LegId, PendingOrderTracker};
use crate::{OptionType, Side};

/// Strategy-wide phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Flat, waiting for an entry trigger
    #[default]
    Live,
    /// Orders in flight; recomputed once the tracker drains
    PlacingOrders,
    /// Legs open and protected
    Entered,
    /// Closing every open leg
    SquaringOff,
    /// Done for the day
    Exited,
}

impl Phase {
    /// Phases that are recomputed once every pending operation settles
    pub fn is_transient(self) -> bool {
        matches!(self, Phase::PlacingOrders | Phase::SquaringOff)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Live => "LIVE",
            Phase::PlacingOrders => "PLACING_ORDERS",
            Phase::Entered => "ENTERED",
            Phase::SquaringOff => "SQUARING_OFF",
            Phase::Exited => "EXITED",
        };
        f.write_str(name)
    }
}

/// Position of a leg within a straddle group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegRole {
    CeHedge,
    PeHedge,
    CeShort,
    PeShort,
}

impl LegRole {
    /// Submission order: hedges before shorts
    pub const ALL: [LegRole; 4] = [
        LegRole::CeHedge,
        LegRole::PeHedge,
        LegRole::CeShort,
        LegRole::PeShort,
    ];

    pub fn option_type(self) -> OptionType {
        match self {
            LegRole::CeHedge | LegRole::CeShort => OptionType::Call,
            LegRole::PeHedge | LegRole::PeShort => OptionType::Put,
        }
    }

    /// Entry side: hedges are bought, shorts are sold
    pub fn side(self) -> Side {
        if self.is_short() {
            Side::Sell
        } else {
            Side::Buy
        }
    }

    pub fn is_short(self) -> bool {
        matches!(self, LegRole::CeShort | LegRole::PeShort)
    }
}

impl fmt::Display for LegRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LegRole::CeHedge => "ce_hedge",
            LegRole::PeHedge => "pe_hedge",
            LegRole::CeShort => "ce_short",
            LegRole::PeShort => "pe_short",
        };
        f.write_str(name)
    }
}

/// Four correlated legs around one ATM strike.
///
/// `None` marks a leg whose submission was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StraddleGroup {
    pub strike: i64,
    pub expiry: NaiveDate,
    pub ce_hedge: Option<LegId>,
    pub pe_hedge: Option<LegId>,
    pub ce_short: Option<LegId>,
    pub pe_short: Option<LegId>,
    /// Placed legs are exited as soon as they fill
    pub unwind: bool,
}

impl StraddleGroup {
    pub fn new(strike: i64, expiry: NaiveDate) -> Self {
        Self {
            strike,
            expiry,
            ce_hedge: None,
            pe_hedge: None,
            ce_short: None,
            pe_short: None,
            unwind: false,
        }
    }

    pub fn leg(&self, role: LegRole) -> Option<LegId> {
        match role {
            LegRole::CeHedge => self.ce_hedge,
            LegRole::PeHedge => self.pe_hedge,
            LegRole::CeShort => self.ce_short,
            LegRole::PeShort => self.pe_short,
        }
    }

    pub fn set_leg(&mut self, role: LegRole, leg: Option<LegId>) {
        let slot = match role {
            LegRole::CeHedge => &mut self.ce_hedge,
            LegRole::PeHedge => &mut self.pe_hedge,
            LegRole::CeShort => &mut self.ce_short,
            LegRole::PeShort => &mut self.pe_short,
        };
        *slot = leg;
    }

    /// Placed legs with their roles
    pub fn legs(&self) -> impl Iterator<Item = (LegRole, LegId)> + '_ {
        LegRole::ALL
            .into_iter()
            .filter_map(move |role| self.leg(role).map(|leg| (role, leg)))
    }

    pub fn role_of(&self, leg: LegId) -> Option<LegRole> {
        self.legs().find(|(_, id)| *id == leg).map(|(role, _)| role)
    }

    /// All four legs were placed
    pub fn is_complete(&self) -> bool {
        self.legs().count() == LegRole::ALL.len()
    }

    /// The other short leg, if `leg` is one of this group's shorts
    pub fn paired_short(&self, leg: LegId) -> Option<LegId> {
        match self.role_of(leg)? {
            LegRole::CeShort => self.pe_short,
            LegRole::PeShort => self.ce_short,
            _ => None,
        }
    }
}

/// Mutable state of one trading session
#[derive(Debug, Default)]
pub struct SessionContext {
    pub phase: Phase,
    pub tracker: PendingOrderTracker,
    pub groups: Vec<StraddleGroup>,
    /// Terminal events already handled
    delivered: HashSet<BrokerEvent>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to a fresh session: phase LIVE, no pending operations, no groups
    pub fn reset(&mut self) {
        self.phase = Phase::Live;
        self.tracker.clear();
        self.groups.clear();
        self.delivered.clear();
    }

    /// Record a terminal event. Returns false if it was already delivered.
    pub fn record_delivery(&mut self, event: BrokerEvent) -> bool {
        self.delivered.insert(event)
    }

    pub fn group_of(&self, leg: LegId) -> Option<&StraddleGroup> {
        self.groups.iter().find(|group| group.role_of(leg).is_some())
    }

    pub fn role_of(&self, leg: LegId) -> Option<LegRole> {
        self.group_of(leg).and_then(|group| group.role_of(leg))
    }

    pub fn paired_short(&self, leg: LegId) -> Option<LegId> {
        self.group_of(leg).and_then(|group| group.paired_short(leg))
    }

    /// Every leg placed this session, in submission order
    pub fn leg_ids(&self) -> Vec<LegId> {
        self.groups
            .iter()
            .flat_map(|group| group.legs().map(|(_, leg)| leg))
            .collect()
    }
}
