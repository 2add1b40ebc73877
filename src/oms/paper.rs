//! In-memory paper venue
//!
//! Implements [`Broker`] and [`MarketFeed`] for replays and tests. Orders are
//! only recorded on submission; fills and cancel confirmations happen in
//! [`PaperVenue::process`] and are queued as [`BrokerEvent`]s, so the strategy
//! always sees them asynchronously.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use tracing::debug;

use crate::oms::broker::{Broker, BrokerError, BrokerEvent, BrokerResult, MarketFeed, UnderlyingDetails};
use crate::oms::execution::{check_entry, check_exit, ExitCheck};
use crate::oms::types::{ExitKind, ExitOrder, Leg, LegId, OrderState};
use crate::{Money, OptionType, Side, Symbol};

/// Paper broker and price feed
#[derive(Debug)]
pub struct PaperVenue {
    now: NaiveDateTime,
    prices: HashMap<Symbol, Money>,
    underlyings: HashMap<String, UnderlyingDetails>,
    legs: BTreeMap<LegId, Leg>,
    next_leg_id: u64,
    events: VecDeque<BrokerEvent>,
    /// Entries on these symbols are rejected instead of filled
    rejected_symbols: HashSet<Symbol>,
}

impl PaperVenue {
    pub fn new(now: NaiveDateTime, underlyings: impl IntoIterator<Item = UnderlyingDetails>) -> Self {
        Self {
            now,
            prices: HashMap::new(),
            underlyings: underlyings
                .into_iter()
                .map(|details| (details.name.clone(), details))
                .collect(),
            legs: BTreeMap::new(),
            next_leg_id: 1,
            events: VecDeque::new(),
            rejected_symbols: HashSet::new(),
        }
    }

    pub fn set_time(&mut self, now: NaiveDateTime) {
        self.now = now;
    }

    /// Record a last traded price; orders are matched on the next `process`
    pub fn set_price(&mut self, symbol: &Symbol, price: Money) {
        self.prices.insert(symbol.clone(), price);
    }

    pub fn clear_price(&mut self, symbol: &Symbol) {
        self.prices.remove(symbol);
    }

    /// Reject instead of fill any entry on `symbol`; reported as `EntryCanceled`
    pub fn reject_entries_for(&mut self, symbol: &Symbol) {
        self.rejected_symbols.insert(symbol.clone());
    }

    /// Match working orders against current prices and confirm pending cancels.
    ///
    /// Returns the number of events queued.
    pub fn process(&mut self) -> usize {
        let before = self.events.len();
        let now = self.now;

        for leg in self.legs.values_mut() {
            if let Some(exit) = leg.exit.as_mut() {
                if exit.state == OrderState::PendingCancel {
                    exit.state = OrderState::Cancelled;
                    self.events.push_back(BrokerEvent::ExitCanceled(leg.id));
                    continue;
                }
            }

            let Some(&ltp) = self.prices.get(&leg.symbol) else {
                continue;
            };

            if leg.entry_state == OrderState::Open {
                if self.rejected_symbols.contains(&leg.symbol) {
                    leg.entry_state = OrderState::Rejected;
                    self.events.push_back(BrokerEvent::EntryCanceled(leg.id));
                } else if let Some(price) = check_entry(leg, ltp) {
                    leg.entry_state = OrderState::Filled;
                    leg.entry_price = Some(price);
                    leg.opened_at = Some(now);
                    self.events.push_back(BrokerEvent::EntryConfirmed(leg.id));
                }
                continue;
            }

            match check_exit(leg, ltp) {
                ExitCheck::Filled(price) => {
                    if let Some(exit) = leg.exit.as_mut() {
                        exit.state = OrderState::Filled;
                    }
                    leg.exit_price = Some(price);
                    leg.closed_at = Some(now);
                    self.events.push_back(BrokerEvent::ExitConfirmed(leg.id));
                }
                ExitCheck::Triggered => {
                    debug!(leg = %leg.id, symbol = %leg.symbol, ltp = %ltp, "Stop triggered");
                }
                ExitCheck::Idle => {}
            }
        }

        self.events.len() - before
    }

    pub fn drain_events(&mut self) -> Vec<BrokerEvent> {
        self.events.drain(..).collect()
    }

    /// Queue an arbitrary event (duplicate/late delivery in tests)
    pub fn push_event(&mut self, event: BrokerEvent) {
        self.events.push_back(event);
    }

    fn leg_mut(&mut self, leg: LegId) -> BrokerResult<&mut Leg> {
        self.legs.get_mut(&leg).ok_or(BrokerError::UnknownLeg(leg))
    }

    fn place_exit(&mut self, leg: LegId, kind: ExitKind) -> BrokerResult<()> {
        let leg = self.leg_mut(leg)?;
        if !leg.is_active() {
            return Err(BrokerError::LegNotOpen(leg.id));
        }
        if leg.exit_active() {
            return Err(BrokerError::ExitAlreadyActive(leg.id));
        }
        leg.exit = Some(ExitOrder {
            kind,
            state: OrderState::Open,
        });
        Ok(())
    }
}

impl Broker for PaperVenue {
    fn underlying_details(&self, underlying: &str) -> BrokerResult<UnderlyingDetails> {
        self.underlyings
            .get(underlying)
            .cloned()
            .ok_or_else(|| BrokerError::UnknownUnderlying(underlying.to_string()))
    }

    /// `{UNDERLYING}{DDMONYY}{STRIKE}{CE|PE}`, e.g. `NIFTY19OCT2319500CE`
    fn option_symbol(
        &self,
        underlying: &str,
        expiry: NaiveDate,
        strike: i64,
        option_type: OptionType,
    ) -> BrokerResult<Symbol> {
        if !self.underlyings.contains_key(underlying) {
            return Err(BrokerError::UnknownUnderlying(underlying.to_string()));
        }
        Ok(Symbol::new(format!(
            "{}{}{}{}",
            underlying,
            expiry.format("%d%b%y").to_string().to_uppercase(),
            strike,
            option_type.suffix()
        )))
    }

    fn enter_limit(
        &mut self,
        symbol: &Symbol,
        side: Side,
        limit_price: Money,
        quantity: u32,
    ) -> BrokerResult<LegId> {
        if quantity == 0 {
            return Err(BrokerError::Rejected(format!("zero quantity for {}", symbol)));
        }
        let id = LegId(self.next_leg_id);
        self.next_leg_id += 1;
        self.legs
            .insert(id, Leg::new(id, symbol.clone(), side, quantity, limit_price));
        Ok(id)
    }

    fn exit_stop_limit(&mut self, leg: LegId, trigger: Money, limit: Money) -> BrokerResult<()> {
        self.place_exit(
            leg,
            ExitKind::StopLimit {
                trigger,
                limit,
                triggered: false,
            },
        )
    }

    fn exit_limit(&mut self, leg: LegId, price: Money) -> BrokerResult<()> {
        self.place_exit(leg, ExitKind::Limit { price })
    }

    fn cancel_exit(&mut self, leg: LegId) -> BrokerResult<()> {
        let leg = self.leg_mut(leg)?;
        match leg.exit.as_mut() {
            Some(exit) if exit.state == OrderState::Open => {
                exit.state = OrderState::PendingCancel;
                Ok(())
            }
            Some(exit) if exit.state == OrderState::PendingCancel => Ok(()),
            _ => Err(BrokerError::NoActiveExit(leg.id)),
        }
    }

    fn leg(&self, leg: LegId) -> Option<&Leg> {
        self.legs.get(&leg)
    }

    fn legs(&self) -> Vec<&Leg> {
        self.legs.values().collect()
    }
}

impl MarketFeed for PaperVenue {
    fn current_datetime(&self) -> NaiveDateTime {
        self.now
    }

    fn last_price(&self, symbol: &Symbol) -> Option<Money> {
        self.prices.get(symbol).copied()
    }
}
