//! Entry coordinator

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::calendar::nearest_weekly_expiry;
use crate::config::PartialEntryPolicy;
use crate::oms::{LegId, PendingSet, Venue};
use crate::pricing::{atm_strike, protected_price};
use crate::{Side, Symbol};

use super::session::{LegRole, Phase, StraddleGroup};
use super::straddle::StraddleStrategy;

impl StraddleStrategy {
    /// Place one hedged straddle around the current ATM strike.
    ///
    /// Returns `None` when the underlying has no price yet. Legs whose entry
    /// could not be submitted are left as placeholders in the group.
    pub(super) fn enter_group<V: Venue + ?Sized>(
        &mut self,
        venue: &mut V,
        date: NaiveDate,
    ) -> Result<Option<&StraddleGroup>> {
        let index = Symbol::new(&self.underlying.index);
        let Some(reference) = venue.last_price(&index) else {
            info!(index = %index, "No price for underlying, skipping entry");
            return Ok(None);
        };

        let increment = self.underlying.strike_difference;
        let strike = atm_strike(reference, increment).context("Failed to compute ATM strike")?;
        let expiry = nearest_weekly_expiry(date, self.underlying.expiry_weekday);
        let offset = self.config.orders.hedge_strikes_away * increment;

        let mut group = StraddleGroup::new(strike, expiry);
        self.session.phase = Phase::PlacingOrders;

        for role in LegRole::ALL {
            let leg_strike = match role {
                LegRole::CeHedge => strike + offset,
                LegRole::PeHedge => strike - offset,
                LegRole::CeShort | LegRole::PeShort => strike,
            };
            let symbol = venue
                .option_symbol(&self.underlying.name, expiry, leg_strike, role.option_type())
                .context("Failed to resolve option symbol")?;

            let leg = self.enter_with_market_protection(venue, &symbol, role.side());
            if let Some(leg) = leg {
                self.session.tracker.add(leg, PendingSet::Entry)?;
            }
            group.set_leg(role, leg);
        }

        if !group.is_complete() {
            let placed = group.legs().count();
            match self.config.orders.partial_entry_policy {
                PartialEntryPolicy::Keep => {
                    warn!(strike, placed, "Partial entry, keeping placed legs");
                }
                PartialEntryPolicy::Unwind => {
                    warn!(strike, placed, "Partial entry, unwinding placed legs as they fill");
                    group.unwind = true;
                }
            }
        }

        info!(
            strike,
            expiry = %expiry,
            reference = %reference,
            entry = self.session.groups.len() + 1,
            "Straddle group placed"
        );
        self.session.groups.push(group);
        Ok(self.session.groups.last())
    }

    /// Submit a limit entry priced off the last trade.
    ///
    /// Missing prices and rejections skip the leg.
    pub(super) fn enter_with_market_protection<V: Venue + ?Sized>(
        &self,
        venue: &mut V,
        symbol: &Symbol,
        side: Side,
    ) -> Option<LegId> {
        let Some(ltp) = venue.last_price(symbol) else {
            info!(symbol = %symbol, "No price, skipping leg");
            return None;
        };

        let price = match protected_price(ltp, self.config.orders.market_protection_pct, self.tick, side) {
            Ok(price) => price,
            Err(e) => {
                warn!(symbol = %symbol, ltp = %ltp, "Cannot price entry: {}", e);
                return None;
            }
        };

        match venue.enter_limit(symbol, side, price, self.quantity()) {
            Ok(leg) => {
                info!(leg = %leg, symbol = %symbol, ?side, ltp = %ltp, price = %price, "Entry submitted");
                Some(leg)
            }
            Err(e) => {
                warn!(symbol = %symbol, ?side, "Entry rejected: {}", e);
                None
            }
        }
    }
}
