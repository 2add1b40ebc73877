//! Exit coordinator

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::oms::{LegId, PendingSet, Venue};
use crate::pricing::protected_price;

use super::session::Phase;
use super::straddle::StraddleStrategy;

impl StraddleStrategy {
    /// Square off every open leg of the session.
    ///
    /// Legs with a working exit are canceled first and re-exited once the
    /// cancel is confirmed; the rest are exited immediately. A failure on one
    /// leg is logged and the remaining legs are still closed.
    pub(super) fn close_all_positions<V: Venue + ?Sized>(&mut self, venue: &mut V) {
        self.session.phase = Phase::SquaringOff;

        let open: Vec<(LegId, bool)> = self
            .session
            .leg_ids()
            .into_iter()
            .filter_map(|id| venue.leg(id))
            .filter(|leg| leg.is_active())
            .map(|leg| (leg.id, leg.exit_active()))
            .collect();

        info!(legs = open.len(), "Closing all positions");

        for (leg, exit_live) in open {
            if let Err(e) = self.square_off_leg(venue, leg, exit_live) {
                warn!(leg = %leg, "Square-off failed, continuing with remaining legs: {:#}", e);
            }
        }
    }

    fn square_off_leg<V: Venue + ?Sized>(&mut self, venue: &mut V, leg: LegId, exit_live: bool) -> Result<()> {
        if !exit_live {
            self.session.tracker.add(leg, PendingSet::Exit)?;
            self.exit_with_market_protection(venue, leg)?;
            return Ok(());
        }

        // An in-flight SL-to-cost cancel becomes a cancel-then-exit
        if self.session.tracker.discard(leg, PendingSet::SlToCost) {
            debug!(leg = %leg, "SL-to-cost superseded by square-off");
        }
        self.session.tracker.add(leg, PendingSet::CancelExit)?;
        self.session.tracker.add(leg, PendingSet::Exit)?;
        if let Err(e) = venue.cancel_exit(leg) {
            self.session.tracker.discard(leg, PendingSet::CancelExit);
            return Err(e).with_context(|| format!("Failed to cancel exit for leg {}", leg));
        }
        Ok(())
    }

    /// Submit a limit exit priced off the last trade.
    ///
    /// Returns false when the leg has no price; the caller keeps it pending.
    pub(super) fn exit_with_market_protection<V: Venue + ?Sized>(
        &self,
        venue: &mut V,
        leg: LegId,
    ) -> Result<bool> {
        let (symbol, side) = match venue.leg(leg) {
            Some(l) => (l.symbol.clone(), l.exit_side()),
            None => anyhow::bail!("Unknown leg {}", leg),
        };
        let Some(ltp) = venue.last_price(&symbol) else {
            info!(leg = %leg, symbol = %symbol, "No price, skipping exit");
            return Ok(false);
        };

        let price = protected_price(ltp, self.config.orders.market_protection_pct, self.tick, side)
            .with_context(|| format!("Failed to price exit for {}", symbol))?;
        venue
            .exit_limit(leg, price)
            .with_context(|| format!("Failed to submit exit for {}", symbol))?;

        info!(leg = %leg, symbol = %symbol, ?side, ltp = %ltp, price = %price, "Exit submitted");
        Ok(true)
    }

    /// Re-submit market exits that were skipped for lack of a price.
    ///
    /// A stalled leg is pending exit with no working exit order and no
    /// cancel in flight.
    pub(super) fn retry_stalled_exits<V: Venue + ?Sized>(&mut self, venue: &mut V) -> Result<()> {
        let tracker = &self.session.tracker;
        let stalled: Vec<LegId> = tracker
            .members(PendingSet::Exit)
            .into_iter()
            .filter(|leg| {
                !tracker.contains(*leg, PendingSet::CancelExit)
                    && !tracker.contains(*leg, PendingSet::SlToCost)
            })
            .filter(|leg| {
                venue
                    .leg(*leg)
                    .is_some_and(|l| l.is_active() && !l.exit_active())
            })
            .collect();

        for leg in stalled {
            debug!(leg = %leg, "Retrying stalled exit");
            if let Err(e) = self.exit_with_market_protection(venue, leg) {
                warn!(leg = %leg, "Exit retry failed: {:#}", e);
            }
        }
        Ok(())
    }
}
