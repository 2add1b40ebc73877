//! Broker callback handlers
//!
//! Each handler settles the tracker membership its event answers and may
//! stage the next order. When one short leg exits, the paired short's stop is
//! canceled and reissued at its entry price.
//!
//! Handlers tolerate late and repeated delivery: discards are idempotent and
//! follow-up actions are gated on the membership they consume.

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::oms::{LegId, PendingSet, TrackerError, Venue};
use crate::pricing::{cost_stop_prices, stop_limit_prices};

use super::session::Phase;
use super::straddle::StraddleStrategy;

impl StraddleStrategy {
    /// Mark the phase as placing orders unless a square-off is running
    fn mark_placing_orders(&mut self) {
        if !matches!(self.session.phase, Phase::SquaringOff | Phase::Exited) {
            self.session.phase = Phase::PlacingOrders;
        }
    }

    pub(super) fn entry_confirmed<V: Venue + ?Sized>(&mut self, venue: &mut V, leg: LegId) -> Result<()> {
        self.session.tracker.discard(leg, PendingSet::Entry);

        let unwind = self.session.group_of(leg).is_some_and(|group| group.unwind);
        let squaring_off = matches!(self.session.phase, Phase::SquaringOff | Phase::Exited);
        if unwind || squaring_off {
            info!(leg = %leg, unwind, phase = %self.session.phase, "Entry filled, exiting immediately");
            if self.session.tracker.add(leg, PendingSet::Exit)? {
                self.exit_with_market_protection(venue, leg)?;
            }
            self.mark_placing_orders();
            return Ok(());
        }

        let Some(role) = self.session.role_of(leg) else {
            return Ok(());
        };
        if !role.is_short() {
            debug!(leg = %leg, %role, "Hedge filled");
            return Ok(());
        }

        let (symbol, entry) = match venue.leg(leg) {
            Some(l) => (l.symbol.clone(), l.entry_price),
            None => anyhow::bail!("Unknown leg {}", leg),
        };
        let Some(entry) = entry else {
            warn!(leg = %leg, symbol = %symbol, "Entry confirmed without a fill price, no stop placed");
            return Ok(());
        };

        let now = venue.current_datetime();
        let sl_pct = self.schedule.stop_loss_pct(now.time());
        let prices = stop_limit_prices(entry, sl_pct, self.config.orders.stop_limit_buffer_pct, self.tick)
            .with_context(|| format!("Failed to price stop for {}", symbol))?;
        venue
            .exit_stop_limit(leg, prices.trigger, prices.limit)
            .with_context(|| format!("Failed to place stop for {}", symbol))?;

        info!(
            leg = %leg,
            symbol = %symbol,
            entry = %entry,
            sl_pct,
            trigger = %prices.trigger,
            limit = %prices.limit,
            "Stop-loss placed"
        );
        Ok(())
    }

    pub(super) fn entry_canceled(&mut self, leg: LegId) {
        self.session.tracker.discard(leg, PendingSet::Entry);
        info!(leg = %leg, "Entry canceled");
    }

    pub(super) fn exit_canceled<V: Venue + ?Sized>(&mut self, venue: &mut V, leg: LegId) -> Result<()> {
        let requested = self.session.tracker.discard(leg, PendingSet::CancelExit);

        if self.session.tracker.discard(leg, PendingSet::SlToCost) {
            let (symbol, entry) = match venue.leg(leg) {
                Some(l) => (l.symbol.clone(), l.entry_price),
                None => anyhow::bail!("Unknown leg {}", leg),
            };
            let entry = entry.with_context(|| format!("No entry price for {}", symbol))?;
            let prices = cost_stop_prices(entry, self.config.orders.stop_limit_buffer_pct, self.tick)
                .with_context(|| format!("Failed to price cost stop for {}", symbol))?;
            venue
                .exit_stop_limit(leg, prices.trigger, prices.limit)
                .with_context(|| format!("Failed to place cost stop for {}", symbol))?;

            info!(leg = %leg, symbol = %symbol, trigger = %prices.trigger, limit = %prices.limit, "Stop moved to cost");
            self.mark_placing_orders();
        } else if requested && self.session.tracker.contains(leg, PendingSet::Exit) {
            self.exit_with_market_protection(venue, leg)?;
            self.mark_placing_orders();
        } else {
            debug!(leg = %leg, "Exit cancel with nothing staged");
        }
        Ok(())
    }

    pub(super) fn exit_confirmed<V: Venue + ?Sized>(&mut self, venue: &mut V, leg: LegId) -> Result<()> {
        // A filled exit answers every operation still in flight on the leg
        for set in [PendingSet::Exit, PendingSet::CancelExit, PendingSet::SlToCost] {
            self.session.tracker.discard(leg, set);
        }
        info!(leg = %leg, "Exit filled");

        if self.session.phase == Phase::SquaringOff {
            return Ok(());
        }
        // Unwinding legs carry market exits, not stops
        if self.session.group_of(leg).is_some_and(|group| group.unwind) {
            return Ok(());
        }
        let Some(other) = self.session.paired_short(leg) else {
            return Ok(());
        };
        if self.session.tracker.contains(other, PendingSet::Exit) {
            debug!(leg = %other, "Paired short already exiting, stop left as is");
            return Ok(());
        }
        let Some(other_leg) = venue.leg(other) else {
            return Ok(());
        };
        if other_leg.exit_filled() || !other_leg.exit_active() {
            return Ok(());
        }

        match self.session.tracker.add(other, PendingSet::SlToCost) {
            Ok(true) => match venue.cancel_exit(other) {
                Ok(()) => {
                    info!(leg = %other, exited = %leg, "Paired short exited, moving stop to cost");
                    self.mark_placing_orders();
                }
                Err(e) => {
                    self.session.tracker.discard(other, PendingSet::SlToCost);
                    error!(leg = %other, "Failed to cancel stop for SL-to-cost: {}", e);
                }
            },
            Ok(false) => debug!(leg = %other, "SL-to-cost already pending"),
            Err(TrackerError::Conflict { existing, .. }) => {
                warn!(leg = %other, %existing, "SL-to-cost skipped, leg busy");
            }
        }
        Ok(())
    }
}
