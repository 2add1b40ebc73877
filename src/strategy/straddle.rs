//! Hedged straddle strategy
//!
//! Driver-facing entry points and the phase state machine. Order placement
//! lives in `entry`/`exit`, callback handling in `sync`.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use tracing::{debug, error, info};

use crate::calendar::InfoClock;
use crate::config::Config;
use crate::oms::{BrokerEvent, UnderlyingDetails, Venue};
use crate::reporting::{pnl_snapshot, PnlSnapshot};
use crate::schedule::StopLossSchedule;
use crate::Money;

use super::session::{Phase, SessionContext};

/// Hedged short straddle on one underlying
#[derive(Debug)]
pub struct StraddleStrategy {
    pub(super) config: Config,
    pub(super) underlying: UnderlyingDetails,
    pub(super) schedule: StopLossSchedule,
    pub(super) tick: Money,
    pub(super) session: SessionContext,
    info_clock: InfoClock,
}

impl StraddleStrategy {
    pub fn new<V: Venue + ?Sized>(config: Config, venue: &V) -> Result<Self> {
        let underlying = venue
            .underlying_details(&config.underlying.name)
            .context("Failed to resolve underlying")?;
        let schedule = config
            .stop_loss_schedule()
            .context("Invalid stop-loss schedule")?;
        let tick = Money::from_f64(config.orders.tick_size);

        let mut info_clock = InfoClock::new(config.session.info_interval_minutes);
        info_clock.reset(venue.current_datetime());

        info!(
            underlying = %underlying.name,
            index = %underlying.index,
            lot_size = underlying.lot_size,
            lots = config.underlying.lots,
            "Straddle strategy initialized"
        );

        Ok(Self {
            config,
            underlying,
            schedule,
            tick,
            session: SessionContext::new(),
            info_clock,
        })
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Order quantity per leg
    pub fn quantity(&self) -> u32 {
        self.config.underlying.lots * self.underlying.lot_size
    }

    /// PnL over every leg placed this session
    pub fn pnl<V: Venue + ?Sized>(&self, venue: &V) -> PnlSnapshot {
        pnl_snapshot(venue, self.session.leg_ids())
    }

    // =========================================================================
    // Driver entry points
    // =========================================================================

    /// Periodic evaluation. Failures are logged and never propagate.
    pub fn on_tick<V: Venue + ?Sized>(&mut self, venue: &mut V) {
        if let Err(e) = self.evaluate(venue) {
            error!(phase = %self.session.phase, "Tick evaluation failed: {:#}", e);
        }
    }

    /// Entry trigger, called once per resampled bar
    pub fn on_resampled_bar<V: Venue + ?Sized>(&mut self, venue: &mut V) {
        let now = venue.current_datetime();
        if !self.can_enter(now) {
            debug!(phase = %self.session.phase, entries = self.session.groups.len(), "Entry trigger skipped");
            return;
        }
        if let Err(e) = self.enter_group(venue, now.date()) {
            error!("Entry failed: {:#}", e);
        }
    }

    /// Dispatch one broker callback
    pub fn on_event<V: Venue + ?Sized>(&mut self, venue: &mut V, event: BrokerEvent) {
        let leg = event.leg();
        if self.session.group_of(leg).is_none() {
            debug!(leg = %leg, ?event, "Event for a leg outside this session ignored");
            return;
        }
        if event.is_terminal() && !self.session.record_delivery(event) {
            debug!(leg = %leg, ?event, "Duplicate event ignored");
            return;
        }

        let result = match event {
            BrokerEvent::EntryConfirmed(leg) => self.entry_confirmed(venue, leg),
            BrokerEvent::EntryCanceled(leg) => {
                self.entry_canceled(leg);
                Ok(())
            }
            BrokerEvent::ExitConfirmed(leg) => self.exit_confirmed(venue, leg),
            BrokerEvent::ExitCanceled(leg) => self.exit_canceled(venue, leg),
        };
        if let Err(e) = result {
            error!(leg = %leg, ?event, "Event handling failed: {:#}", e);
        }
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    fn evaluate<V: Venue + ?Sized>(&mut self, venue: &mut V) -> Result<()> {
        let now = venue.current_datetime();
        let time = now.time();
        let market_start = self.config.session.market_start;
        let market_end = self.config.session.market_end;
        let exit_time = self.config.session.exit_time;

        if time >= market_end {
            self.end_session(&*venue, now);
            return Ok(());
        }
        if time < market_start {
            return Ok(());
        }

        if self.info_clock.due(now) && !self.session.groups.is_empty() {
            info!(phase = %self.session.phase, "PnL: {}", self.pnl(&*venue));
        }

        self.retry_stalled_exits(venue)?;

        if time >= exit_time
            && !matches!(self.session.phase, Phase::SquaringOff | Phase::Exited)
            && !self.session.groups.is_empty()
        {
            info!(deadline = %exit_time, "Exit time reached, squaring off");
            self.close_all_positions(venue);
        }

        self.settle_phase(&*venue);
        Ok(())
    }

    /// Recompute the phase once every pending operation has settled
    pub(super) fn settle_phase<V: Venue + ?Sized>(&mut self, venue: &V) {
        let phase = self.session.phase;
        if !phase.is_transient() || !self.session.tracker.is_empty() {
            return;
        }

        let now = venue.current_datetime();
        let next = if phase == Phase::SquaringOff && now.time() >= self.config.session.exit_time {
            Phase::Exited
        } else if self.active_leg_count(venue) == 0 {
            Phase::Live
        } else {
            Phase::Entered
        };

        info!(from = %phase, to = %next, "Phase settled");
        self.session.phase = next;
    }

    pub(super) fn active_leg_count<V: Venue + ?Sized>(&self, venue: &V) -> usize {
        self.session
            .leg_ids()
            .into_iter()
            .filter_map(|id| venue.leg(id))
            .filter(|leg| leg.is_active())
            .count()
    }

    /// Entries allowed: inside the entry window, not winding down, under the cap
    pub(super) fn can_enter(&self, now: NaiveDateTime) -> bool {
        let time = now.time();
        let session = &self.config.session;
        time > session.market_start
            && time < session.exit_time
            && !matches!(self.session.phase, Phase::SquaringOff | Phase::Exited)
            && self.session.groups.len() < self.config.orders.max_entries
    }

    fn end_session<V: Venue + ?Sized>(&mut self, venue: &V, now: NaiveDateTime) {
        if self.session.groups.is_empty() && self.session.phase == Phase::Live {
            return;
        }

        let pnl = self.pnl(venue);
        info!(
            date = %now.date(),
            groups = self.session.groups.len(),
            phase = %self.session.phase,
            "Overall PnL for the day: {}",
            pnl
        );
        if !self.session.tracker.is_empty() {
            debug!("Discarding pending operations at market end");
        }

        self.session.reset();
        self.info_clock.reset(now);
    }
}
