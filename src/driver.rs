//! Replay driver
//!
//! Feeds timestamped prices into the paper venue and drives the strategy
//! the way the live loop would: events are pumped after every price update
//! and after every strategy call, ticks run on every timestamp, and the entry
//! trigger runs once per completed resampled bar.

use anyhow::Result;
use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::calendar::BarClock;
use crate::config::Config;
use crate::data::PriceTick;
use crate::oms::PaperVenue;
use crate::reporting::PnlSnapshot;
use crate::strategy::StraddleStrategy;
use crate::{Money, Symbol};

/// Upper bound on fill/dispatch rounds per pump
const MAX_PUMP_ROUNDS: usize = 16;

/// Strategy plus paper venue, stepped one timestamp at a time
#[derive(Debug)]
pub struct Driver {
    venue: PaperVenue,
    strategy: StraddleStrategy,
    bar_clock: BarClock,
}

impl Driver {
    pub fn new(config: Config, start: NaiveDateTime) -> Result<Self> {
        let venue = PaperVenue::new(start, config.instruments.clone());
        let bar_clock = BarClock::new(config.session.entry_interval_minutes);
        let strategy = StraddleStrategy::new(config, &venue)?;
        Ok(Self {
            venue,
            strategy,
            bar_clock,
        })
    }

    pub fn venue(&self) -> &PaperVenue {
        &self.venue
    }

    pub fn venue_mut(&mut self) -> &mut PaperVenue {
        &mut self.venue
    }

    pub fn strategy(&self) -> &StraddleStrategy {
        &self.strategy
    }

    pub fn pnl(&self) -> PnlSnapshot {
        self.strategy.pnl(&self.venue)
    }

    /// Advance to `now` with the given last traded prices
    pub fn step(&mut self, now: NaiveDateTime, prices: &[(Symbol, Money)]) {
        self.venue.set_time(now);
        for (symbol, price) in prices {
            self.venue.set_price(symbol, *price);
        }
        self.pump();

        self.strategy.on_tick(&mut self.venue);
        self.pump();

        if self.bar_clock.observe(now) {
            self.strategy.on_resampled_bar(&mut self.venue);
            self.pump();
        }
    }

    /// Replay a sequence of ticks, one step per distinct timestamp
    pub fn replay(&mut self, ticks: &[PriceTick]) -> usize {
        let mut steps = 0;
        for chunk in ticks.chunk_by(|a, b| a.datetime == b.datetime) {
            let prices: Vec<(Symbol, Money)> = chunk
                .iter()
                .map(|tick| (tick.symbol.clone(), tick.price))
                .collect();
            self.step(chunk[0].datetime, &prices);
            steps += 1;
        }
        steps
    }

    /// Match orders and dispatch events until the venue goes quiet
    pub fn pump(&mut self) {
        for round in 0..MAX_PUMP_ROUNDS {
            self.venue.process();
            let events = self.venue.drain_events();
            if events.is_empty() {
                return;
            }
            debug!(round, events = events.len(), "Dispatching broker events");
            for event in events {
                self.strategy.on_event(&mut self.venue, event);
            }
        }
        warn!("Event pump did not settle after {} rounds", MAX_PUMP_ROUNDS);
    }
}
