//! PnL reporting

use serde::Serialize;
use std::fmt;

use crate::oms::{Broker, LegId, MarketFeed};
use crate::Money;

/// Aggregate PnL across a set of legs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PnlSnapshot {
    pub realized: Money,
    /// Open legs marked at their last traded price
    pub unrealized: Money,
    pub total: Money,
    pub open_legs: usize,
    pub closed_legs: usize,
}

impl fmt::Display for PnlSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total {:.2} (realized {:.2}, unrealized {:.2}; {} open, {} closed)",
            self.total.to_f64(),
            self.realized.to_f64(),
            self.unrealized.to_f64(),
            self.open_legs,
            self.closed_legs
        )
    }
}

/// PnL of `legs`. Open legs without a price contribute nothing to unrealized.
pub fn pnl_snapshot<V>(venue: &V, legs: impl IntoIterator<Item = LegId>) -> PnlSnapshot
where
    V: Broker + MarketFeed + ?Sized,
{
    let mut snapshot = PnlSnapshot::default();

    for leg in legs.into_iter().filter_map(|id| venue.leg(id)) {
        if leg.is_closed() {
            snapshot.closed_legs += 1;
            snapshot.realized += leg.realized_pnl().unwrap_or_default();
        } else if leg.is_active() {
            snapshot.open_legs += 1;
            if let Some(pnl) = venue
                .last_price(&leg.symbol)
                .and_then(|mark| leg.unrealized_pnl(mark))
            {
                snapshot.unrealized += pnl;
            }
        }
    }

    snapshot.total = snapshot.realized + snapshot.unrealized;
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oms::{PaperVenue, UnderlyingDetails};
    use crate::{Side, Symbol};
    use chrono::{NaiveDate, Weekday};

    fn m(v: f64) -> Money {
        Money::from_f64(v)
    }

    #[test]
    fn test_snapshot_mixes_open_and_closed() {
        let now = NaiveDate::from_ymd_opt(2023, 10, 16)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let mut venue = PaperVenue::new(
            now,
            [UnderlyingDetails {
                name: "NIFTY".to_string(),
                index: "NIFTY 50".to_string(),
                strike_difference: 50,
                lot_size: 50,
                expiry_weekday: Weekday::Thu,
            }],
        );
        let short = Symbol::new("S");
        let hedge = Symbol::new("H");
        venue.set_price(&short, m(100.0));
        venue.set_price(&hedge, m(10.0));

        let short_leg = venue.enter_limit(&short, Side::Sell, m(85.0), 50).unwrap();
        let hedge_leg = venue.enter_limit(&hedge, Side::Buy, m(11.5), 50).unwrap();
        let unfilled = venue.enter_limit(&hedge, Side::Buy, m(1.0), 50).unwrap();
        venue.process();

        venue.exit_limit(short_leg, m(95.0)).unwrap();
        venue.set_price(&short, m(90.0));
        venue.set_price(&hedge, m(12.0));
        venue.process();

        let snapshot = pnl_snapshot(&venue, [short_leg, hedge_leg, unfilled]);
        assert_eq!(snapshot.closed_legs, 1);
        assert_eq!(snapshot.open_legs, 1);
        assert_eq!(snapshot.realized, m(500.0));
        assert_eq!(snapshot.unrealized, m(100.0));
        assert_eq!(snapshot.total, m(600.0));
    }
}
