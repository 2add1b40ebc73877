//! Fill detection against last traded prices

use crate::oms::types::{ExitKind, Leg, OrderState};
use crate::{Money, Side};

/// Outcome of checking a leg's exit order against a new price
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCheck {
    /// Nothing happened
    Idle,
    /// Stop traded; the order now rests as a limit
    Triggered,
    /// Exit filled at this price
    Filled(Money),
}

/// Check if a limit order on `side` fills at `ltp`.
///
/// Buy limit fills when ltp ≤ limit, sell limit when ltp ≥ limit. Fills are
/// taken at the traded price, never worse than the limit.
pub fn check_limit(side: Side, limit: Money, ltp: Money) -> Option<Money> {
    match side {
        Side::Buy if ltp <= limit => Some(ltp),
        Side::Sell if ltp >= limit => Some(ltp),
        _ => None,
    }
}

/// Check if a stop on `side` triggers at `ltp`.
///
/// Buy stop triggers when ltp ≥ trigger, sell stop when ltp ≤ trigger.
pub fn check_trigger(side: Side, trigger: Money, ltp: Money) -> bool {
    match side {
        Side::Buy => ltp >= trigger,
        Side::Sell => ltp <= trigger,
    }
}

/// Check a leg's entry order
pub fn check_entry(leg: &Leg, ltp: Money) -> Option<Money> {
    if leg.entry_state != OrderState::Open {
        return None;
    }
    check_limit(leg.side, leg.entry_limit, ltp)
}

/// Check a leg's exit order, updating the stop's triggered flag in place
pub fn check_exit(leg: &mut Leg, ltp: Money) -> ExitCheck {
    let side = leg.exit_side();
    let Some(exit) = leg.exit.as_mut() else {
        return ExitCheck::Idle;
    };
    // A cancel in flight can no longer fill
    if exit.state != OrderState::Open {
        return ExitCheck::Idle;
    }

    match &mut exit.kind {
        ExitKind::Limit { price } => check_limit(side, *price, ltp)
            .map(ExitCheck::Filled)
            .unwrap_or(ExitCheck::Idle),
        ExitKind::StopLimit {
            trigger,
            limit,
            triggered,
        } => {
            let just_triggered = if *triggered {
                false
            } else if check_trigger(side, *trigger, ltp) {
                *triggered = true;
                true
            } else {
                return ExitCheck::Idle;
            };
            match check_limit(side, *limit, ltp) {
                Some(price) => ExitCheck::Filled(price),
                None if just_triggered => ExitCheck::Triggered,
                None => ExitCheck::Idle,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oms::types::{ExitOrder, LegId};
    use crate::Symbol;

    fn m(v: f64) -> Money {
        Money::from_f64(v)
    }

    fn short_leg_with_stop(trigger: f64, limit: f64) -> Leg {
        let mut leg = Leg::new(LegId(1), Symbol::new("X"), Side::Sell, 50, m(85.0));
        leg.entry_state = OrderState::Filled;
        leg.entry_price = Some(m(100.0));
        leg.exit = Some(ExitOrder {
            kind: ExitKind::StopLimit {
                trigger: m(trigger),
                limit: m(limit),
                triggered: false,
            },
            state: OrderState::Open,
        });
        leg
    }

    #[test]
    fn test_buy_limit_fill() {
        assert_eq!(check_limit(Side::Buy, m(115.0), m(101.0)), Some(m(101.0)));
        assert_eq!(check_limit(Side::Buy, m(115.0), m(116.0)), None);
    }

    #[test]
    fn test_sell_limit_fill() {
        assert_eq!(check_limit(Side::Sell, m(85.0), m(99.0)), Some(m(99.0)));
        assert_eq!(check_limit(Side::Sell, m(85.0), m(84.0)), None);
    }

    #[test]
    fn test_stop_limit_on_short_leg() {
        let mut leg = short_leg_with_stop(140.0, 161.0);
        assert_eq!(check_exit(&mut leg, m(130.0)), ExitCheck::Idle);
        assert_eq!(check_exit(&mut leg, m(145.0)), ExitCheck::Filled(m(145.0)));
    }

    #[test]
    fn test_stop_gaps_through_limit_then_rests() {
        let mut leg = short_leg_with_stop(140.0, 161.0);
        assert_eq!(check_exit(&mut leg, m(170.0)), ExitCheck::Triggered);
        assert_eq!(check_exit(&mut leg, m(165.0)), ExitCheck::Idle);
        assert_eq!(check_exit(&mut leg, m(160.0)), ExitCheck::Filled(m(160.0)));
    }

    #[test]
    fn test_pending_cancel_never_fills() {
        let mut leg = short_leg_with_stop(140.0, 161.0);
        if let Some(exit) = leg.exit.as_mut() {
            exit.state = OrderState::PendingCancel;
        }
        assert_eq!(check_exit(&mut leg, m(150.0)), ExitCheck::Idle);
    }
}
