//! Protection pricing
//!
//! Limit prices used in place of market orders, and the stop-limit pairs
//! placed on short legs. Every price is floored to the tick size, whatever the
//! direction of the order.

use thiserror::Error;

use crate::{Money, Side};

/// Invalid pricing inputs
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    #[error("reference price ({0}) must be positive")]
    NonPositiveReference(Money),

    #[error("percentage ({0}) must be >= 0")]
    NegativePercentage(f64),

    #[error("tick size ({0}) must be positive")]
    NonPositiveTick(Money),

    #[error("strike increment ({0}) must be positive")]
    NonPositiveIncrement(i64),
}

/// Trigger and limit price of a stop-limit exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopLimitPrices {
    pub trigger: Money,
    pub limit: Money,
}

fn check_inputs(reference: Money, pct: f64, tick: Money) -> Result<(), PricingError> {
    if !reference.is_positive() {
        return Err(PricingError::NonPositiveReference(reference));
    }
    if pct.is_nan() || pct < 0.0 {
        return Err(PricingError::NegativePercentage(pct));
    }
    if !tick.is_positive() {
        return Err(PricingError::NonPositiveTick(tick));
    }
    Ok(())
}

/// Move `reference` against the trader by `pct` percent, then floor to `tick`.
///
/// Buy: `reference * (1 + pct/100)`. Sell: `reference * (1 - pct/100)`.
pub fn protected_price(
    reference: Money,
    pct: f64,
    tick: Money,
    side: Side,
) -> Result<Money, PricingError> {
    check_inputs(reference, pct, tick)?;

    let factor = match side {
        Side::Buy => Money::ONE + Money::percent(pct),
        Side::Sell => Money::ONE - Money::percent(pct),
    };
    Ok((reference * factor).floor_to_tick(tick))
}

/// Stop-limit pair for a short leg filled at `entry`.
///
/// trigger = floor(entry * (1 + sl/100)), limit = floor(trigger * (1 + buffer/100))
pub fn stop_limit_prices(
    entry: Money,
    stop_loss_pct: f64,
    buffer_pct: f64,
    tick: Money,
) -> Result<StopLimitPrices, PricingError> {
    check_inputs(entry, stop_loss_pct, tick)?;
    check_inputs(entry, buffer_pct, tick)?;

    let trigger = (entry * (Money::ONE + Money::percent(stop_loss_pct))).floor_to_tick(tick);
    let limit = (trigger * (Money::ONE + Money::percent(buffer_pct))).floor_to_tick(tick);
    Ok(StopLimitPrices { trigger, limit })
}

/// Stop-limit pair that triggers at the leg's own entry price (breakeven)
pub fn cost_stop_prices(
    entry: Money,
    buffer_pct: f64,
    tick: Money,
) -> Result<StopLimitPrices, PricingError> {
    check_inputs(entry, buffer_pct, tick)?;

    let trigger = entry.floor_to_tick(tick);
    let limit = (trigger * (Money::ONE + Money::percent(buffer_pct))).floor_to_tick(tick);
    Ok(StopLimitPrices { trigger, limit })
}

/// At-the-money strike: nearest multiple of `increment` to `reference`
pub fn atm_strike(reference: Money, increment: i64) -> Result<i64, PricingError> {
    if increment <= 0 {
        return Err(PricingError::NonPositiveIncrement(increment));
    }
    if !reference.is_positive() {
        return Err(PricingError::NonPositiveReference(reference));
    }
    let strike = reference.round_to_multiple(Money::from_i64(increment));
    strike
        .to_i64()
        .ok_or(PricingError::NonPositiveReference(reference))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tick() -> Money {
        Money::from(dec!(0.05))
    }

    #[test]
    fn test_buy_protection_scenario() {
        let price = protected_price(Money::from_i64(100), 15.0, tick(), Side::Buy).unwrap();
        assert_eq!(price, Money::from(dec!(115.00)));
    }

    #[test]
    fn test_sell_protection_floors() {
        // 123.45 * 0.85 = 104.9325 -> 104.90
        let price =
            protected_price(Money::from(dec!(123.45)), 15.0, tick(), Side::Sell).unwrap();
        assert_eq!(price, Money::from(dec!(104.90)));
    }

    #[test]
    fn test_buy_protection_floors_not_ceils() {
        // 10.03 * 1.15 = 11.5345 -> 11.50
        let price = protected_price(Money::from(dec!(10.03)), 15.0, tick(), Side::Buy).unwrap();
        assert_eq!(price, Money::from(dec!(11.50)));
    }

    #[test]
    fn test_protection_is_monotonic_and_on_tick() {
        let reference = Money::from(dec!(87.35));
        let mut last_buy = Money::ZERO;
        let mut last_sell = Money::from_i64(1_000);

        for step in 0..=20 {
            let pct = step as f64 * 5.0;
            let buy = protected_price(reference, pct, tick(), Side::Buy).unwrap();
            let sell = protected_price(reference, pct, tick(), Side::Sell).unwrap();

            assert!(buy > last_buy, "buy price must rise with protection");
            assert!(sell < last_sell, "sell price must fall with protection");
            assert_eq!(buy.floor_to_tick(tick()), buy);
            assert_eq!(sell.floor_to_tick(tick()), sell);

            last_buy = buy;
            last_sell = sell;
        }
    }

    #[test]
    fn test_stop_limit_scenario() {
        let prices = stop_limit_prices(Money::from_i64(100), 40.0, 15.0, tick()).unwrap();
        assert_eq!(prices.trigger, Money::from(dec!(140.00)));
        assert_eq!(prices.limit, Money::from(dec!(161.00)));
    }

    #[test]
    fn test_cost_stop_uses_entry_price() {
        let prices = cost_stop_prices(Money::from(dec!(101.37)), 15.0, tick()).unwrap();
        assert_eq!(prices.trigger, Money::from(dec!(101.35)));
        // 101.35 * 1.15 = 116.5525
        assert_eq!(prices.limit, Money::from(dec!(116.55)));
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(
            protected_price(Money::ZERO, 15.0, tick(), Side::Buy),
            Err(PricingError::NonPositiveReference(Money::ZERO))
        );
        assert_eq!(
            protected_price(Money::ONE, -1.0, tick(), Side::Buy),
            Err(PricingError::NegativePercentage(-1.0))
        );
        assert!(protected_price(Money::ONE, 1.0, Money::ZERO, Side::Buy).is_err());
    }

    #[test]
    fn test_atm_strike() {
        assert_eq!(atm_strike(Money::from(dec!(19537.2)), 50).unwrap(), 19550);
        assert_eq!(atm_strike(Money::from(dec!(19512.4)), 50).unwrap(), 19500);
        assert_eq!(atm_strike(Money::from(dec!(44380)), 100).unwrap(), 44400);
        assert!(atm_strike(Money::from_i64(100), 0).is_err());
    }
}
