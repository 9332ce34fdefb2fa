//! Discounting of cash-flow schedules.
//!
//! PV_i = amount_i / (1 + r)^t_i with `r` the periodic rate and `t_i` the
//! (possibly fractional) period index. Compounding factors are accumulated
//! by iterative multiplication as the schedule is walked in period order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::bonds::Bond;
use super::cashflows::{self, CashFlowEvent};
use crate::error::BondAnalyticsError;
use crate::math::{decimal_to_u32, pow_fraction};
use crate::types::{percent_to_rate, Money, Percent, Rate};
use crate::BondAnalyticsResult;

/// A schedule together with its price at a given periodic rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountedSchedule {
    pub periodic_rate: Rate,
    /// Sum of the per-event present values
    pub price: Money,
    /// Input events with `present_value` filled in
    pub events: Vec<CashFlowEvent>,
}

/// Periodic decimal rate for an annual percentage yield.
pub fn periodic_rate(annual_yield: Percent, payment_frequency: u8) -> Rate {
    percent_to_rate(annual_yield) / Decimal::from(payment_frequency)
}

fn check_rate(periodic_rate: Rate) -> BondAnalyticsResult<()> {
    if periodic_rate <= Decimal::NEGATIVE_ONE {
        return Err(BondAnalyticsError::InvalidRate {
            rate: periodic_rate,
        });
    }
    Ok(())
}

/// Walks ascending period indices, extending `(1+r)^n` one whole period at a
/// time instead of recomputing each power from scratch.
struct Compounder {
    base: Decimal,
    whole_periods: u32,
    whole_factor: Decimal,
}

impl Compounder {
    fn new(periodic_rate: Rate) -> Self {
        Compounder {
            base: Decimal::ONE + periodic_rate,
            whole_periods: 0,
            whole_factor: Decimal::ONE,
        }
    }

    /// (1+r)^period
    fn factor(&mut self, period: Decimal) -> BondAnalyticsResult<Decimal> {
        let whole = period.trunc();
        let target = decimal_to_u32(whole);
        if target < self.whole_periods {
            self.whole_periods = 0;
            self.whole_factor = Decimal::ONE;
        }
        while self.whole_periods < target {
            self.whole_factor = self.whole_factor.checked_mul(self.base).ok_or_else(|| {
                BondAnalyticsError::NumericalOverflow {
                    context: format!("compounding factor at period {period}"),
                }
            })?;
            self.whole_periods += 1;
        }

        let frac = period - whole;
        if frac.is_zero() {
            Ok(self.whole_factor)
        } else {
            self.whole_factor
                .checked_mul(pow_fraction(self.base, frac))
                .ok_or_else(|| BondAnalyticsError::NumericalOverflow {
                    context: format!("compounding factor at period {period}"),
                })
        }
    }
}

fn overflow(context: String) -> BondAnalyticsError {
    BondAnalyticsError::NumericalOverflow { context }
}

fn discount(amount: Money, factor: Decimal, period: Decimal) -> BondAnalyticsResult<Money> {
    if factor.is_zero() {
        return Err(BondAnalyticsError::DivisionByZero {
            context: format!("discount factor at period {period}"),
        });
    }
    amount
        .checked_div(factor)
        .ok_or_else(|| BondAnalyticsError::NumericalOverflow {
            context: format!("present value at period {period}"),
        })
}

/// Discount factor 1 / (1+r)^period.
pub fn discount_factor(periodic_rate: Rate, period: Decimal) -> BondAnalyticsResult<Decimal> {
    check_rate(periodic_rate)?;
    let factor = Compounder::new(periodic_rate).factor(period)?;
    discount(Decimal::ONE, factor, period)
}

/// Total present value of a schedule.
pub fn present_value(events: &[CashFlowEvent], periodic_rate: Rate) -> BondAnalyticsResult<Money> {
    Ok(discount_schedule(events, periodic_rate)?.price)
}

/// Discount every event, returning the price and the per-event PVs.
pub fn discount_schedule(
    events: &[CashFlowEvent],
    periodic_rate: Rate,
) -> BondAnalyticsResult<DiscountedSchedule> {
    check_rate(periodic_rate)?;

    let mut compounder = Compounder::new(periodic_rate);
    let mut price = Decimal::ZERO;
    let mut discounted = Vec::with_capacity(events.len());

    for event in events {
        let factor = compounder.factor(event.period)?;
        let pv = discount(event.amount, factor, event.period)?;
        price = price
            .checked_add(pv)
            .ok_or_else(|| overflow(format!("price at period {}", event.period)))?;
        discounted.push(CashFlowEvent {
            present_value: Some(pv),
            ..event.clone()
        });
    }

    Ok(DiscountedSchedule {
        periodic_rate,
        price,
        events: discounted,
    })
}

/// Price and its derivative with respect to the periodic rate:
/// dP/dr = -sum t_i * CF_i / (1+r)^(t_i + 1).
pub fn price_and_derivative(
    events: &[CashFlowEvent],
    periodic_rate: Rate,
) -> BondAnalyticsResult<(Money, Decimal)> {
    check_rate(periodic_rate)?;

    let one_plus_r = Decimal::ONE + periodic_rate;
    let mut compounder = Compounder::new(periodic_rate);
    let mut price = Decimal::ZERO;
    let mut weighted = Decimal::ZERO;

    for event in events {
        let factor = compounder.factor(event.period)?;
        let pv = discount(event.amount, factor, event.period)?;
        price = price
            .checked_add(pv)
            .ok_or_else(|| overflow(format!("price at period {}", event.period)))?;
        weighted = event
            .period
            .checked_mul(pv)
            .and_then(|w| weighted.checked_add(w))
            .ok_or_else(|| overflow(format!("price derivative at period {}", event.period)))?;
    }

    let derivative = weighted
        .checked_div(one_plus_r)
        .ok_or_else(|| overflow("price derivative".to_string()))?;
    Ok((price, -derivative))
}

/// Price a bond at an annual yield (percent), compounding at the bond's
/// payment frequency.
pub fn price_from_yield(bond: &Bond, annual_yield: Percent) -> BondAnalyticsResult<Money> {
    let schedule = cashflows::cash_flows(bond)?;
    present_value(&schedule, periodic_rate(annual_yield, bond.payment_frequency))
}
