use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::bonds::Bond;
use super::cashflows::{self, CashFlowEvent};
use super::present_value::{self, periodic_rate};
use super::yields;
use crate::error::BondAnalyticsError;
use crate::types::{with_metadata, ComputationOutput, Money, Percent, RiskLevel};
use crate::BondAnalyticsResult;

/// Yield shift (annual percent) used for effective duration: 10 bps.
const EFFECTIVE_SHIFT_PCT: Decimal = dec!(0.1);

fn checked(value: Option<Decimal>, context: &str) -> BondAnalyticsResult<Decimal> {
    value.ok_or_else(|| BondAnalyticsError::NumericalOverflow {
        context: format!("risk metrics: {context}"),
    })
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for a stand-alone risk calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskInput {
    pub bond: Bond,
    /// Annual yield in percent. Solved from the market price when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yield_pct: Option<Percent>,
}

/// Duration, convexity and derived sensitivities at one yield.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Price at `yield_pct`
    pub price: Money,
    pub yield_pct: Percent,
    /// PV-weighted average time of cash flows, in years
    pub macaulay_duration: Decimal,
    /// Macaulay duration / (1 + y/freq)
    pub modified_duration: Decimal,
    /// Sum t(t+1) PV / (P (1+r)^2 f^2), in years squared
    pub convexity: Decimal,
    /// Price change for +100bp, duration only: -ModD * P * 0.01
    pub price_change_per_1pct: Money,
    /// Price change for +100bp including the convexity term
    pub price_change_per_1pct_with_convexity: Money,
    /// modified_duration * price * 0.0001
    pub dv01: Money,
    /// (P_down - P_up) / (2 * P * dy) with dy = 10bp
    pub effective_duration: Decimal,
    pub interest_rate_risk: RiskLevel,
    pub reinvestment_risk: RiskLevel,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Risk metrics for a bond at an annual yield (percent).
pub fn risk_metrics(bond: &Bond, yield_pct: Percent) -> BondAnalyticsResult<RiskMetrics> {
    bond.validate()?;
    let schedule = cashflows::cash_flows(bond)?;
    risk_metrics_from_schedule(&schedule, bond.payment_frequency, yield_pct)
}

/// Risk metrics for an already-built schedule.
pub fn risk_metrics_from_schedule(
    events: &[CashFlowEvent],
    payment_frequency: u8,
    yield_pct: Percent,
) -> BondAnalyticsResult<RiskMetrics> {
    let freq = Decimal::from(payment_frequency);
    let r = periodic_rate(yield_pct, payment_frequency);
    let discounted = present_value::discount_schedule(events, r)?;
    let price = discounted.price;

    if price.is_zero() {
        return Err(BondAnalyticsError::DivisionByZero {
            context: "risk metrics: bond price is zero".to_string(),
        });
    }

    // Sums run over PV shares of the price so they stay in range even when
    // the price itself is huge.
    let one_plus_r = Decimal::ONE + r;
    let mut time_weighted = Decimal::ZERO;
    let mut convexity_sum = Decimal::ZERO;
    for event in &discounted.events {
        let pv = event.present_value.unwrap_or(Decimal::ZERO);
        let share = checked(pv.checked_div(price), "PV share")?;
        time_weighted += event.period * share;
        convexity_sum += event.period * (event.period + Decimal::ONE) * share;
    }

    let macaulay_duration = time_weighted / freq;
    let modified_duration = checked(macaulay_duration.checked_div(one_plus_r), "modified duration")?;
    let convexity = checked(
        one_plus_r
            .checked_mul(one_plus_r)
            .and_then(|g| g.checked_mul(freq * freq))
            .and_then(|d| convexity_sum.checked_div(d)),
        "convexity",
    )?;

    let dollar_duration = checked(modified_duration.checked_mul(price), "dollar duration")?;
    let dv01 = dollar_duration * dec!(0.0001);

    // Effective duration from +/-10bp repricing
    let price_up = present_value::present_value(
        events,
        periodic_rate(yield_pct + EFFECTIVE_SHIFT_PCT, payment_frequency),
    )?;
    let price_down = present_value::present_value(
        events,
        periodic_rate(yield_pct - EFFECTIVE_SHIFT_PCT, payment_frequency),
    )?;
    let dy = EFFECTIVE_SHIFT_PCT / Decimal::ONE_HUNDRED;
    let effective_duration = checked(
        price_down
            .checked_sub(price_up)
            .and_then(|spread| spread.checked_div(price))
            .map(|relative| relative / (dec!(2) * dy)),
        "effective duration",
    )?;

    let mut metrics = RiskMetrics {
        price,
        yield_pct,
        macaulay_duration,
        modified_duration,
        convexity,
        price_change_per_1pct: Decimal::ZERO,
        price_change_per_1pct_with_convexity: Decimal::ZERO,
        dv01,
        effective_duration,
        interest_rate_risk: RiskLevel::from_modified_duration(modified_duration),
        reinvestment_risk: reinvestment_risk(macaulay_duration),
    };
    metrics.price_change_per_1pct = -dollar_duration * dec!(0.01);
    metrics.price_change_per_1pct_with_convexity = estimate_price_change(&metrics, dec!(100))?;

    Ok(metrics)
}

/// Estimated price change for a parallel shift of `shift_bps` basis points:
/// P * (-ModD * dy + 0.5 * C * dy^2).
pub fn estimate_price_change(metrics: &RiskMetrics, shift_bps: Decimal) -> BondAnalyticsResult<Money> {
    let dy = shift_bps / dec!(10000);
    let relative = checked(
        dy.checked_mul(dy)
            .and_then(|dy2| metrics.convexity.checked_mul(dy2))
            .map(|c| dec!(0.5) * c)
            .and_then(|c| (-metrics.modified_duration * dy).checked_add(c)),
        "price change estimate",
    )?;
    checked(relative.checked_mul(metrics.price), "price change estimate")
}

/// Reinvestment risk falls as duration lengthens: coupons are a smaller
/// share of a long bond's value.
pub fn reinvestment_risk(macaulay_duration: Decimal) -> RiskLevel {
    if macaulay_duration < dec!(3) {
        RiskLevel::High
    } else if macaulay_duration <= dec!(7) {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}

/// Risk metrics wrapped with methodology and assumptions. The yield is
/// solved from the market price when the input does not carry one.
pub fn calculate_risk(input: &RiskInput) -> BondAnalyticsResult<ComputationOutput<RiskMetrics>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    input.bond.validate()?;
    let yield_pct = match input.yield_pct {
        Some(y) => y,
        None => yields::yield_from_price(&input.bond)?
            .require_converged()?
            .yield_pct,
    };

    let metrics = risk_metrics(&input.bond, yield_pct)?;

    if metrics.interest_rate_risk == RiskLevel::High {
        warnings.push(format!(
            "Modified duration {} exceeds 7: high interest-rate risk",
            metrics.modified_duration.round_dp(4)
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "payment_frequency": input.bond.payment_frequency,
        "effective_duration_shift_bps": "10",
        "settlement": "on a coupon date (no accrued interest)",
    });

    Ok(with_metadata(
        "Macaulay/modified duration, convexity, DV01 and effective duration",
        &assumptions,
        warnings,
        elapsed,
        metrics,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
