use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;

use super::reinvestment::{project_reinvestment, RateScenario, ReinvestmentProjection};
use crate::curve::YieldCurve;
use crate::error::BondAnalyticsError;
use crate::fixed_income::bonds::{MAX_AMOUNT, MAX_YEARS_TO_MATURITY};
use crate::fixed_income::{cashflows, Bond};
use crate::math::{check_weights, compound, round_to_cents};
use crate::types::{percent_to_rate, with_metadata, ComputationOutput, Money, Percent, Years};
use crate::BondAnalyticsResult;

/// Most rungs a ladder may have.
pub const MAX_RUNGS: u32 = 120;

/// Tolerance on the sum of rung weights.
const WEIGHT_TOLERANCE: Decimal = dec!(0.000001);

fn default_payment_frequency() -> u8 {
    2
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LadderInput {
    pub total_investment: Money,
    pub rung_count: u32,
    /// Longest rung maturity in years
    pub max_maturity: Years,
    /// Explicit rung maturities (default: evenly spaced max/N .. max)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maturities: Option<Vec<Years>>,
    /// Share of the investment per rung (default: equal split)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<Decimal>>,
    /// Coupon frequency of every rung
    #[serde(default = "default_payment_frequency")]
    pub payment_frequency: u8,
}

/// A par bond bought at the curve rate for its maturity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LadderRung {
    pub maturity: Years,
    pub principal: Money,
    /// Curve rate at `maturity`, used as the coupon (percent)
    pub rate: Percent,
    pub payment_frequency: u8,
    pub periodic_income: Money,
    pub annual_income: Money,
}

impl LadderRung {
    /// The rung as a par bond: face = price = principal, coupon = rate.
    pub fn bond(&self) -> Bond {
        Bond::new(self.principal, self.rate, self.maturity, self.payment_frequency)
            .with_market_price(self.principal)
    }
}

/// Cash received across all rungs at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeEvent {
    pub time_years: Years,
    pub coupon_income: Money,
    pub principal_returned: Money,
    pub total: Money,
    /// Discounted at the curve rate for `time_years`
    pub present_value: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ladder {
    pub rungs: Vec<LadderRung>,
    pub income_schedule: Vec<IncomeEvent>,
    pub reinvestment_scenarios: Vec<ReinvestmentProjection>,
    pub total_principal: Money,
    /// Principal-weighted maturity (years)
    pub weighted_average_maturity: Years,
    /// Principal-weighted rung rate (percent)
    pub weighted_average_yield: Percent,
    /// Coupon income per year before any rung matures
    pub annual_income: Money,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Split an investment into rungs priced off `curve`, merge their cash flows
/// into one income schedule and project reinvestment of matured principal.
pub fn build_ladder(
    input: &LadderInput,
    curve: &YieldCurve,
) -> BondAnalyticsResult<ComputationOutput<Ladder>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;
    let maturities = rung_maturities(input)?;
    let principals = rung_principals(input)?;

    let freq = Decimal::from(input.payment_frequency);
    let mut rungs = Vec::with_capacity(maturities.len());
    for (maturity, principal) in maturities.into_iter().zip(principals) {
        let rate = curve.rate_at(maturity)?;
        // Rungs are par bonds, so the curve rate becomes their coupon.
        if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
            return Err(BondAnalyticsError::invalid_input(
                format!("curve rate at {maturity}y"),
                "a rate between 0% and 100% for a par rung",
                rate,
            ));
        }
        let annual_income = principal * percent_to_rate(rate);
        rungs.push(LadderRung {
            maturity,
            principal,
            rate,
            payment_frequency: input.payment_frequency,
            periodic_income: annual_income / freq,
            annual_income,
        });
    }

    let income_schedule = income_schedule(&rungs, curve)?;

    let reinvestment_scenarios = [RateScenario::Unchanged, RateScenario::Up100, RateScenario::Down100]
        .into_iter()
        .map(|scenario| project_reinvestment(&rungs, input.max_maturity, scenario))
        .collect::<Vec<_>>();

    if let Some(down) = reinvestment_scenarios
        .iter()
        .find(|p| p.scenario == RateScenario::Down100)
    {
        if down.reinvestment_rate.is_zero() {
            warnings.push("Down-100bp reinvestment rate floored at 0%".to_string());
        }
    }

    let total_principal: Money = rungs.iter().map(|r| r.principal).sum();
    let weighted_average_maturity =
        rungs.iter().map(|r| r.principal * r.maturity).sum::<Decimal>() / total_principal;
    let weighted_average_yield =
        rungs.iter().map(|r| r.principal * r.rate).sum::<Decimal>() / total_principal;
    let annual_income = rungs.iter().map(|r| r.annual_income).sum();

    debug!(
        rungs = rungs.len(),
        income_events = income_schedule.len(),
        %weighted_average_yield,
        "ladder built"
    );

    let output = Ladder {
        rungs,
        income_schedule,
        reinvestment_scenarios,
        total_principal,
        weighted_average_maturity,
        weighted_average_yield,
        annual_income,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "rung_pricing": "par bonds at the curve rate for each maturity",
        "payment_frequency": input.payment_frequency,
        "principal_rounding": "cents, residual on the last rung",
        "reinvestment": "matured principal at the longest rung rate plus scenario shift, floored at 0",
    });

    Ok(with_metadata(
        "Bond ladder: curve-priced rungs, merged income schedule, reinvestment scenarios",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_input(input: &LadderInput) -> BondAnalyticsResult<()> {
    if input.rung_count < 1 || input.rung_count > MAX_RUNGS {
        return Err(BondAnalyticsError::RungCount {
            requested: input.rung_count,
            max: MAX_RUNGS,
        });
    }
    if input.total_investment <= Decimal::ZERO || input.total_investment > MAX_AMOUNT {
        return Err(BondAnalyticsError::invalid_input(
            "total_investment",
            format!("a positive amount no greater than {MAX_AMOUNT}"),
            input.total_investment,
        ));
    }
    if input.max_maturity <= Decimal::ZERO || input.max_maturity > MAX_YEARS_TO_MATURITY {
        return Err(BondAnalyticsError::invalid_input(
            "max_maturity",
            format!("a positive number of years up to {MAX_YEARS_TO_MATURITY}"),
            input.max_maturity,
        ));
    }
    if !matches!(input.payment_frequency, 1 | 2 | 4 | 12) {
        return Err(BondAnalyticsError::invalid_input(
            "payment_frequency",
            "1, 2, 4, or 12",
            input.payment_frequency,
        ));
    }
    Ok(())
}

fn rung_maturities(input: &LadderInput) -> BondAnalyticsResult<Vec<Years>> {
    let n = input.rung_count as usize;
    let Some(explicit) = &input.maturities else {
        let step = input.max_maturity / Decimal::from(input.rung_count);
        return Ok((1..=input.rung_count)
            .map(|k| if k == input.rung_count { input.max_maturity } else { step * Decimal::from(k) })
            .collect());
    };

    if explicit.len() != n {
        return Err(BondAnalyticsError::invalid_input(
            "maturities",
            format!("{n} maturities (one per rung)"),
            explicit.len(),
        ));
    }
    for (i, &m) in explicit.iter().enumerate() {
        if m <= Decimal::ZERO || m > input.max_maturity {
            return Err(BondAnalyticsError::invalid_input(
                format!("maturities[{i}]"),
                format!("a maturity in (0, {}]", input.max_maturity),
                m,
            ));
        }
        if i > 0 && m <= explicit[i - 1] {
            return Err(BondAnalyticsError::invalid_input(
                format!("maturities[{i}]"),
                format!("a maturity greater than {}", explicit[i - 1]),
                m,
            ));
        }
    }
    Ok(explicit.clone())
}

/// Principal per rung rounded to cents; the last rung takes the residual so
/// the rungs add up to the investment exactly.
fn rung_principals(input: &LadderInput) -> BondAnalyticsResult<Vec<Money>> {
    let n = input.rung_count as usize;
    let weights = match &input.weights {
        Some(w) => {
            if w.len() != n {
                return Err(BondAnalyticsError::invalid_input(
                    "weights",
                    format!("{n} weights (one per rung)"),
                    w.len(),
                ));
            }
            check_weights("weights", w, WEIGHT_TOLERANCE)?;
            if let Some(i) = w.iter().position(|x| x.is_zero()) {
                return Err(BondAnalyticsError::invalid_input(
                    format!("weights[{i}]"),
                    "a positive weight",
                    w[i],
                ));
            }
            w.clone()
        }
        None => vec![Decimal::ONE / Decimal::from(input.rung_count); n],
    };

    let mut principals: Vec<Money> = weights[..n - 1]
        .iter()
        .map(|w| round_to_cents(input.total_investment * w))
        .collect();
    let allocated: Money = principals.iter().sum();
    principals.push(input.total_investment - allocated);

    if let Some(i) = principals.iter().position(|p| *p <= Decimal::ZERO) {
        return Err(BondAnalyticsError::ConstraintViolation {
            constraint: format!("rung {} principal must be at least one cent", i + 1),
            limit: dec!(0.01),
            actual: principals[i],
        });
    }

    Ok(principals)
}

/// Union of all rung cash flows keyed by payment time.
fn income_schedule(rungs: &[LadderRung], curve: &YieldCurve) -> BondAnalyticsResult<Vec<IncomeEvent>> {
    let mut by_time: BTreeMap<Decimal, (Money, Money)> = BTreeMap::new();
    for rung in rungs {
        for cf in cashflows::cash_flows(&rung.bond())? {
            let entry = by_time.entry(cf.time_years).or_insert((Decimal::ZERO, Decimal::ZERO));
            entry.0 += cf.coupon;
            entry.1 += cf.principal;
        }
    }

    let freq = rungs
        .first()
        .map(|r| Decimal::from(r.payment_frequency))
        .unwrap_or(Decimal::ONE);

    let mut schedule = Vec::with_capacity(by_time.len());
    for (time_years, (coupon_income, principal_returned)) in by_time {
        let total = coupon_income + principal_returned;
        let rate = percent_to_rate(curve.rate_at(time_years)?);
        let factor = compound(Decimal::ONE + rate / freq, time_years * freq)?;
        if factor.is_zero() {
            return Err(BondAnalyticsError::DivisionByZero {
                context: format!("ladder discount factor at {time_years}y"),
            });
        }
        schedule.push(IncomeEvent {
            time_years,
            coupon_income,
            principal_returned,
            total,
            present_value: total / factor,
        });
    }

    Ok(schedule)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::YieldCurvePoint;
    use pretty_assertions::assert_eq;

    fn curve() -> YieldCurve {
        YieldCurve::new(vec![
            YieldCurvePoint::new(dec!(1), dec!(4.0)),
            YieldCurvePoint::new(dec!(5), dec!(4.5)),
            YieldCurvePoint::new(dec!(10), dec!(4.2)),
        ])
        .unwrap()
    }

    fn input(total: Money, rungs: u32, max: Years) -> LadderInput {
        LadderInput {
            total_investment: total,
            rung_count: rungs,
            max_maturity: max,
            maturities: None,
            weights: None,
            payment_frequency: 2,
        }
    }

    #[test]
    fn test_five_rung_ladder() {
        let out = build_ladder(&input(dec!(100000), 5, dec!(10)), &curve()).unwrap();
        let ladder = &out.result;
        let maturities: Vec<Decimal> = ladder.rungs.iter().map(|r| r.maturity).collect();
        assert_eq!(maturities, vec![dec!(2), dec!(4), dec!(6), dec!(8), dec!(10)]);
        assert!(ladder.rungs.iter().all(|r| r.principal == dec!(20000)));
        assert_eq!(ladder.total_principal, dec!(100000));
        assert_eq!(ladder.weighted_average_maturity, dec!(6));
        assert_eq!(ladder.rungs[0].rate, dec!(4.125));
        assert_eq!(ladder.reinvestment_scenarios.len(), 3);
    }

    #[test]
    fn test_rounding_residual_on_last_rung() {
        let out = build_ladder(&input(dec!(100000), 3, dec!(9)), &curve()).unwrap();
        let principals: Vec<Decimal> = out.result.rungs.iter().map(|r| r.principal).collect();
        assert_eq!(principals, vec![dec!(33333.33), dec!(33333.33), dec!(33333.34)]);
    }

    #[test]
    fn test_income_schedule_merges_and_returns_principal() {
        let out = build_ladder(&input(dec!(100000), 5, dec!(10)), &curve()).unwrap();
        let schedule = &out.result.income_schedule;
        // semiannual payments out to 10y, shared dates merged
        assert_eq!(schedule.len(), 20);
        assert!(schedule.windows(2).all(|w| w[0].time_years < w[1].time_years));
        let returned: Money = schedule.iter().map(|e| e.principal_returned).sum();
        assert_eq!(returned, dec!(100000));
        assert!(schedule.iter().all(|e| e.present_value < e.total));
        // first coupon date pays every rung
        let first_coupons: Money = out.result.rungs.iter().map(|r| r.periodic_income).sum();
        assert!((schedule[0].coupon_income - first_coupons).abs() < dec!(0.0000001));
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let mut i = input(dec!(100000), 2, dec!(4));
        i.weights = Some(vec![dec!(0.5), dec!(0.6)]);
        let err = build_ladder(&i, &curve()).unwrap_err();
        assert!(matches!(err, BondAnalyticsError::Allocation { .. }));
    }

    #[test]
    fn test_zero_weight_rejected() {
        let mut i = input(dec!(100000), 2, dec!(4));
        i.weights = Some(vec![Decimal::ZERO, Decimal::ONE]);
        let err = build_ladder(&i, &curve()).unwrap_err();
        assert!(matches!(err, BondAnalyticsError::InvalidInput { .. }));
    }

    #[test]
    fn test_custom_weights_and_maturities() {
        let mut i = input(dec!(50000), 2, dec!(10));
        i.weights = Some(vec![dec!(0.3), dec!(0.7)]);
        i.maturities = Some(vec![dec!(1), dec!(10)]);
        let ladder = build_ladder(&i, &curve()).unwrap().result;
        assert_eq!(ladder.rungs[0].principal, dec!(15000));
        assert_eq!(ladder.rungs[1].principal, dec!(35000));
        assert_eq!(ladder.rungs[1].rate, dec!(4.2));
    }

    #[test]
    fn test_unordered_maturities_rejected() {
        let mut i = input(dec!(50000), 2, dec!(10));
        i.maturities = Some(vec![dec!(5), dec!(3)]);
        assert!(build_ladder(&i, &curve()).is_err());
    }

    #[test]
    fn test_zero_rungs_rejected() {
        let err = build_ladder(&input(dec!(100000), 0, dec!(10)), &curve()).unwrap_err();
        assert!(matches!(err, BondAnalyticsError::RungCount { requested: 0, .. }));
    }

    #[test]
    fn test_non_positive_investment_rejected() {
        let err = build_ladder(&input(Decimal::ZERO, 5, dec!(10)), &curve()).unwrap_err();
        assert!(matches!(err, BondAnalyticsError::InvalidInput { .. }));
    }

    #[test]
    fn test_investment_too_small_for_rungs() {
        let err = build_ladder(&input(dec!(0.02), 5, dec!(10)), &curve()).unwrap_err();
        assert!(matches!(err, BondAnalyticsError::ConstraintViolation { .. }));
    }

    #[test]
    fn test_rung_count_capped() {
        let err = build_ladder(&input(dec!(100000), 4_000_000_000, dec!(10)), &curve()).unwrap_err();
        assert!(matches!(
            err,
            BondAnalyticsError::RungCount { requested: 4_000_000_000, max: MAX_RUNGS }
        ));
    }

    #[test]
    fn test_max_maturity_capped() {
        let err = build_ladder(&input(dec!(100000), 5, dec!(1000)), &curve()).unwrap_err();
        assert!(matches!(err, BondAnalyticsError::InvalidInput { ref field, .. } if field == "max_maturity"));
    }

    #[test]
    fn test_negative_curve_rate_names_the_curve() {
        let negative = YieldCurve::new(vec![
            YieldCurvePoint::new(dec!(1), dec!(-0.5)),
            YieldCurvePoint::new(dec!(10), dec!(0.5)),
        ])
        .unwrap();
        let err = build_ladder(&input(dec!(100000), 5, dec!(10)), &negative).unwrap_err();
        match err {
            BondAnalyticsError::InvalidInput { field, .. } => assert_eq!(field, "curve rate at 2y"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
