//! Yield-to-maturity solving and simple yield measures.
//!
//! YTM is found by Newton-Raphson on the periodic rate, seeded with the
//! current yield. When Newton stalls (flat derivative, a step outside the
//! bracket, or no convergence within its iteration cap) the remaining budget
//! goes to bisection over the annual bracket [-99%, 100%], and a bracketed
//! root is polished with Newton steps from the bisection midpoint. Both
//! routines are public and can be driven independently through
//! [`YieldTarget`].

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::bonds::Bond;
use super::cashflows::{self, CashFlowEvent};
use super::present_value::{self, periodic_rate};
use crate::error::BondAnalyticsError;
use crate::math::compound;
use crate::types::{percent_to_rate, rate_to_percent, Money, Percent};
use crate::BondAnalyticsResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Relative price error |P - target| / target accepted as converged.
const PRICE_TOLERANCE: Decimal = dec!(0.000001);

/// Newton stops only once its next step would move the periodic rate by less
/// than this. A price match alone leaves yields near 0% too loose.
const RATE_TOLERANCE: Decimal = dec!(0.0000000001);

/// Newton-Raphson steps before falling back to bisection.
const NEWTON_MAX_ITERATIONS: u32 = 8;

/// Iteration budget shared by both methods.
const MAX_ITERATIONS: u32 = 50;

/// |dP/dr| below this is treated as a stalled Newton step.
const MIN_DERIVATIVE: Decimal = dec!(0.000000000001);

/// Price within half a cent of face is quoted at par.
const PAR_TOLERANCE: Decimal = dec!(0.005);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Solver settings. Defaults: 1e-6 relative price tolerance, 1e-10 Newton
/// step on the periodic rate, 8 Newton steps, 50 iterations in total,
/// bisection bracket [-99%, 100%].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub tolerance: Decimal,
    pub rate_tolerance: Decimal,
    pub newton_max_iterations: u32,
    pub max_iterations: u32,
    /// Lower end of the bisection bracket (annual percent)
    pub lower_bound: Percent,
    /// Upper end of the bisection bracket (annual percent)
    pub upper_bound: Percent,
    pub min_derivative: Decimal,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            tolerance: PRICE_TOLERANCE,
            rate_tolerance: RATE_TOLERANCE,
            newton_max_iterations: NEWTON_MAX_ITERATIONS,
            max_iterations: MAX_ITERATIONS,
            lower_bound: dec!(-99),
            upper_bound: dec!(100),
            min_derivative: MIN_DERIVATIVE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverMethod {
    NewtonRaphson,
    Bisection,
}

/// Result of a yield solve. A non-converged solution still carries the best
/// estimate found and the iterations spent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldSolution {
    /// Annualised yield in percent
    pub yield_pct: Percent,
    pub iterations_used: u32,
    pub converged: bool,
    /// Method that produced `yield_pct`
    pub method: SolverMethod,
    /// |P(yield) - target| / target at `yield_pct`
    pub relative_error: Decimal,
}

impl YieldSolution {
    /// Turn a non-converged solution into `YieldNotFound`.
    pub fn require_converged(self) -> BondAnalyticsResult<Self> {
        if self.converged {
            Ok(self)
        } else {
            Err(BondAnalyticsError::YieldNotFound {
                iterations: self.iterations_used,
                best_estimate: self.yield_pct,
                relative_error: self.relative_error,
            })
        }
    }
}

/// Premium / discount / par relative to face value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceQuote {
    Premium,
    Discount,
    Par,
}

impl PriceQuote {
    pub fn classify(price: Money, face_value: Money) -> Self {
        if (price - face_value).abs() < PAR_TOLERANCE {
            PriceQuote::Par
        } else if price > face_value {
            PriceQuote::Premium
        } else {
            PriceQuote::Discount
        }
    }
}

/// A schedule and the price the solved yield has to reproduce.
#[derive(Debug, Clone, Copy)]
pub struct YieldTarget<'a> {
    events: &'a [CashFlowEvent],
    payment_frequency: u8,
    target_price: Money,
}

impl<'a> YieldTarget<'a> {
    pub fn new(
        events: &'a [CashFlowEvent],
        payment_frequency: u8,
        target_price: Money,
    ) -> BondAnalyticsResult<Self> {
        if events.is_empty() {
            return Err(BondAnalyticsError::InvalidBondTerms {
                field: "cash_flows".into(),
                reason: "schedule has no payments".into(),
            });
        }
        if target_price <= Decimal::ZERO {
            return Err(BondAnalyticsError::invalid_input(
                "market_price",
                "a positive market price",
                target_price,
            ));
        }
        Ok(YieldTarget {
            events,
            payment_frequency,
            target_price,
        })
    }

    fn frequency(&self) -> Decimal {
        Decimal::from(self.payment_frequency)
    }

    /// |price - target| / target, saturating at `Decimal::MAX` when a price
    /// from the bottom of the bracket dwarfs a tiny target.
    fn relative_error(&self, price: Money) -> Decimal {
        price
            .checked_sub(self.target_price)
            .and_then(|diff| diff.abs().checked_div(self.target_price))
            .unwrap_or(Decimal::MAX)
    }

    /// Price at an annual yield, or `None` when the discounting blows up
    /// numerically (only happens deep in negative-yield territory).
    fn price_at(&self, yield_pct: Percent) -> BondAnalyticsResult<Option<Money>> {
        match present_value::present_value(
            self.events,
            periodic_rate(yield_pct, self.payment_frequency),
        ) {
            Ok(price) => Ok(Some(price)),
            Err(e) if is_numeric_failure(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn is_numeric_failure(e: &BondAnalyticsError) -> bool {
    matches!(
        e,
        BondAnalyticsError::NumericalOverflow { .. }
            | BondAnalyticsError::DivisionByZero { .. }
            | BondAnalyticsError::InvalidRate { .. }
    )
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Solve the yield to maturity from the bond's market price with the
/// default [`SolverConfig`].
pub fn yield_from_price(bond: &Bond) -> BondAnalyticsResult<YieldSolution> {
    yield_from_price_with_config(bond, &SolverConfig::default())
}

pub fn yield_from_price_with_config(
    bond: &Bond,
    config: &SolverConfig,
) -> BondAnalyticsResult<YieldSolution> {
    bond.validate()?;
    let market_price = bond.require_market_price()?;
    let schedule = cashflows::cash_flows(bond)?;
    let target = YieldTarget::new(&schedule, bond.payment_frequency, market_price)?;

    let seed = match bond.current_yield {
        Some(cy) => cy,
        None => current_yield(bond)?,
    };

    let newton_config = SolverConfig {
        newton_max_iterations: config.newton_max_iterations.min(config.max_iterations),
        ..config.clone()
    };
    let newton = newton_raphson(&target, seed, &newton_config)?;
    if newton.converged {
        debug!(
            yield_pct = %newton.yield_pct,
            iterations = newton.iterations_used,
            "YTM converged via Newton-Raphson"
        );
        return Ok(newton);
    }

    debug!(
        iterations = newton.iterations_used,
        "Newton-Raphson stalled; falling back to bisection"
    );
    let remaining = config.max_iterations.saturating_sub(newton.iterations_used);
    let mut solution = bisection(&target, remaining, config)?;
    solution.iterations_used += newton.iterations_used;

    if solution.converged {
        polish(&target, &mut solution, config)?;
    } else {
        if newton.relative_error < solution.relative_error {
            solution.yield_pct = newton.yield_pct;
            solution.relative_error = newton.relative_error;
            solution.method = SolverMethod::NewtonRaphson;
        }
        warn!(
            iterations = solution.iterations_used,
            best_estimate = %solution.yield_pct,
            "YTM did not converge"
        );
    }

    Ok(solution)
}

/// Refine a bisection root with Newton steps from the midpoint, within what
/// is left of the iteration budget. The bisection answer stands if the
/// refinement stalls.
fn polish(
    target: &YieldTarget<'_>,
    solution: &mut YieldSolution,
    config: &SolverConfig,
) -> BondAnalyticsResult<()> {
    let remaining = config.max_iterations.saturating_sub(solution.iterations_used);
    if remaining == 0 {
        return Ok(());
    }
    let polish_config = SolverConfig {
        newton_max_iterations: config.newton_max_iterations.min(remaining),
        ..config.clone()
    };
    let refined = newton_raphson(target, solution.yield_pct, &polish_config)?;
    solution.iterations_used += refined.iterations_used;
    if refined.converged {
        solution.yield_pct = refined.yield_pct;
        solution.relative_error = refined.relative_error;
    }
    Ok(())
}

/// Newton-Raphson on the periodic rate, starting from `seed_pct` (annual
/// percent). Converges when the price is within `tolerance` and the next step
/// is below `rate_tolerance`; returns `converged = false` as soon as the
/// method stalls.
pub fn newton_raphson(
    target: &YieldTarget<'_>,
    seed_pct: Percent,
    config: &SolverConfig,
) -> BondAnalyticsResult<YieldSolution> {
    let freq = target.frequency();
    let lower = percent_to_rate(config.lower_bound) / freq;
    let upper = percent_to_rate(config.upper_bound) / freq;

    let seed = percent_to_rate(seed_pct) / freq;
    let mut r = if seed > lower && seed < upper {
        seed
    } else {
        Decimal::ZERO
    };
    let mut best = (r, Decimal::MAX);

    let to_solution = |r: Decimal, iterations: u32, converged: bool, error: Decimal| YieldSolution {
        yield_pct: rate_to_percent(r * freq),
        iterations_used: iterations,
        converged,
        method: SolverMethod::NewtonRaphson,
        relative_error: error,
    };

    for iteration in 1..=config.newton_max_iterations {
        let (price, dprice) = match present_value::price_and_derivative(target.events, r) {
            Ok(v) => v,
            Err(e) if is_numeric_failure(&e) => {
                return Ok(to_solution(best.0, iteration, false, best.1));
            }
            Err(e) => return Err(e),
        };

        let error = target.relative_error(price);
        if error < best.1 {
            best = (r, error);
        }
        let priced = error < config.tolerance;
        if dprice.abs() < config.min_derivative {
            return Ok(to_solution(best.0, iteration, priced, best.1));
        }

        let step = match price
            .checked_sub(target.target_price)
            .and_then(|diff| diff.checked_div(dprice))
        {
            Some(step) => step,
            None => return Ok(to_solution(best.0, iteration, false, best.1)),
        };
        if priced && step.abs() < config.rate_tolerance {
            return Ok(to_solution(r, iteration, true, error));
        }

        let next = match r.checked_sub(step) {
            Some(next) if next > lower && next < upper => next,
            _ => return Ok(to_solution(best.0, iteration, false, best.1)),
        };
        r = next;
    }

    Ok(to_solution(
        best.0,
        config.newton_max_iterations,
        false,
        best.1,
    ))
}

/// Bisection on the annual yield over `[lower_bound, upper_bound]`, using at
/// most `max_iterations` midpoint evaluations. Price falls as yield rises, so
/// a midpoint priced above target moves the lower end up.
pub fn bisection(
    target: &YieldTarget<'_>,
    max_iterations: u32,
    config: &SolverConfig,
) -> BondAnalyticsResult<YieldSolution> {
    let solution = |yield_pct: Percent, iterations: u32, converged: bool, error: Decimal| {
        YieldSolution {
            yield_pct,
            iterations_used: iterations,
            converged,
            method: SolverMethod::Bisection,
            relative_error: error,
        }
    };
    // A blown-up price sits above any finite target.
    let above_target = |price: Option<Money>| price.map_or(true, |p| p > target.target_price);
    let error_of = |price: Option<Money>| price.map_or(Decimal::MAX, |p| target.relative_error(p));

    let mut lo = config.lower_bound;
    let mut hi = config.upper_bound;

    let price_lo = target.price_at(lo)?;
    let price_hi = target.price_at(hi)?;

    if error_of(price_lo) < config.tolerance {
        return Ok(solution(lo, 0, true, error_of(price_lo)));
    }
    if error_of(price_hi) < config.tolerance {
        return Ok(solution(hi, 0, true, error_of(price_hi)));
    }
    if !above_target(price_lo) {
        // Target exceeds the price at the lowest admissible yield.
        return Ok(solution(lo, 0, false, error_of(price_lo)));
    }
    if above_target(price_hi) {
        // Target is below the price at the highest admissible yield.
        return Ok(solution(hi, 0, false, error_of(price_hi)));
    }

    let mut best = if error_of(price_lo) < error_of(price_hi) {
        (lo, error_of(price_lo))
    } else {
        (hi, error_of(price_hi))
    };

    for iteration in 1..=max_iterations {
        let mid = (lo + hi) / dec!(2);
        let price = target.price_at(mid)?;
        let error = error_of(price);
        if error < best.1 {
            best = (mid, error);
        }
        if error < config.tolerance {
            return Ok(solution(mid, iteration, true, error));
        }
        if above_target(price) {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    Ok(solution(best.0, max_iterations, false, best.1))
}

/// Approximate YTM = (C + (F - P) / n) / ((F + P) / 2), in percent.
/// Fallback for callers when the solver reports no convergence.
pub fn approximate_ytm(bond: &Bond) -> BondAnalyticsResult<Percent> {
    bond.validate()?;
    let price = bond.require_market_price()?;
    let numerator = bond.annual_coupon() + (bond.face_value - price) / bond.years_to_maturity;
    let denominator = (bond.face_value + price) / dec!(2);
    Ok(rate_to_percent(numerator / denominator))
}

/// Current yield = annual coupon / market price, in percent.
pub fn current_yield(bond: &Bond) -> BondAnalyticsResult<Percent> {
    let price = bond.require_market_price()?;
    if price <= Decimal::ZERO {
        return Err(BondAnalyticsError::invalid_input(
            "market_price",
            "a positive market price",
            price,
        ));
    }
    Ok(rate_to_percent(bond.annual_coupon() / price))
}

/// Effective annual yield = (1 + y/f)^f - 1, in percent.
pub fn effective_annual_yield(yield_pct: Percent, payment_frequency: u8) -> BondAnalyticsResult<Percent> {
    let base = Decimal::ONE + periodic_rate(yield_pct, payment_frequency);
    if base <= Decimal::ZERO {
        return Err(BondAnalyticsError::InvalidRate {
            rate: base - Decimal::ONE,
        });
    }
    let growth = compound(base, Decimal::from(payment_frequency))?;
    Ok(rate_to_percent(growth - Decimal::ONE))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_income::present_value::price_from_yield;
    use rust_decimal_macros::dec;

    fn assert_close(actual: Decimal, expected: Decimal, tolerance: Decimal, label: &str) {
        let diff = (actual - expected).abs();
        assert!(
            diff <= tolerance,
            "{label}: expected ~{expected}, got {actual} (diff {diff} > tolerance {tolerance})"
        );
    }

    fn discount_bond() -> Bond {
        Bond::new(dec!(1000), dec!(5), dec!(10), 2).with_market_price(dec!(950))
    }

    #[test]
    fn test_ytm_discount_bond_scenario() {
        let solution = yield_from_price(&discount_bond()).unwrap();
        assert!(solution.converged);
        assert_eq!(solution.method, SolverMethod::NewtonRaphson);
        assert_close(solution.yield_pct, dec!(5.6617), dec!(0.001), "ytm");
        assert!(solution.iterations_used <= NEWTON_MAX_ITERATIONS);
        assert!(solution.relative_error < PRICE_TOLERANCE);
    }

    #[test]
    fn test_ytm_par_bond() {
        let bond = Bond::new(dec!(1000), dec!(6), dec!(5), 2).with_market_price(dec!(1000));
        let solution = yield_from_price(&bond).unwrap();
        assert!(solution.converged);
        assert_close(solution.yield_pct, dec!(6), dec!(0.0001), "par ytm");
    }

    #[test]
    fn test_ytm_premium_bond_below_coupon() {
        let bond = Bond::new(dec!(1000), dec!(8), dec!(10), 2).with_market_price(dec!(1100));
        let solution = yield_from_price(&bond).unwrap();
        assert!(solution.converged);
        assert!(solution.yield_pct < dec!(8));
    }

    #[test]
    fn test_deep_discount_zero_falls_back_to_bisection() {
        let bond = Bond::new(dec!(1000), Decimal::ZERO, dec!(30), 12);
        let price = price_from_yield(&bond, dec!(20)).unwrap();
        let solution = yield_from_price(&bond.with_market_price(price)).unwrap();
        assert!(solution.converged);
        assert_eq!(solution.method, SolverMethod::Bisection);
        assert!(solution.iterations_used > NEWTON_MAX_ITERATIONS);
        assert!(solution.iterations_used <= MAX_ITERATIONS);
        assert_close(solution.yield_pct, dec!(20), dec!(0.001), "zero ytm");
    }

    #[test]
    fn test_bisection_independently() {
        let bond = Bond::new(dec!(1000), dec!(4), dec!(7), 1);
        let price = price_from_yield(&bond, dec!(3)).unwrap();
        let schedule = cashflows::cash_flows(&bond).unwrap();
        let target = YieldTarget::new(&schedule, 1, price).unwrap();
        let solution = bisection(&target, 50, &SolverConfig::default()).unwrap();
        assert!(solution.converged);
        assert_close(solution.yield_pct, dec!(3), dec!(0.001), "bisection ytm");
    }

    #[test]
    fn test_newton_independently() {
        let bond = Bond::new(dec!(1000), dec!(4), dec!(7), 1);
        let price = price_from_yield(&bond, dec!(3)).unwrap();
        let schedule = cashflows::cash_flows(&bond).unwrap();
        let target = YieldTarget::new(&schedule, 1, price).unwrap();
        let solution = newton_raphson(&target, dec!(4), &SolverConfig::default()).unwrap();
        assert!(solution.converged);
        assert_close(solution.yield_pct, dec!(3), dec!(0.0001), "newton ytm");
    }

    #[test]
    fn test_iteration_budget_exhausted_reports_not_converged() {
        let config = SolverConfig {
            newton_max_iterations: 0,
            max_iterations: 3,
            ..SolverConfig::default()
        };
        let solution = yield_from_price_with_config(&discount_bond(), &config).unwrap();
        assert!(!solution.converged);
        assert_eq!(solution.iterations_used, 3);

        let err = solution.require_converged().unwrap_err();
        match err {
            BondAnalyticsError::YieldNotFound { iterations, .. } => assert_eq!(iterations, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unreachable_price_not_converged() {
        let bond = Bond::new(dec!(1000), dec!(5), dec!(10), 2).with_market_price(dec!(1000000000000));
        let solution = yield_from_price(&bond).unwrap();
        assert!(!solution.converged);
        assert!(solution.iterations_used <= MAX_ITERATIONS);
    }

    #[test]
    fn test_long_quarterly_zero_at_high_yield() {
        // Prices near 0.06: the bottom of the bracket reprices at ~1e11x the target
        let bond = Bond::new(dec!(1000), Decimal::ZERO, dec!(50), 4);
        let price = price_from_yield(&bond, dec!(20)).unwrap();
        assert!(price < dec!(0.1));
        let solution = yield_from_price(&bond.with_market_price(price)).unwrap();
        assert!(solution.converged);
        assert!(solution.iterations_used <= MAX_ITERATIONS);
        assert_close(solution.yield_pct, dec!(20), dec!(0.002), "zero ytm");
    }

    #[test]
    fn test_relative_error_saturates() {
        let bond = Bond::new(dec!(1000), Decimal::ZERO, Decimal::ONE, 1);
        let schedule = cashflows::cash_flows(&bond).unwrap();
        let target = YieldTarget::new(&schedule, 1, dec!(0.0000000001)).unwrap();
        assert_eq!(target.relative_error(Decimal::MAX), Decimal::MAX);
        assert_eq!(target.relative_error(dec!(0.0000000001)), Decimal::ZERO);
    }

    #[test]
    fn test_low_yield_round_trip_is_relatively_tight() {
        for bond in [
            Bond::new(dec!(1000), dec!(3), Decimal::ONE, 1),
            Bond::new(dec!(1000), Decimal::ZERO, dec!(7.4), 1),
            Bond::new(dec!(1000), dec!(2), dec!(0.5), 2),
        ] {
            let price = price_from_yield(&bond, dec!(0.01)).unwrap();
            let solution = yield_from_price(&bond.clone().with_market_price(price)).unwrap();
            assert!(solution.converged);
            let rel = (solution.yield_pct - dec!(0.01)).abs() / dec!(0.01);
            assert!(rel < dec!(0.0001), "relative yield error {rel} for {bond:?}");
        }
    }

    #[test]
    fn test_missing_market_price_is_invalid_input() {
        let bond = Bond::new(dec!(1000), dec!(5), dec!(10), 2);
        let err = yield_from_price(&bond).unwrap_err();
        assert!(matches!(err, BondAnalyticsError::InvalidInput { .. }));
    }

    #[test]
    fn test_approximate_ytm() {
        // (50 + 50/10) / 975 = 5.6410...%
        let approx = approximate_ytm(&discount_bond()).unwrap();
        assert_close(approx, dec!(5.641026), dec!(0.00001), "approx ytm");
    }

    #[test]
    fn test_current_yield() {
        let cy = current_yield(&discount_bond()).unwrap();
        assert_close(cy, dec!(5.263158), dec!(0.00001), "current yield");
    }

    #[test]
    fn test_effective_annual_yield() {
        // (1.025)^2 - 1 = 5.0625%
        let eay = effective_annual_yield(dec!(5), 2).unwrap();
        assert_eq!(eay, dec!(5.0625));
    }

    #[test]
    fn test_price_quote() {
        assert_eq!(PriceQuote::classify(dec!(950), dec!(1000)), PriceQuote::Discount);
        assert_eq!(PriceQuote::classify(dec!(1050), dec!(1000)), PriceQuote::Premium);
        assert_eq!(PriceQuote::classify(dec!(1000.001), dec!(1000)), PriceQuote::Par);
    }
}
