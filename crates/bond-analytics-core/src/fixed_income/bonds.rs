//! Bond terms and the all-in-one bond analysis.
//!
//! `analyze_bond` ties the schedule, discounting, yield solver and risk
//! metrics together: it prices the bond from a supplied yield, or solves the
//! yield from the market price, and reports duration and convexity at that
//! yield.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::warn;

use super::cashflows::{self, CashFlowEvent};
use super::duration::{self, RiskMetrics};
use super::present_value::{self, periodic_rate};
use super::yields::{self, PriceQuote, YieldSolution};
use crate::error::BondAnalyticsError;
use crate::types::{with_metadata, ComputationOutput, Money, Percent, Years};
use crate::BondAnalyticsResult;

/// Largest face value or market price accepted; keeps coupon and
/// discounting arithmetic inside Decimal range.
pub const MAX_AMOUNT: Money = dec!(1000000000000000);

/// Longest maturity accepted, in years.
pub const MAX_YEARS_TO_MATURITY: Years = dec!(100);

fn default_payment_frequency() -> u8 {
    2
}

/// Terms of a fixed-rate bullet bond.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bond {
    /// Par / face value (typically 1000)
    pub face_value: Money,
    /// Annual coupon rate in percent (5 = 5%)
    pub coupon_rate: Percent,
    /// Market price; needed only when solving for yield
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_price: Option<Money>,
    /// Years remaining to maturity (fractional allowed)
    pub years_to_maturity: Years,
    /// Coupons per year: 1 = annual, 2 = semi-annual, 4 = quarterly, 12 = monthly
    #[serde(default = "default_payment_frequency")]
    pub payment_frequency: u8,
    /// Explicit current yield in percent. Seeds the yield solver, and stands
    /// in as the bond's yield when no market price is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_yield: Option<Percent>,
    /// Valuation date used to stamp calendar dates on the schedule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement_date: Option<NaiveDate>,
}

impl Bond {
    pub fn new(
        face_value: Money,
        coupon_rate: Percent,
        years_to_maturity: Years,
        payment_frequency: u8,
    ) -> Self {
        Bond {
            face_value,
            coupon_rate,
            market_price: None,
            years_to_maturity,
            payment_frequency,
            current_yield: None,
            settlement_date: None,
        }
    }

    pub fn with_market_price(mut self, market_price: Money) -> Self {
        self.market_price = Some(market_price);
        self
    }

    pub fn with_current_yield(mut self, current_yield: Percent) -> Self {
        self.current_yield = Some(current_yield);
        self
    }

    pub fn with_settlement_date(mut self, settlement_date: NaiveDate) -> Self {
        self.settlement_date = Some(settlement_date);
        self
    }

    pub fn frequency(&self) -> Decimal {
        Decimal::from(self.payment_frequency)
    }

    /// Coupon paid each period.
    pub fn periodic_coupon(&self) -> Money {
        self.annual_coupon() / self.frequency()
    }

    pub fn annual_coupon(&self) -> Money {
        self.face_value * self.coupon_rate / Decimal::ONE_HUNDRED
    }

    /// The market price, or an error naming the missing field.
    pub fn require_market_price(&self) -> BondAnalyticsResult<Money> {
        self.market_price.ok_or_else(|| {
            BondAnalyticsError::invalid_input("market_price", "a positive market price", "none")
        })
    }

    pub fn validate(&self) -> BondAnalyticsResult<()> {
        if self.face_value <= Decimal::ZERO || self.face_value > MAX_AMOUNT {
            return Err(BondAnalyticsError::invalid_input(
                "face_value",
                format!("a positive amount no greater than {MAX_AMOUNT}"),
                self.face_value,
            ));
        }
        if self.coupon_rate < Decimal::ZERO || self.coupon_rate > Decimal::ONE_HUNDRED {
            return Err(BondAnalyticsError::invalid_input(
                "coupon_rate",
                "a percentage between 0 and 100",
                self.coupon_rate,
            ));
        }
        if self.years_to_maturity <= Decimal::ZERO || self.years_to_maturity > MAX_YEARS_TO_MATURITY {
            return Err(BondAnalyticsError::invalid_input(
                "years_to_maturity",
                format!("a positive number of years up to {MAX_YEARS_TO_MATURITY}"),
                self.years_to_maturity,
            ));
        }
        if !matches!(self.payment_frequency, 1 | 2 | 4 | 12) {
            return Err(BondAnalyticsError::invalid_input(
                "payment_frequency",
                "1, 2, 4, or 12",
                self.payment_frequency,
            ));
        }
        if let Some(price) = self.market_price {
            if price <= Decimal::ZERO || price > MAX_AMOUNT {
                return Err(BondAnalyticsError::invalid_input(
                    "market_price",
                    format!("a positive market price no greater than {MAX_AMOUNT}"),
                    price,
                ));
            }
        }
        if let Some(cy) = self.current_yield {
            if cy <= dec!(-100) {
                return Err(BondAnalyticsError::invalid_input(
                    "current_yield",
                    "a yield above -100%",
                    cy,
                ));
            }
        }
        Ok(())
    }
}

/// Input for a full bond analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondAnalysisInput {
    pub bond: Bond,
    /// Annual yield in percent. When absent the yield is solved from the
    /// bond's market price, or taken from its explicit current yield.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yield_pct: Option<Percent>,
}

/// How the analysis yield was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YieldSource {
    /// Supplied by the caller
    Supplied,
    /// Solved from the market price
    Solved,
    /// Solver did not converge; approximate YTM formula used
    Approximation,
    /// The bond's explicit current yield
    CurrentYield,
}

/// Output of a full bond analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondAnalysisOutput {
    /// Annual yield used for pricing and risk (percent)
    pub yield_pct: Percent,
    pub yield_source: YieldSource,
    /// PV of the schedule at `yield_pct`
    pub price: Money,
    /// Yield solver result, when a market price was available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yield_solution: Option<YieldSolution>,
    /// Approximate YTM = (C + (F - P)/n) / ((F + P)/2), when a market price was available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approximate_ytm: Option<Percent>,
    /// Annual coupon / market price (percent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_yield: Option<Percent>,
    /// (1 + y/f)^f - 1 (percent)
    pub effective_annual_yield: Percent,
    /// Premium / discount / par relative to face
    pub price_quote: PriceQuote,
    pub coupon_amount: Money,
    pub num_payments: usize,
    /// Discounted schedule at `yield_pct`
    pub cash_flows: Vec<CashFlowEvent>,
    pub risk: RiskMetrics,
}

/// Price, yield and risk analysis for a single bond.
pub fn analyze_bond(
    input: &BondAnalysisInput,
) -> BondAnalyticsResult<ComputationOutput<BondAnalysisOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let bond = &input.bond;
    bond.validate()?;

    let mut yield_solution = None;
    let mut approximate_ytm = None;
    let mut current_yield = None;

    if bond.market_price.is_some() {
        yield_solution = Some(yields::yield_from_price(bond)?);
        approximate_ytm = Some(yields::approximate_ytm(bond)?);
        current_yield = Some(yields::current_yield(bond)?);
    }

    let (yield_pct, yield_source) = match (input.yield_pct, &yield_solution, bond.current_yield) {
        (Some(y), _, _) => (y, YieldSource::Supplied),
        (None, Some(solution), _) if solution.converged => (solution.yield_pct, YieldSource::Solved),
        (None, Some(solution), _) => {
            warn!(
                iterations = solution.iterations_used,
                "yield solver did not converge; using approximate YTM"
            );
            warnings.push(format!(
                "Yield solver did not converge after {} iterations; approximate YTM used",
                solution.iterations_used
            ));
            // approximate_ytm is always set alongside yield_solution
            (approximate_ytm.unwrap_or(solution.yield_pct), YieldSource::Approximation)
        }
        (None, None, Some(cy)) => (cy, YieldSource::CurrentYield),
        (None, None, None) => {
            return Err(BondAnalyticsError::invalid_input(
                "yield_pct",
                "a yield, a market price, or a current yield",
                "none",
            ))
        }
    };

    let schedule = cashflows::cash_flows(bond)?;
    let discounted = present_value::discount_schedule(
        &schedule,
        periodic_rate(yield_pct, bond.payment_frequency),
    )?;
    let risk = duration::risk_metrics_from_schedule(&schedule, bond.payment_frequency, yield_pct)?;

    let price_quote = match bond.market_price {
        Some(price) => PriceQuote::classify(price, bond.face_value),
        None => PriceQuote::classify(discounted.price, bond.face_value),
    };

    if let (Some(market), Some(_)) = (bond.market_price, input.yield_pct) {
        let gap = (discounted.price - market).abs();
        if gap > dec!(0.01) {
            warnings.push(format!(
                "Supplied yield prices the bond at {} vs market price {market}",
                discounted.price.round_dp(4)
            ));
        }
    }

    let output = BondAnalysisOutput {
        yield_pct,
        yield_source,
        price: discounted.price,
        yield_solution,
        approximate_ytm,
        current_yield,
        effective_annual_yield: yields::effective_annual_yield(yield_pct, bond.payment_frequency)?,
        price_quote,
        coupon_amount: bond.periodic_coupon(),
        num_payments: discounted.events.len(),
        cash_flows: discounted.events,
        risk,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "payment_frequency": bond.payment_frequency,
        "settlement": "on a coupon date (no accrued interest)",
        "stub_policy": "round within 0.01 period, else pro-rated final stub",
        "yield_source": yield_source,
    });

    Ok(with_metadata(
        "Bond analysis: PV of scheduled cash flows, Newton-Raphson/bisection YTM, Macaulay/modified duration and convexity",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}
