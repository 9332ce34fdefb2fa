//! Projection of ladder income when matured rungs are rolled over.
//!
//! Principal returned by a maturing rung is reinvested at the longest rung's
//! rate plus the scenario shift (never below 0%) and earns that rate for the
//! rest of the horizon. Income is reported per calendar year 1..=ceil(max
//! maturity); a rung maturing mid-year contributes coupon income up to its
//! maturity and reinvestment income after it. Projections stop at
//! `MAX_YEARS_TO_MATURITY`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::builder::LadderRung;
use crate::fixed_income::bonds::MAX_YEARS_TO_MATURITY;
use crate::types::{percent_to_rate, Money, Percent, Years};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateScenario {
    Unchanged,
    Up100,
    Down100,
}

impl RateScenario {
    pub fn shift_bps(self) -> Decimal {
        match self {
            RateScenario::Unchanged => Decimal::ZERO,
            RateScenario::Up100 => Decimal::ONE_HUNDRED,
            RateScenario::Down100 => -Decimal::ONE_HUNDRED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualIncome {
    pub year: u32,
    /// Coupons from rungs still outstanding during the year
    pub coupon_income: Money,
    /// Income on principal already rolled over
    pub reinvestment_income: Money,
    pub total_income: Money,
    /// Principal reinvested by the end of the year
    pub reinvested_principal: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReinvestmentProjection {
    pub scenario: RateScenario,
    pub shift_bps: Decimal,
    /// Rate earned by reinvested principal (percent)
    pub reinvestment_rate: Percent,
    pub annual_income: Vec<AnnualIncome>,
    pub total_income: Money,
}

/// Income trajectory for one rate scenario.
pub fn project_reinvestment(
    rungs: &[LadderRung],
    max_maturity: Years,
    scenario: RateScenario,
) -> ReinvestmentProjection {
    let longest_rate = rungs
        .iter()
        .max_by(|a, b| a.maturity.cmp(&b.maturity))
        .map(|r| r.rate)
        .unwrap_or(Decimal::ZERO);
    let shift_bps = scenario.shift_bps();
    let reinvestment_rate = (longest_rate + shift_bps / Decimal::ONE_HUNDRED).max(Decimal::ZERO);
    let reinvest = percent_to_rate(reinvestment_rate);

    let horizon = max_maturity.ceil().min(MAX_YEARS_TO_MATURITY);
    let mut annual_income = Vec::new();
    let mut year = Decimal::ONE;
    let mut year_index = 1u32;
    while year <= horizon {
        let year_start = year - Decimal::ONE;
        let mut coupon_income = Decimal::ZERO;
        let mut reinvestment_income = Decimal::ZERO;
        let mut reinvested_principal = Decimal::ZERO;

        for rung in rungs {
            if rung.maturity >= year {
                coupon_income += rung.annual_income;
            } else if rung.maturity > year_start {
                let held = rung.maturity - year_start;
                coupon_income += rung.annual_income * held;
                reinvestment_income += rung.principal * reinvest * (Decimal::ONE - held);
                reinvested_principal += rung.principal;
            } else {
                reinvestment_income += rung.principal * reinvest;
                reinvested_principal += rung.principal;
            }
        }

        annual_income.push(AnnualIncome {
            year: year_index,
            coupon_income,
            reinvestment_income,
            total_income: coupon_income + reinvestment_income,
            reinvested_principal,
        });
        year += Decimal::ONE;
        year_index += 1;
    }

    let total_income = annual_income.iter().map(|y| y.total_income).sum();

    ReinvestmentProjection {
        scenario,
        shift_bps,
        reinvestment_rate,
        annual_income,
        total_income,
    }
}
