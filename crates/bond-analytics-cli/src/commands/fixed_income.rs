use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

use bond_analytics_core::fixed_income::bonds::{self, BondAnalysisInput};
use bond_analytics_core::fixed_income::duration::{self, RiskInput};
use bond_analytics_core::fixed_income::present_value;
use bond_analytics_core::fixed_income::yields::{self, PriceQuote, YieldSolution};
use bond_analytics_core::fixed_income::Bond;
use bond_analytics_core::{with_metadata, Money, Percent};

use crate::input;

/// Bond terms shared by the single-bond commands
#[derive(Args)]
pub struct BondTermArgs {
    /// Face value
    #[arg(long, default_value = "1000")]
    pub face_value: Decimal,

    /// Annual coupon rate in percent (e.g. 5 for 5%)
    #[arg(long)]
    pub coupon_rate: Option<Decimal>,

    /// Years to maturity (fractional allowed)
    #[arg(long)]
    pub years: Option<Decimal>,

    /// Coupons per year: 1, 2, 4 or 12
    #[arg(long, default_value_t = 2)]
    pub frequency: u8,

    /// Market price
    #[arg(long)]
    pub price: Option<Decimal>,

    /// Explicit current yield in percent
    #[arg(long)]
    pub current_yield: Option<Decimal>,

    /// Settlement date (YYYY-MM-DD) for dated cash flows
    #[arg(long)]
    pub settlement_date: Option<NaiveDate>,
}

impl BondTermArgs {
    fn to_bond(&self) -> Result<Bond, Box<dyn std::error::Error>> {
        let coupon_rate = self
            .coupon_rate
            .ok_or("--coupon-rate is required (or provide --input)")?;
        let years = self.years.ok_or("--years is required (or provide --input)")?;

        let mut bond = Bond::new(self.face_value, coupon_rate, years, self.frequency);
        if let Some(price) = self.price {
            bond = bond.with_market_price(price);
        }
        if let Some(cy) = self.current_yield {
            bond = bond.with_current_yield(cy);
        }
        if let Some(date) = self.settlement_date {
            bond = bond.with_settlement_date(date);
        }
        Ok(bond)
    }
}

/// Arguments for full bond analysis
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct BondArgs {
    #[command(flatten)]
    pub terms: BondTermArgs,

    /// Annual yield in percent; solved from --price when omitted
    #[arg(long = "yield")]
    pub yield_pct: Option<Decimal>,

    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_bond(args: BondArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let analysis_input = match input::load_request::<BondAnalysisInput>(args.input.as_deref())? {
        Some(request) => request,
        None => BondAnalysisInput {
            bond: args.terms.to_bond()?,
            yield_pct: args.yield_pct,
        },
    };
    let result = bonds::analyze_bond(&analysis_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for pricing from a yield
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct PriceArgs {
    #[command(flatten)]
    pub terms: BondTermArgs,

    /// Annual yield in percent
    #[arg(long = "yield")]
    pub yield_pct: Option<Decimal>,

    /// Path to JSON input file with `bond` and `yield_pct`
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct PriceOutput {
    price: Money,
    yield_pct: Percent,
    price_quote: PriceQuote,
}

pub fn run_price(args: PriceArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let request = match input::load_request::<BondAnalysisInput>(args.input.as_deref())? {
        Some(request) => request,
        None => BondAnalysisInput {
            bond: args.terms.to_bond()?,
            yield_pct: args.yield_pct,
        },
    };
    let yield_pct = request
        .yield_pct
        .ok_or("--yield is required to price a bond")?;

    let price = present_value::price_from_yield(&request.bond, yield_pct)?;
    let output = PriceOutput {
        price,
        yield_pct,
        price_quote: PriceQuote::classify(price, request.bond.face_value),
    };
    let result = with_metadata(
        "Bond price: discounted coupons and principal at the periodic yield",
        &request,
        Vec::new(),
        start.elapsed().as_micros() as u64,
        output,
    );
    Ok(serde_json::to_value(result)?)
}

/// Arguments for solving yield to maturity
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct YieldArgs {
    #[command(flatten)]
    pub terms: BondTermArgs,

    /// Path to JSON input file with the bond terms and `market_price`
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_yield(args: YieldArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let bond = match input::load_request::<Bond>(args.input.as_deref())? {
        Some(bond) => bond,
        None => args.terms.to_bond()?,
    };
    bond.validate()?;

    let solution: YieldSolution = yields::yield_from_price(&bond)?;
    let mut warnings = Vec::new();
    if !solution.converged {
        warnings.push(format!(
            "Solver stopped after {} iterations without meeting tolerance",
            solution.iterations_used
        ));
    }
    let result = with_metadata(
        "Yield to maturity: Newton-Raphson with bisection fallback",
        &bond,
        warnings,
        start.elapsed().as_micros() as u64,
        solution,
    );
    Ok(serde_json::to_value(result)?)
}

/// Arguments for duration and convexity
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct RiskArgs {
    #[command(flatten)]
    pub terms: BondTermArgs,

    /// Annual yield in percent; solved from --price when omitted
    #[arg(long = "yield")]
    pub yield_pct: Option<Decimal>,

    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_risk(args: RiskArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let risk_input = match input::load_request::<RiskInput>(args.input.as_deref())? {
        Some(request) => request,
        None => RiskInput {
            bond: args.terms.to_bond()?,
            yield_pct: args.yield_pct,
        },
    };
    let result = duration::calculate_risk(&risk_input)?;
    Ok(serde_json::to_value(result)?)
}
