use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use bond_analytics_core::curve::{self, YieldCurvePoint};
use bond_analytics_core::ladder::{self, LadderInput};

use super::curve::parse_points;
use crate::input;

/// A ladder request: ladder terms plus the curve to price rungs against.
#[derive(Deserialize)]
struct LadderRequest {
    #[serde(flatten)]
    ladder: LadderInput,
    curve: Vec<YieldCurvePoint>,
}

/// Arguments for bond ladder construction
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct LadderArgs {
    /// Total amount to invest
    #[arg(long)]
    pub total: Option<Decimal>,

    /// Number of rungs
    #[arg(long)]
    pub rungs: Option<u32>,

    /// Longest rung maturity in years
    #[arg(long)]
    pub max_maturity: Option<Decimal>,

    /// Coupons per year for every rung
    #[arg(long, default_value_t = 2)]
    pub frequency: u8,

    /// Curve points as tenor:rate pairs in percent, e.g. "1:4.0,5:4.5,10:4.2"
    #[arg(long)]
    pub curve: Option<String>,

    /// Path to JSON input file with ladder terms and a `curve` array
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_ladder(args: LadderArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request = match input::load_request::<LadderRequest>(args.input.as_deref())? {
        Some(request) => request,
        None => LadderRequest {
            ladder: LadderInput {
                total_investment: args.total.ok_or("--total is required (or provide --input)")?,
                rung_count: args.rungs.ok_or("--rungs is required (or provide --input)")?,
                max_maturity: args
                    .max_maturity
                    .ok_or("--max-maturity is required (or provide --input)")?,
                maturities: None,
                weights: None,
                payment_frequency: args.frequency,
            },
            curve: parse_points(
                args.curve
                    .as_deref()
                    .ok_or("--curve is required (or provide --input)")?,
            )?,
        },
    };
    let yield_curve = curve::build_curve(request.curve)?;
    let result = ladder::build_ladder(&request.ladder, &yield_curve)?;
    Ok(serde_json::to_value(result)?)
}
